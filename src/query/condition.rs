use super::pattern::PatternCache;
use crate::core::{Result, Value};
use crate::record::{Record, RecordValue};
use std::cmp::Ordering;
use std::fmt;

/// Condition tree evaluated against record entries.
///
/// Field names are record names; dotted names (`address.city`) reach into
/// nested records and maps.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq { field: String, value: Value },
    Lt { field: String, value: Value },
    Lte { field: String, value: Value },
    Gt { field: String, value: Value },
    Gte { field: String, value: Value },
    Like { field: String, pattern: String },
    Between { field: String, low: Value, high: Value },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn between(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Self::And(mut conditions) => {
                conditions.push(other);
                Self::And(conditions)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Self::Or(mut conditions) => {
                conditions.push(other);
                Self::Or(conditions)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn matches(&self, record: &Record) -> Result<bool> {
        self.matches_with(record, PatternCache::shared())
    }

    /// Evaluates the condition. Missing entries and NULLs never match a
    /// comparison; comparing incompatible types is an error.
    pub fn matches_with(&self, record: &Record, patterns: &PatternCache) -> Result<bool> {
        match self {
            Self::Eq { field, value } => Ok(scalar(record, field)
                .map(|actual| values_equal(actual, value))
                .unwrap_or(false)),
            Self::Lt { field, value } => compare(record, field, value, |o| o == Ordering::Less),
            Self::Lte { field, value } => compare(record, field, value, |o| o != Ordering::Greater),
            Self::Gt { field, value } => compare(record, field, value, |o| o == Ordering::Greater),
            Self::Gte { field, value } => compare(record, field, value, |o| o != Ordering::Less),
            Self::Like { field, pattern } => match scalar(record, field) {
                Some(Value::Text(text)) => patterns.is_match(text, pattern, true),
                Some(other) if !other.is_null() => patterns.is_match(&other.to_string(), pattern, true),
                _ => Ok(false),
            },
            Self::Between { field, low, high } => Ok(
                compare(record, field, low, |o| o != Ordering::Less)?
                    && compare(record, field, high, |o| o != Ordering::Greater)?,
            ),
            Self::And(conditions) => {
                for condition in conditions {
                    if !condition.matches_with(record, patterns)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(conditions) => {
                for condition in conditions {
                    if condition.matches_with(record, patterns)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(condition) => Ok(!condition.matches_with(record, patterns)?),
        }
    }
}

fn scalar<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    match record.find_path(field)? {
        RecordValue::Scalar(value) => Some(value),
        _ => None,
    }
}

/// Equality that treats `1` and `1.0` as equal and checks list membership.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::List(items) if !matches!(expected, Value::List(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        _ => matches!(actual.compare(expected), Ok(Ordering::Equal)) && !actual.is_null(),
    }
}

fn compare(record: &Record, field: &str, expected: &Value, accept: impl Fn(Ordering) -> bool) -> Result<bool> {
    match scalar(record, field) {
        Some(actual) if !actual.is_null() && !expected.is_null() => Ok(accept(actual.compare(expected)?)),
        _ => Ok(false),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { field, value } => write!(f, "{} = {}", field, value),
            Self::Lt { field, value } => write!(f, "{} < {}", field, value),
            Self::Lte { field, value } => write!(f, "{} <= {}", field, value),
            Self::Gt { field, value } => write!(f, "{} > {}", field, value),
            Self::Gte { field, value } => write!(f, "{} >= {}", field, value),
            Self::Like { field, pattern } => write!(f, "{} LIKE '{}'", field, pattern),
            Self::Between { field, low, high } => write!(f, "{} BETWEEN {} AND {}", field, low, high),
            Self::And(conditions) => write_joined(f, conditions, " AND "),
            Self::Or(conditions) => write_joined(f, conditions, " OR "),
            Self::Not(condition) => write!(f, "NOT ({})", condition),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, conditions: &[Condition], separator: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        write!(f, "{}", condition)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordEntry;

    fn person() -> Record {
        Record::new("person")
            .with(RecordEntry::scalar("name", "Ada"))
            .with(RecordEntry::scalar("age", 36))
            .with(RecordEntry::scalar("score", 4.5))
            .with(RecordEntry::scalar("tags", Value::List(vec!["math".into(), "poetry".into()])))
            .with(RecordEntry::new(
                "address",
                RecordValue::Record(vec![RecordEntry::scalar("city", "London")]),
            ))
    }

    #[test]
    fn test_comparisons() {
        let record = person();
        assert!(Condition::eq("name", "Ada").matches(&record).unwrap());
        assert!(Condition::eq("age", 36.0).matches(&record).unwrap());
        assert!(Condition::gt("age", 30).matches(&record).unwrap());
        assert!(Condition::lte("score", 4.5).matches(&record).unwrap());
        assert!(!Condition::lt("age", 36).matches(&record).unwrap());
        assert!(!Condition::eq("missing", 1).matches(&record).unwrap());
    }

    #[test]
    fn test_between_like_and_paths() {
        let record = person();
        assert!(Condition::between("age", 30, 40).matches(&record).unwrap());
        assert!(!Condition::between("age", 37, 40).matches(&record).unwrap());
        assert!(Condition::like("name", "A%").matches(&record).unwrap());
        assert!(Condition::eq("address.city", "London").matches(&record).unwrap());
        assert!(Condition::eq("tags", "poetry").matches(&record).unwrap());
    }

    #[test]
    fn test_boolean_composition() {
        let record = person();
        let condition = Condition::eq("name", "Ada")
            .and(Condition::gt("age", 40))
            .or(Condition::like("address.city", "Lon%"));
        assert!(condition.matches(&record).unwrap());
        assert!(!condition.clone().negate().matches(&record).unwrap());
        assert_eq!(
            condition.to_string(),
            "((name = Ada AND age > 40) OR address.city LIKE 'Lon%')"
        );
    }

    #[test]
    fn test_incompatible_comparison_fails() {
        assert!(Condition::gt("name", 3).matches(&person()).is_err());
    }
}
