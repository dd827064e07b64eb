//! Query-method names (`findByNameAndAgeGreaterThan`,
//! `find_by_name_and_age_greater_than`) turned into queries.

use super::{Condition, DeleteQuery, SelectQuery};
use crate::core::{MapError, Result, Value};
use crate::model::EntityMetadata;

/// Operator suffix of a method token and how many arguments it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionToken {
    Between,
    LessThanEqual,
    GreaterThanEqual,
    LessThan,
    GreaterThan,
    Like,
    Equals,
}

impl ConditionToken {
    /// Checked in this order; the first suffix found wins.
    const ORDERED: [ConditionToken; 6] = [
        Self::Between,
        Self::LessThanEqual,
        Self::GreaterThanEqual,
        Self::LessThan,
        Self::GreaterThan,
        Self::Like,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Between => "Between",
            Self::LessThanEqual => "LessThanEqual",
            Self::GreaterThanEqual => "GreaterThanEqual",
            Self::LessThan => "LessThan",
            Self::GreaterThan => "GreaterThan",
            Self::Like => "Like",
            Self::Equals => "",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Between => 2,
            _ => 1,
        }
    }

    pub fn of(token: &str) -> Self {
        Self::ORDERED
            .into_iter()
            .find(|candidate| token.ends_with(candidate.suffix()))
            .unwrap_or(Self::Equals)
    }

    /// Builds the condition of `token`, consuming arguments from `index`.
    pub fn process(
        &self,
        token: &str,
        index: usize,
        args: &[Value],
        method: &str,
        metadata: &EntityMetadata,
    ) -> Result<Condition> {
        if index + self.arity() > args.len() {
            return Err(MapError::missing_argument(method));
        }
        let name = token.strip_suffix(self.suffix()).unwrap_or(token);
        let field = resolve_field(name, metadata);
        let arg = args[index].clone();

        Ok(match self {
            Self::Between => Condition::between(field, arg, args[index + 1].clone()),
            Self::LessThanEqual => Condition::lte(field, arg),
            Self::GreaterThanEqual => Condition::gte(field, arg),
            Self::LessThan => Condition::lt(field, arg),
            Self::GreaterThan => Condition::gt(field, arg),
            Self::Like => match arg {
                Value::Text(pattern) => Condition::like(field, pattern),
                other => Condition::like(field, other.to_string()),
            },
            Self::Equals => Condition::eq(field, arg),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

/// Query derived from a method name.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodQuery {
    Select(SelectQuery),
    Delete(DeleteQuery),
}

impl MethodQuery {
    pub fn parse(method: &str, args: &[Value], metadata: &EntityMetadata) -> Result<Self> {
        let camel = to_camel(method);

        if camel == "findAll" {
            return Ok(Self::Select(SelectQuery::new(metadata.name())));
        }
        if camel == "deleteAll" {
            return Ok(Self::Delete(DeleteQuery::new(metadata.name())));
        }

        let (is_delete, body) = if let Some(body) = camel.strip_prefix("findBy") {
            (false, body)
        } else if let Some(body) = camel.strip_prefix("deleteBy") {
            (true, body)
        } else {
            return Err(MapError::InvalidQuery(format!(
                "'{}' does not start with findBy or deleteBy",
                method
            )));
        };

        let condition = parse_condition(body, method, args, metadata)?;
        Ok(if is_delete {
            Self::Delete(DeleteQuery::new(metadata.name()).filter(condition))
        } else {
            Self::Select(SelectQuery::new(metadata.name()).filter(condition))
        })
    }
}

fn parse_condition(body: &str, method: &str, args: &[Value], metadata: &EntityMetadata) -> Result<Condition> {
    let mut index = 0;
    let mut result: Option<Condition> = None;

    for (connector, token) in split_tokens(body) {
        if token.is_empty() {
            return Err(MapError::InvalidQuery(format!("'{}' has an empty condition", method)));
        }
        let kind = ConditionToken::of(token);
        let condition = kind.process(token, index, args, method, metadata)?;
        index += kind.arity();

        result = Some(match (result, connector) {
            (None, _) => condition,
            (Some(previous), Connector::And) => previous.and(condition),
            (Some(previous), Connector::Or) => previous.or(condition),
        });
    }

    result.ok_or_else(|| MapError::InvalidQuery(format!("'{}' has no condition", method)))
}

/// Splits on `And`/`Or` at word boundaries (followed by an uppercase letter).
fn split_tokens(body: &str) -> Vec<(Connector, &str)> {
    let mut tokens = Vec::new();
    let mut connector = Connector::And;
    let mut start = 0;
    let mut i = 1;

    while i < body.len() {
        let Some(rest) = body.get(i..) else {
            i += 1;
            continue;
        };
        let found = if rest.starts_with("And") {
            Some((Connector::And, 3))
        } else if rest.starts_with("Or") {
            Some((Connector::Or, 2))
        } else {
            None
        };
        match found {
            Some((next, len)) if rest[len..].starts_with(|c: char| c.is_ascii_uppercase()) => {
                tokens.push((connector, &body[start..i]));
                connector = next;
                start = i + len;
                i = start + 1;
            }
            _ => i += rest.chars().next().map_or(1, char::len_utf8),
        }
    }
    tokens.push((connector, &body[start..]));
    tokens
}

/// `find_by_first_name` becomes `findByFirstName`; camel input is unchanged.
fn to_camel(method: &str) -> String {
    if !method.contains('_') {
        return method.to_string();
    }
    let mut camel = String::with_capacity(method.len());
    for (i, part) in method.split('_').filter(|part| !part.is_empty()).enumerate() {
        if i == 0 {
            camel.push_str(part);
        } else {
            let mut chars = part.chars();
            if let Some(first) = chars.next() {
                camel.extend(first.to_uppercase());
                camel.push_str(chars.as_str());
            }
        }
    }
    camel
}

/// Record name of the field a token names; unknown names are used as is.
fn resolve_field(token: &str, metadata: &EntityMetadata) -> String {
    let normalized = normalize(token);
    metadata
        .fields()
        .iter()
        .find(|field| normalize(field.field_name) == normalized || normalize(&field.record_name) == normalized)
        .map(|field| field.record_name.clone())
        .unwrap_or_else(|| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        })
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Entity;

    #[derive(crate::Entity, Default)]
    #[entity(name = "people")]
    struct Person {
        #[column(id)]
        id: i64,
        #[column(name = "full_name")]
        name: String,
        age: i32,
        order_count: i32,
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::from_descriptor(Person::describe()).unwrap()
    }

    #[test]
    fn test_token_kinds() {
        assert_eq!(ConditionToken::of("AgeGreaterThanEqual"), ConditionToken::GreaterThanEqual);
        assert_eq!(ConditionToken::of("AgeGreaterThan"), ConditionToken::GreaterThan);
        assert_eq!(ConditionToken::of("AgeBetween"), ConditionToken::Between);
        assert_eq!(ConditionToken::of("Name"), ConditionToken::Equals);
        assert_eq!(ConditionToken::Between.arity(), 2);
    }

    #[test]
    fn test_parse_select() {
        let query = MethodQuery::parse(
            "findByNameAndAgeGreaterThan",
            &["Ada".into(), 30.into()],
            &metadata(),
        )
        .unwrap();
        let expected = SelectQuery::new("people")
            .filter(Condition::eq("full_name", "Ada").and(Condition::gt("age", 30)));
        assert_eq!(query, MethodQuery::Select(expected));
    }

    #[test]
    fn test_parse_snake_case_and_or() {
        let query = MethodQuery::parse(
            "delete_by_order_count_between_or_name_like",
            &[1.into(), 5.into(), "A%".into()],
            &metadata(),
        )
        .unwrap();
        let expected = DeleteQuery::new("people").filter(
            Condition::between("order_count", 1, 5).or(Condition::like("full_name", "A%")),
        );
        assert_eq!(query, MethodQuery::Delete(expected));
    }

    #[test]
    fn test_or_inside_field_name_is_not_a_connector() {
        let tokens = split_tokens("OrderCountAndName");
        assert_eq!(tokens, vec![(Connector::And, "OrderCount"), (Connector::And, "Name")]);
    }

    #[test]
    fn test_missing_argument_names_method() {
        let err = MethodQuery::parse("findByAgeBetween", &[1.into()], &metadata()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "There is a missed argument in the method findByAgeBetween"
        );
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(matches!(
            MethodQuery::parse("countByName", &[], &metadata()),
            Err(MapError::InvalidQuery(_))
        ));
    }
}
