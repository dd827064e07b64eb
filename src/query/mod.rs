pub mod condition;
pub mod method;
pub mod pattern;

pub use condition::Condition;
pub use method::{ConditionToken, MethodQuery};
pub use pattern::{PatternCache, eval_like};

use crate::core::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Select over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub collection: String,
    pub condition: Option<Condition>,
    pub sorts: Vec<Sort>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            condition: None,
            sorts: Vec::new(),
            skip: 0,
            limit: None,
        }
    }

    /// Select matching `field = value`.
    pub fn by_eq(collection: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self::new(collection).filter(Condition::eq(field, value))
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT FROM {}", self.collection)?;
        if let Some(condition) = &self.condition {
            write!(f, " WHERE {}", condition)?;
        }
        for (i, sort) in self.sorts.iter().enumerate() {
            let keyword = if i == 0 { " ORDER BY " } else { ", " };
            let direction = match sort.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            write!(f, "{}{} {}", keyword, sort.field, direction)?;
        }
        if self.skip > 0 {
            write!(f, " SKIP {}", self.skip)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

/// Delete over one collection; no condition deletes everything.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub collection: String,
    pub condition: Option<Condition>,
}

impl DeleteQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            condition: None,
        }
    }

    pub fn by_eq(collection: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self::new(collection).filter(Condition::eq(field, value))
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl fmt::Display for DeleteQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE FROM {}", self.collection)?;
        if let Some(condition) = &self.condition {
            write!(f, " WHERE {}", condition)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_display() {
        let query = SelectQuery::by_eq("people", "id", Value::Integer(7))
            .sort(Sort::desc("age"))
            .sort(Sort::asc("name"))
            .skip(5)
            .limit(10);
        assert_eq!(
            query.to_string(),
            "SELECT FROM people WHERE id = 7 ORDER BY age DESC, name ASC SKIP 5 LIMIT 10"
        );
    }

    #[test]
    fn test_delete_display() {
        assert_eq!(DeleteQuery::new("people").to_string(), "DELETE FROM people");
    }
}
