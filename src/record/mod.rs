//! Storage-facing record representation.
//!
//! A [`Record`] is the form exchanged with column and document stores: a
//! named, ordered sequence of entries whose values are either scalars or
//! further nested entries.

use crate::core::{MapError, Result, Value};
use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Scalar(Value),
    /// Nested record produced from an embedded entity.
    Record(Vec<RecordEntry>),
    /// One nested record per element of an embeddable collection.
    RecordList(Vec<Vec<RecordEntry>>),
    /// Map-shaped nested record: entry names are map keys.
    Map(Vec<RecordEntry>),
}

impl RecordValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Entries of a nested record or of a map-shaped value.
    pub fn as_entries(&self) -> Option<&[RecordEntry]> {
        match self {
            Self::Record(entries) | Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Record(_) => "record",
            Self::RecordList(_) => "record list",
            Self::Map(_) => "map",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Scalar(value) => value.to_json(),
            Self::Record(entries) | Self::Map(entries) => entries_to_json(entries),
            Self::RecordList(lists) => {
                JsonValue::Array(lists.iter().map(|entries| entries_to_json(entries)).collect())
            }
        }
    }

    /// Rebuilds a value from its JSON view.
    ///
    /// Objects come back map-shaped, arrays holding only objects come back as
    /// record lists, anything else is a scalar.
    pub fn from_json(json: &JsonValue) -> Result<Self> {
        match json {
            JsonValue::Object(object) => Ok(Self::Map(entries_from_json(object)?)),
            JsonValue::Array(items)
                if !items.is_empty() && items.iter().all(JsonValue::is_object) =>
            {
                let mut lists = Vec::with_capacity(items.len());
                for item in items {
                    if let JsonValue::Object(object) = item {
                        lists.push(entries_from_json(object)?);
                    }
                }
                Ok(Self::RecordList(lists))
            }
            other => Value::from_json(other).map(Self::Scalar),
        }
    }
}

impl From<Value> for RecordValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntry {
    pub name: String,
    pub value: RecordValue,
}

impl RecordEntry {
    pub fn new(name: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn scalar(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, RecordValue::Scalar(value.into()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    entries: Vec<RecordEntry>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entries(name: impl Into<String>, entries: Vec<RecordEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<RecordEntry> {
        self.entries
    }

    pub fn add(&mut self, entry: RecordEntry) {
        self.entries.push(entry);
    }

    pub fn with(mut self, entry: RecordEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// First entry carrying `name`.
    pub fn find(&self, name: &str) -> Option<&RecordEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Resolves a dotted path (`address.city`) through nested records and maps.
    pub fn find_path(&self, path: &str) -> Option<&RecordValue> {
        find_path_in(&self.entries, path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        entries_to_json(&self.entries)
    }

    pub fn from_json(name: impl Into<String>, json: &JsonValue) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            MapError::TypeMismatch("Expected a JSON object for a record".to_string())
        })?;
        Ok(Self::with_entries(name, entries_from_json(object)?))
    }

    pub fn from_json_str(name: impl Into<String>, document: &str) -> Result<Self> {
        let json: JsonValue = serde_json::from_str(document)?;
        Self::from_json(name, &json)
    }
}

pub(crate) fn find_path_in<'a>(entries: &'a [RecordEntry], path: &str) -> Option<&'a RecordValue> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let entry = entries.iter().find(|entry| entry.name == head)?;
    match rest {
        None => Some(&entry.value),
        Some(rest) => find_path_in(entry.value.as_entries()?, rest),
    }
}

fn entries_to_json(entries: &[RecordEntry]) -> JsonValue {
    let mut object = JsonMap::with_capacity(entries.len());
    for entry in entries {
        // first entry wins, matching lookup semantics
        if !object.contains_key(&entry.name) {
            object.insert(entry.name.clone(), entry.value.to_json());
        }
    }
    JsonValue::Object(object)
}

fn entries_from_json(object: &JsonMap<String, JsonValue>) -> Result<Vec<RecordEntry>> {
    object
        .iter()
        .map(|(name, value)| RecordValue::from_json(value).map(|value| RecordEntry::new(name.clone(), value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_is_first_match() {
        let record = Record::new("person")
            .with(RecordEntry::scalar("name", "Ada"))
            .with(RecordEntry::scalar("name", "Grace"));
        assert_eq!(
            record.find("name").unwrap().value,
            RecordValue::Scalar(Value::Text("Ada".into()))
        );
    }

    #[test]
    fn test_find_path_through_nested_record() {
        let record = Record::new("person").with(RecordEntry::new(
            "address",
            RecordValue::Record(vec![RecordEntry::scalar("city", "Lisbon")]),
        ));
        assert_eq!(
            record.find_path("address.city"),
            Some(&RecordValue::Scalar(Value::Text("Lisbon".into())))
        );
        assert!(record.find_path("address.zip").is_none());
        assert!(record.find_path("name.first").is_none());
    }

    #[test]
    fn test_json_document_shapes() {
        let document = json!({
            "name": "Ada",
            "tags": ["a", "b"],
            "address": {"city": "London"},
            "phones": [{"number": "1"}, {"number": "2"}]
        });
        let record = Record::from_json("person", &document).unwrap();

        assert!(matches!(record.find("address").unwrap().value, RecordValue::Map(_)));
        assert!(matches!(record.find("tags").unwrap().value, RecordValue::Scalar(Value::List(_))));
        match &record.find("phones").unwrap().value {
            RecordValue::RecordList(lists) => assert_eq!(lists.len(), 2),
            other => panic!("unexpected shape {:?}", other),
        }
        assert_eq!(record.to_json(), document);
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(Record::from_json("person", &json!([1, 2])).is_err());
        assert!(Record::from_json_str("person", "{not json").is_err());
    }
}
