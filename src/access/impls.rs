use super::{CollectionShape, DeclaredType, FieldRef, FieldType, FieldValue};
use crate::core::{MapError, Result, Value};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use uuid::Uuid;

fn mismatch(expected: &str, found: &Value) -> MapError {
    MapError::TypeMismatch(format!(
        "cannot extract {} from {} value '{}'",
        expected,
        found.type_name(),
        found
    ))
}

// NULL leaves a non-optional scalar at its zero value.
macro_rules! integer_field_type {
    ($($ty:ty),*) => {$(
        impl FieldType for $ty {
            fn declared_type() -> DeclaredType {
                DeclaredType::scalar(stringify!($ty))
            }

            fn read(&self) -> FieldRef<'_> {
                FieldRef::Scalar(Value::Integer(i64::from(*self)))
            }

            fn write(value: FieldValue) -> Result<Self> {
                let raw = value.into_scalar(stringify!($ty))?;
                if raw.is_null() {
                    return Ok(Self::default());
                }
                let wide = match &raw {
                    Value::Text(text) => text.trim().parse::<i64>().ok(),
                    other => other.as_i64(),
                }
                .ok_or_else(|| mismatch(stringify!($ty), &raw))?;
                <$ty>::try_from(wide).map_err(|_| mismatch(stringify!($ty), &raw))
            }
        }
    )*};
}

integer_field_type!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! float_field_type {
    ($($ty:ty),*) => {$(
        impl FieldType for $ty {
            fn declared_type() -> DeclaredType {
                DeclaredType::scalar(stringify!($ty))
            }

            fn read(&self) -> FieldRef<'_> {
                FieldRef::Scalar(Value::Float(f64::from(*self)))
            }

            fn write(value: FieldValue) -> Result<Self> {
                let raw = value.into_scalar(stringify!($ty))?;
                if raw.is_null() {
                    return Ok(Self::default());
                }
                let wide = match &raw {
                    Value::Text(text) => text.trim().parse::<f64>().ok(),
                    other => other.as_f64(),
                }
                .ok_or_else(|| mismatch(stringify!($ty), &raw))?;
                Ok(wide as $ty)
            }
        }
    )*};
}

float_field_type!(f32, f64);

impl FieldType for bool {
    fn declared_type() -> DeclaredType {
        DeclaredType::scalar("bool")
    }

    fn read(&self) -> FieldRef<'_> {
        FieldRef::Scalar(Value::Boolean(*self))
    }

    fn write(value: FieldValue) -> Result<Self> {
        let raw = value.into_scalar("bool")?;
        match &raw {
            Value::Null => Ok(false),
            Value::Boolean(b) => Ok(*b),
            Value::Integer(i) => Ok(*i != 0),
            Value::Text(text) => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(mismatch("bool", &raw)),
            },
            _ => Err(mismatch("bool", &raw)),
        }
    }
}

impl FieldType for String {
    fn declared_type() -> DeclaredType {
        DeclaredType::scalar("String")
    }

    fn read(&self) -> FieldRef<'_> {
        FieldRef::Scalar(Value::Text(self.clone()))
    }

    fn write(value: FieldValue) -> Result<Self> {
        match value.into_scalar("String")? {
            Value::Null => Ok(String::new()),
            Value::Text(text) => Ok(text),
            Value::List(values) => Err(mismatch("String", &Value::List(values))),
            other => Ok(other.to_string()),
        }
    }
}

impl FieldType for DateTime<Utc> {
    fn declared_type() -> DeclaredType {
        DeclaredType::scalar("DateTime<Utc>")
    }

    fn read(&self) -> FieldRef<'_> {
        FieldRef::Scalar(Value::Timestamp(*self))
    }

    fn write(value: FieldValue) -> Result<Self> {
        let raw = value.into_scalar("DateTime<Utc>")?;
        match &raw {
            Value::Null => Ok(Self::default()),
            Value::Timestamp(ts) => Ok(*ts),
            Value::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| mismatch("DateTime<Utc>", &raw)),
            Value::Integer(millis) => {
                DateTime::from_timestamp_millis(*millis).ok_or_else(|| mismatch("DateTime<Utc>", &raw))
            }
            _ => Err(mismatch("DateTime<Utc>", &raw)),
        }
    }
}

impl FieldType for NaiveDate {
    fn declared_type() -> DeclaredType {
        DeclaredType::scalar("NaiveDate")
    }

    fn read(&self) -> FieldRef<'_> {
        FieldRef::Scalar(Value::Date(*self))
    }

    fn write(value: FieldValue) -> Result<Self> {
        let raw = value.into_scalar("NaiveDate")?;
        match &raw {
            Value::Null => Ok(Self::default()),
            Value::Date(date) => Ok(*date),
            Value::Timestamp(ts) => Ok(ts.date_naive()),
            Value::Text(text) => {
                NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| mismatch("NaiveDate", &raw))
            }
            _ => Err(mismatch("NaiveDate", &raw)),
        }
    }
}

impl FieldType for Uuid {
    fn declared_type() -> DeclaredType {
        DeclaredType::scalar("Uuid")
    }

    fn read(&self) -> FieldRef<'_> {
        FieldRef::Scalar(Value::Uuid(*self))
    }

    fn write(value: FieldValue) -> Result<Self> {
        let raw = value.into_scalar("Uuid")?;
        match &raw {
            Value::Null => Ok(Uuid::nil()),
            Value::Uuid(id) => Ok(*id),
            Value::Text(text) => Uuid::parse_str(text).map_err(|_| mismatch("Uuid", &raw)),
            _ => Err(mismatch("Uuid", &raw)),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn declared_type() -> DeclaredType {
        T::declared_type().nullable()
    }

    fn read(&self) -> FieldRef<'_> {
        match self {
            Some(value) => value.read(),
            None => FieldRef::Null,
        }
    }

    fn write(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null | FieldValue::Scalar(Value::Null) => Ok(None),
            other => T::write(other).map(Some),
        }
    }
}

macro_rules! collection_field_type {
    ($coll:ident, $shape:expr, $add:ident $(, $bound:path)*) => {
        impl<T: FieldType $(+ $bound)*> FieldType for $coll<T> {
            fn declared_type() -> DeclaredType {
                DeclaredType::collection(stringify!($coll), $shape, T::declared_type())
            }

            fn read(&self) -> FieldRef<'_> {
                FieldRef::Elements(self.iter().map(FieldType::read).collect())
            }

            fn write(value: FieldValue) -> Result<Self> {
                let mut collection = $coll::new();
                for element in value.into_elements(stringify!($coll))? {
                    collection.$add(T::write(element)?);
                }
                Ok(collection)
            }
        }
    };
}

collection_field_type!(Vec, CollectionShape::List, push);
collection_field_type!(VecDeque, CollectionShape::Deque, push_back);
collection_field_type!(HashSet, CollectionShape::Set, insert, Eq, Hash);
collection_field_type!(BTreeSet, CollectionShape::SortedSet, insert, Ord);

impl<V: FieldType> FieldType for HashMap<String, V> {
    fn declared_type() -> DeclaredType {
        DeclaredType::map("HashMap", V::declared_type())
    }

    fn read(&self) -> FieldRef<'_> {
        let mut entries: Vec<(String, FieldRef<'_>)> =
            self.iter().map(|(key, value)| (key.clone(), value.read())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        FieldRef::Entries(entries)
    }

    fn write(value: FieldValue) -> Result<Self> {
        value
            .into_entries("HashMap")?
            .into_iter()
            .map(|(key, value)| V::write(value).map(|value| (key, value)))
            .collect()
    }
}

impl<V: FieldType> FieldType for BTreeMap<String, V> {
    fn declared_type() -> DeclaredType {
        DeclaredType::map("BTreeMap", V::declared_type())
    }

    fn read(&self) -> FieldRef<'_> {
        FieldRef::Entries(self.iter().map(|(key, value)| (key.clone(), value.read())).collect())
    }

    fn write(value: FieldValue) -> Result<Self> {
        value
            .into_entries("BTreeMap")?
            .into_iter()
            .map(|(key, value)| V::write(value).map(|value| (key, value)))
            .collect()
    }
}
