use recordmap::{
    AccessPolicy, ConverterRegistry, DuplicateEntryPolicy, Embeddable, Entity, MapError, Mapper, MapperConfig, Record,
    RecordEntry, RecordValue, Value,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Embeddable, Default, Debug, Clone, PartialEq)]
struct Address {
    street: String,
    city: String,
}

#[derive(Embeddable, Default, Debug, Clone, PartialEq)]
struct Phone {
    kind: String,
    number: String,
}

#[derive(Entity, Default, Debug, Clone, PartialEq)]
#[entity(name = "person")]
struct Person {
    #[column(id)]
    id: i64,
    name: String,
    age: Option<i32>,
    #[column(name = "addr")]
    address: Option<Address>,
    phones: Vec<Phone>,
    tags: Vec<String>,
    nicknames: Option<Vec<String>>,
    attributes: BTreeMap<String, String>,
    #[column(converter = "cents")]
    balance: f64,
    #[column(skip)]
    cache: Option<String>,
}

#[derive(Entity, Default, Debug)]
#[entity(name = "book")]
struct Book {
    #[column(id)]
    isbn: String,
}

#[derive(Entity, Default, Debug, Clone, PartialEq)]
#[entity(name = "directory")]
struct Directory {
    #[column(id)]
    id: i64,
    phones: Vec<Option<Phone>>,
}

#[derive(Entity, Default, Debug)]
#[entity(name = "invoice")]
struct Invoice {
    #[column(id)]
    id: i64,
    #[column(converter = "strict_cents")]
    total: f64,
}

fn mapper_with(config: MapperConfig) -> Mapper {
    let mut converters = ConverterRegistry::new();
    converters.register_fn(
        "cents",
        |value| {
            let amount = value
                .as_f64()
                .ok_or_else(|| MapError::conversion("cents", "amount must be numeric"))?;
            Ok(Value::Integer((amount * 100.0).round() as i64))
        },
        |value| {
            let cents = value
                .as_i64()
                .ok_or_else(|| MapError::conversion("cents", "stored amount must be an integer"))?;
            Ok(Value::Float(cents as f64 / 100.0))
        },
    );
    Mapper::with_converters(converters, config)
}

fn mapper() -> Mapper {
    mapper_with(MapperConfig::default())
}

fn ada() -> Person {
    let mut attributes = BTreeMap::new();
    attributes.insert("field".to_string(), "mathematics".to_string());
    Person {
        id: 1,
        name: "Ada".to_string(),
        age: Some(36),
        address: Some(Address {
            street: "St James's Square".to_string(),
            city: "London".to_string(),
        }),
        phones: vec![
            Phone {
                kind: "home".to_string(),
                number: "111".to_string(),
            },
            Phone {
                kind: "work".to_string(),
                number: "222".to_string(),
            },
        ],
        tags: vec!["math".to_string(), "poetry".to_string()],
        nicknames: Some(vec!["Enchantress of Numbers".to_string()]),
        attributes,
        balance: 12.5,
        cache: None,
    }
}

fn entry<'a>(record: &'a Record, name: &str) -> &'a RecordValue {
    &record.find(name).unwrap_or_else(|| panic!("missing entry {}", name)).value
}

#[test]
fn test_full_round_trip() {
    let mapper = mapper();
    let person = ada();

    let record = mapper.converter().to_record(&person).unwrap();
    assert_eq!(record.name(), "person");

    let back: Person = mapper.converter().to_entity(&record).unwrap();
    assert_eq!(back, person);
}

#[test]
fn test_entries_follow_declaration_order() {
    let record = mapper().converter().to_record(&ada()).unwrap();
    let names: Vec<_> = record.entries().iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "name", "age", "addr", "phones", "tags", "nicknames", "attributes", "balance"]
    );
}

#[test]
fn test_embedded_record_shape() {
    let record = mapper().converter().to_record(&ada()).unwrap();
    assert_eq!(
        entry(&record, "addr"),
        &RecordValue::Record(vec![
            RecordEntry::scalar("street", "St James's Square"),
            RecordEntry::scalar("city", "London"),
        ])
    );
}

#[test]
fn test_embedded_collection_keeps_order() {
    let record = mapper().converter().to_record(&ada()).unwrap();
    match entry(&record, "phones") {
        RecordValue::RecordList(lists) => {
            assert_eq!(lists.len(), 2);
            assert_eq!(lists[0][1], RecordEntry::scalar("number", "111"));
            assert_eq!(lists[1][1], RecordEntry::scalar("number", "222"));
        }
        other => panic!("unexpected shape {:?}", other),
    }
    assert_eq!(
        entry(&record, "tags"),
        &RecordValue::Scalar(Value::List(vec!["math".into(), "poetry".into()]))
    );
}

#[test]
fn test_absent_fields_skipped_but_empty_collections_kept() {
    let person = Person {
        id: 2,
        name: "Grace".to_string(),
        nicknames: Some(Vec::new()),
        ..Default::default()
    };
    let record = mapper().converter().to_record(&person).unwrap();

    assert!(record.find("age").is_none());
    assert!(record.find("addr").is_none());
    assert!(record.find("cache").is_none());
    assert_eq!(entry(&record, "nicknames"), &RecordValue::Scalar(Value::List(Vec::new())));
    assert_eq!(entry(&record, "phones"), &RecordValue::RecordList(Vec::new()));

    let back: Person = mapper().converter().to_entity(&record).unwrap();
    assert_eq!(back.nicknames, Some(Vec::new()));
    assert_eq!(back.age, None);
    assert_eq!(back.address, None);
}

#[test]
fn test_partial_record_leaves_defaults() {
    let record = Record::new("person")
        .with(RecordEntry::scalar("id", 3))
        .with(RecordEntry::scalar("unknown", "ignored"));
    let person: Person = mapper().converter().to_entity(&record).unwrap();

    assert_eq!(person.id, 3);
    assert_eq!(person.name, "");
    assert_eq!(person.address, None);
    assert!(person.phones.is_empty());
    assert_eq!(person.balance, 0.0);
}

#[test]
fn test_converter_applied_both_ways() {
    let mapper = mapper();
    let record = mapper.converter().to_record(&ada()).unwrap();
    assert_eq!(entry(&record, "balance"), &RecordValue::Scalar(Value::Integer(1250)));

    let record = Record::new("person").with(RecordEntry::scalar("balance", 399));
    let person: Person = mapper.converter().to_entity(&record).unwrap();
    assert_eq!(person.balance, 3.99);
}

#[test]
fn test_missing_converter_fails() {
    let mapper = Mapper::new();
    assert!(matches!(
        mapper.converter().to_record(&ada()),
        Err(MapError::ConverterNotFound(id)) if id == "cents"
    ));
}

#[test]
fn test_map_shaped_document_input() {
    let document = json!({
        "id": 4,
        "name": "Alan",
        "addr": {"street": "Wilmslow Road", "city": "Manchester"},
        "phones": [{"kind": "home", "number": "333"}],
        "tags": ["logic"],
        "attributes": {"field": "computing"},
        "balance": 1000
    });
    let record = Record::from_json("person", &document).unwrap();
    let person: Person = mapper().converter().to_entity(&record).unwrap();

    assert_eq!(person.id, 4);
    assert_eq!(person.address.unwrap().city, "Manchester");
    assert_eq!(person.phones[0].number, "333");
    assert_eq!(person.tags, vec!["logic".to_string()]);
    assert_eq!(person.attributes.get("field").map(String::as_str), Some("computing"));
    assert_eq!(person.balance, 10.0);
}

#[test]
fn test_flattened_embedding() {
    let record = Record::new("person")
        .with(RecordEntry::scalar("id", 5))
        .with(RecordEntry::scalar("street", "Rue de Rivoli"))
        .with(RecordEntry::scalar("city", "Paris"));
    let person: Person = mapper().converter().to_entity(&record).unwrap();

    assert_eq!(
        person.address,
        Some(Address {
            street: "Rue de Rivoli".to_string(),
            city: "Paris".to_string(),
        })
    );
}

#[test]
fn test_resolution_by_name() {
    let mapper = mapper();
    mapper.register::<Person>().unwrap();
    mapper.register::<Book>().unwrap();
    let record = mapper.converter().to_record(&ada()).unwrap();

    let instance = mapper.converter().to_entity_by_name(&record).unwrap();
    assert_eq!(instance.downcast::<Person>().unwrap().name, "Ada");

    let person: Person = mapper.converter().to_entity_named(&record).unwrap();
    assert_eq!(person.id, 1);

    assert!(matches!(
        mapper.converter().to_entity_named::<Book>(&record),
        Err(MapError::TypeMismatch(_))
    ));
    assert!(matches!(
        mapper.converter().to_entity_by_name(&Record::new("unknown")),
        Err(MapError::EntityNotFound(name)) if name == "unknown"
    ));
}

#[test]
fn test_duplicate_entries() {
    let record = Record::new("person")
        .with(RecordEntry::scalar("name", "first"))
        .with(RecordEntry::scalar("name", "second"));

    let person: Person = mapper().converter().to_entity(&record).unwrap();
    assert_eq!(person.name, "first");

    let strict = mapper_with(MapperConfig::new().duplicate_entries(DuplicateEntryPolicy::Reject));
    assert!(matches!(
        strict.converter().to_entity::<Person>(&record),
        Err(MapError::DuplicateEntry(name)) if name == "name"
    ));
}

#[test]
fn test_shape_mismatch_is_an_error() {
    let record = Record::new("person").with(RecordEntry::new(
        "name",
        RecordValue::Record(vec![RecordEntry::scalar("first", "Ada")]),
    ));
    assert!(matches!(
        mapper().converter().to_entity::<Person>(&record),
        Err(MapError::TypeMismatch(_))
    ));

    let record = Record::new("person").with(RecordEntry::scalar("age", "thirty"));
    assert!(mapper().converter().to_entity::<Person>(&record).is_err());
}

#[test]
fn test_lenient_policy_skips_unreadable_fields() {
    let record = Record::new("person")
        .with(RecordEntry::scalar("id", 6))
        .with(RecordEntry::scalar("name", "Edsger"))
        .with(RecordEntry::scalar("age", "thirty"))
        .with(RecordEntry::new(
            "tags",
            RecordValue::Record(vec![RecordEntry::scalar("first", "graphs")]),
        ));

    let lenient = mapper_with(MapperConfig::new().access_policy(AccessPolicy::Lenient));
    let person: Person = lenient.converter().to_entity(&record).unwrap();
    assert_eq!(person.id, 6);
    assert_eq!(person.name, "Edsger");
    assert_eq!(person.age, None);
    assert!(person.tags.is_empty());

    assert!(matches!(
        mapper().converter().to_entity::<Person>(&record),
        Err(MapError::TypeMismatch(_))
    ));
}

#[test]
fn test_metadata_built_once() {
    let mapper = mapper();
    let first = mapper.entities().get::<Person>().unwrap();
    mapper.converter().to_record(&ada()).unwrap();
    let second = mapper.entities().get::<Person>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.id_field().unwrap().field_name, "id");
    assert_eq!(first.fields().len(), 9);
    assert!(first.field_by_record_name("addr").unwrap().kind.is_embedded());
    assert!(first.field_by_record_name("phones").unwrap().kind.is_embeddable_element());
}

#[test]
fn test_id_of_applies_converter() {
    let mapper = mapper();
    assert_eq!(mapper.converter().id_of(&ada()).unwrap(), Some(Value::Integer(1)));
    assert!(matches!(
        mapper.converter().id_of(&Book::default()),
        Ok(Some(Value::Text(isbn))) if isbn.is_empty()
    ));
}

#[test]
fn test_optional_embeddable_elements_round_trip() {
    let directory = Directory {
        id: 1,
        phones: vec![
            Some(Phone {
                kind: "home".to_string(),
                number: "111".to_string(),
            }),
            None,
            Some(Phone::default()),
        ],
    };
    let mapper = mapper();
    let record = mapper.converter().to_record(&directory).unwrap();
    match entry(&record, "phones") {
        RecordValue::RecordList(lists) => {
            assert_eq!(lists.len(), 3);
            assert!(lists[1].is_empty());
        }
        other => panic!("unexpected shape {:?}", other),
    }

    let back: Directory = mapper.converter().to_entity(&record).unwrap();
    assert_eq!(back, directory);
}

fn strict_cents() -> ConverterRegistry {
    let mut converters = ConverterRegistry::new();
    converters.register_fn(
        "strict_cents",
        |value| {
            let amount = value
                .as_f64()
                .ok_or_else(|| MapError::TypeMismatch(format!("not an amount: {}", value)))?;
            Ok(Value::Integer((amount * 100.0).round() as i64))
        },
        |value| Err(MapError::TypeMismatch(format!("not an amount: {}", value))),
    );
    converters
}

#[test]
fn test_converter_failures_reported_as_conversion() {
    let mapper = Mapper::with_converters(strict_cents(), MapperConfig::default());

    let record = mapper.converter().to_record(&Invoice { id: 1, total: 2.5 }).unwrap();
    assert_eq!(entry(&record, "total"), &RecordValue::Scalar(Value::Integer(250)));

    assert!(matches!(
        mapper.converter().to_entity::<Invoice>(&record),
        Err(MapError::Conversion { converter, .. }) if converter == "strict_cents"
    ));

    // converter failures are not field-level extraction failures
    let lenient = Mapper::with_converters(
        strict_cents(),
        MapperConfig::new().access_policy(AccessPolicy::Lenient),
    );
    assert!(matches!(
        lenient.converter().to_entity::<Invoice>(&record),
        Err(MapError::Conversion { .. })
    ));
}
