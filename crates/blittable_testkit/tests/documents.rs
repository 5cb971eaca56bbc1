//! Round-trip and navigation tests over whole documents.

use blittable_format::{BlittableWriter, TokenBuffer, ValueKind};
use blittable_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;

#[test]
fn employee_navigation() {
    let mut env = TestEnv::new();
    let doc = env.encode(&employee_json());
    let root = doc.reader(env.context()).unwrap();

    assert_eq!(root.len(), 4);
    assert_eq!(root.property_names().unwrap(), ["Age", "Dogs", "Name", "Office"]);
    assert_eq!(root.get("Age").unwrap().as_integer(), Some(34));

    let dogs = root.get("Dogs").unwrap();
    let dogs = dogs.as_array().unwrap();
    assert_eq!(dogs.len(), 3);
    let oscar = dogs.get(1).unwrap();
    assert_eq!(oscar.as_string().unwrap().as_str().unwrap(), "Oscar");

    let office = root.get("Office").unwrap();
    let office = office.as_object().unwrap();
    let city = office.get("City").unwrap();
    assert_eq!(city.as_string().unwrap().as_str().unwrap(), "Hadera");

    assert!(root.try_get("Salary").unwrap().is_none());
    assert_eq!(root.to_json().unwrap(), employee_json());
}

#[test]
fn shared_names_are_stored_once() {
    let mut env = TestEnv::new();
    let doc = env.encode(&employee_json());
    let layout = doc.layout(env.context()).unwrap();

    // "Name" appears in the root and in "Office"; ids follow first use.
    assert_eq!(layout.name_count(), 6);
    assert_eq!(
        layout.property_names().unwrap(),
        ["Name", "Age", "Dogs", "Office", "Street", "City"]
    );
}

#[test]
fn empty_containers_roundtrip() {
    let mut env = TestEnv::new();
    let value = json!({"object": {}, "array": [], "nested": [[], {}, [[]]]});
    assert_eq!(env.roundtrip(&value), value);

    let doc = env.encode(&json!({}));
    let root = doc.reader(env.context()).unwrap();
    assert!(root.is_empty());
    assert!(root.properties().unwrap().is_empty());
}

#[test]
fn scalar_kinds_roundtrip() {
    let mut env = TestEnv::new();
    let value = json!({
        "int": -7,
        "float": 2.5,
        "string": "text",
        "true": true,
        "false": false,
        "null": null,
    });
    let doc = env.encode(&value);
    let root = doc.reader(env.context()).unwrap();

    let kinds: Vec<ValueKind> = root
        .properties()
        .unwrap()
        .iter()
        .map(|(_, value)| value.kind())
        .collect();
    assert_eq!(
        kinds,
        [
            ValueKind::Boolean,
            ValueKind::Float,
            ValueKind::Integer,
            ValueKind::Null,
            ValueKind::String,
            ValueKind::Boolean,
        ]
    );
    assert_eq!(root.to_json().unwrap(), value);
}

#[test]
fn array_of_objects() {
    let mut env = TestEnv::new();
    let value = json!({
        "items": [
            {"id": 1, "tags": ["a", "b"]},
            {"id": 2, "tags": []},
            {"id": 3},
        ]
    });
    let doc = env.encode(&value);
    let root = doc.reader(env.context()).unwrap();
    let items = root.get("items").unwrap();
    let items = items.as_array().unwrap();

    let ids: Vec<i64> = items
        .values()
        .unwrap()
        .iter()
        .map(|item| item.as_object().unwrap().get("id").unwrap().as_integer().unwrap())
        .collect();
    assert_eq!(ids, [1, 2, 3]);
    assert!(items
        .get(2)
        .unwrap()
        .as_object()
        .unwrap()
        .try_get("tags")
        .unwrap()
        .is_none());
}

#[test]
fn writer_reports_size_and_copies() {
    let mut env = TestEnv::new();
    let tokens = TokenBuffer::from_json(&employee_json()).unwrap();
    let mut writer = BlittableWriter::new(tokens, env.context_mut()).unwrap();
    assert_eq!(writer.size_in_bytes(), 0);
    writer.write().unwrap();

    let size = writer.size_in_bytes();
    assert!(size > 0);
    assert_eq!(writer.property_count(), 6);

    let mut bytes = vec![0u8; size + 8];
    assert_eq!(writer.copy_to(&mut bytes).unwrap(), size);
    let doc = writer.finish().unwrap();
    assert_eq!(&bytes[..size], doc.as_bytes());
}

#[test]
fn stored_bytes_reopen_in_a_new_context() {
    let mut first = TestEnv::new();
    let bytes = first.encode(&employee_json()).to_vec();

    let second = TestEnv::new();
    let doc = blittable_format::Document::from_bytes(second.pool.clone(), &bytes).unwrap();
    let root = doc.reader(second.context()).unwrap();
    assert_eq!(root.to_json().unwrap(), employee_json());
}

#[test]
fn property_order_does_not_change_lookups() {
    let mut env = TestEnv::new();
    let a = env.encode(&json!({"b": 2, "a": 1, "c": 3}));
    let b = env.encode(&json!({"c": 3, "b": 2, "a": 1}));
    let ra = a.reader(env.context()).unwrap();
    let rb = b.reader(env.context()).unwrap();

    assert_eq!(ra.property_names().unwrap(), rb.property_names().unwrap());
    for name in ["a", "b", "c"] {
        assert_eq!(
            ra.get(name).unwrap().as_integer(),
            rb.get(name).unwrap().as_integer()
        );
    }
    assert_eq!(ra.to_json().unwrap(), rb.to_json().unwrap());
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn generated_documents_roundtrip(doc in json_document_strategy()) {
        let mut env = TestEnv::new();
        prop_assert_eq!(env.roundtrip(&doc), doc);
    }

    #[test]
    fn insertion_order_is_irrelevant((original, shuffled) in shuffled_document_strategy()) {
        let mut env = TestEnv::new();
        let a = env.encode(&original);
        let b = env.encode(&shuffled);
        let ra = a.reader(env.context()).unwrap();
        let rb = b.reader(env.context()).unwrap();

        prop_assert_eq!(ra.property_names().unwrap(), rb.property_names().unwrap());
        for name in original.as_object().unwrap().keys() {
            prop_assert_eq!(
                ra.get(name).unwrap().to_json().unwrap(),
                rb.get(name).unwrap().to_json().unwrap()
            );
        }
    }

    #[test]
    fn generated_property_names_are_sorted(doc in json_document_strategy()) {
        let mut env = TestEnv::new();
        let encoded = env.encode(&doc);
        let root = encoded.reader(env.context()).unwrap();
        let names = root.property_names().unwrap();
        prop_assert!(names.windows(2).all(|w| w[0].as_bytes() <= w[1].as_bytes()));
    }
}
