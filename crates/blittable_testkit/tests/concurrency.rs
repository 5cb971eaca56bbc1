//! Many threads reading one document through one context.

use blittable_format::BlittableValue;
use blittable_testkit::prelude::*;
use std::thread;

#[test]
fn hundred_threads_flat_lookups() {
    let mut env = TestEnv::new();
    let doc = env.encode(&flat_object_json(1000));
    let root = doc.reader(env.context()).unwrap();
    let mut names: Vec<String> = (0..1000).map(|i| format!("Field{i}")).collect();
    names.push("Missing".to_string());

    let config = StressConfig {
        operations: 200,
        ..StressConfig::default()
    };
    let result = stress_concurrent_lookups(&root, &names, &config, |name, value| {
        match (name.strip_prefix("Field"), value) {
            (Some(expected), Ok(Some(v))) => {
                v.as_string().and_then(|s| s.as_str().ok()) == Some(expected)
            }
            (None, Ok(None)) => true,
            _ => false,
        }
    });

    assert_eq!(result.total_ops, 100 * 200);
    assert_eq!(result.failed_ops, 0);
}

#[test]
fn hundred_threads_resolve_nested_values() {
    let mut env = TestEnv::new();
    let doc = env.encode(&employee_json());
    let root = doc.reader(env.context()).unwrap();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..100)
            .map(|t| {
                let root = &root;
                scope.spawn(move || {
                    let office = root.get("Office").unwrap();
                    let street = office.as_object().unwrap().get("Street").unwrap();
                    assert_eq!(street.as_string().unwrap().as_str().unwrap(), "Hanashia 21");

                    let dogs = root.get("Dogs").unwrap();
                    let dog = dogs.as_array().unwrap().get(t % 3).unwrap();
                    dog.as_string().unwrap().materialize().unwrap()
                })
            })
            .collect();

        for (t, handle) in handles.into_iter().enumerate() {
            let expected = ["Arava", "Oscar", "Phoebe"][t % 3];
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn threads_share_one_compressed_string() {
    let mut env = TestEnv::new();
    let text = "Hibernating Rhinos, Hadera. ".repeat(40);
    let doc = env.encode(&serde_json::json!({ "bio": text }));
    let root = doc.reader(env.context()).unwrap();

    thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                let bio = root.get("bio").unwrap();
                match bio {
                    BlittableValue::String(s) => {
                        assert!(s.is_compressed());
                        assert_eq!(s.as_str().unwrap(), text);
                    }
                    other => panic!("expected a string, got {other:?}"),
                }
            });
        }
    });
}

#[test]
fn threads_encode_with_separate_contexts() {
    thread::scope(|scope| {
        for t in 0..8 {
            scope.spawn(move || {
                let mut env = TestEnv::new();
                let value = serde_json::json!({"thread": t, "fields": flat_object_json(64)});
                assert_eq!(env.roundtrip(&value), value);
            });
        }
    });
}
