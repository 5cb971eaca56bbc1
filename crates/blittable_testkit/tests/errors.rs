//! Error reporting for bad token streams, bad bytes and bad lookups.

use blittable_format::{
    write_document, BlittableError, BlittableWriter, Document, Token, TokenBuffer,
    MAX_NESTING_DEPTH, MIN_DOCUMENT_LEN,
};
use blittable_testkit::prelude::*;
use serde_json::json;

fn write_tokens(env: &mut TestEnv, tokens: Vec<Token>) -> BlittableError {
    write_document(TokenBuffer::new(tokens), env.context_mut()).unwrap_err()
}

#[test]
fn empty_stream_is_eof() {
    let mut env = TestEnv::new();
    assert!(matches!(
        write_tokens(&mut env, vec![]),
        BlittableError::UnexpectedEof { .. }
    ));
}

#[test]
fn root_must_be_an_object() {
    let mut env = TestEnv::new();
    let err = write_tokens(&mut env, vec![Token::StartArray, Token::EndArray]);
    assert!(matches!(err, BlittableError::UnexpectedToken { .. }), "{err}");

    let err = write_tokens(&mut env, vec![Token::Integer(1)]);
    assert!(matches!(err, BlittableError::UnexpectedToken { .. }), "{err}");
}

#[test]
fn truncated_streams_are_eof() {
    let mut env = TestEnv::new();
    let full = TokenBuffer::from_json(&employee_json()).unwrap().tokens().to_vec();
    for cut in 1..full.len() {
        let err = write_tokens(&mut env, full[..cut].to_vec());
        assert!(
            matches!(err, BlittableError::UnexpectedEof { .. }),
            "cut at {cut}: {err}"
        );
    }
}

#[test]
fn misplaced_tokens_are_rejected() {
    let mut env = TestEnv::new();
    let err = write_tokens(
        &mut env,
        vec![Token::StartObject, Token::Integer(1), Token::EndObject],
    );
    assert!(matches!(err, BlittableError::UnexpectedToken { .. }), "{err}");

    let err = write_tokens(
        &mut env,
        vec![
            Token::StartObject,
            Token::PropertyName("a".into()),
            Token::EndArray,
        ],
    );
    assert!(matches!(err, BlittableError::UnexpectedToken { .. }), "{err}");
}

#[test]
fn raw_bytes_are_unsupported() {
    let mut env = TestEnv::new();
    let err = write_tokens(
        &mut env,
        vec![
            Token::StartObject,
            Token::PropertyName("blob".into()),
            Token::Bytes(vec![1, 2, 3]),
            Token::EndObject,
        ],
    );
    assert!(matches!(err, BlittableError::Unsupported { .. }), "{err}");
}

#[test]
fn integers_beyond_i64_are_unsupported() {
    for value in [json!({"big": u64::MAX}), json!({"a": [1, {"b": 9223372036854775808u64}]})] {
        let err = TokenBuffer::from_json(&value).unwrap_err();
        assert!(matches!(err, BlittableError::Unsupported { .. }), "{err}");
    }

    let mut env = TestEnv::new();
    let edges = json!({"max": i64::MAX, "min": i64::MIN});
    assert_eq!(env.roundtrip(&edges), edges);
}

#[test]
fn undefined_is_written_as_null() {
    let mut env = TestEnv::new();
    let doc = write_document(
        TokenBuffer::new(vec![
            Token::StartObject,
            Token::PropertyName("u".into()),
            Token::Undefined,
            Token::EndObject,
        ]),
        env.context_mut(),
    )
    .unwrap();
    let root = doc.reader(env.context()).unwrap();
    assert!(root.get("u").unwrap().is_null());
}

#[test]
fn failed_write_returns_buffer_to_pool() {
    let mut env = TestEnv::new();
    let before = env.pool.stats().outstanding_blocks;
    write_tokens(&mut env, vec![Token::StartObject]);
    assert_eq!(env.pool.stats().outstanding_blocks, before);
}

#[test]
fn writer_is_single_use() {
    let mut env = TestEnv::new();
    let mut writer =
        BlittableWriter::new(TokenBuffer::from_json(&json!({"a": 1})).unwrap(), env.context_mut()).unwrap();

    let mut dest = [0u8; 64];
    assert!(matches!(
        writer.copy_to(&mut dest),
        Err(BlittableError::InvalidOperation { .. })
    ));

    writer.write().unwrap();
    assert!(matches!(
        writer.write(),
        Err(BlittableError::InvalidOperation { .. })
    ));

    let mut tiny = [0u8; 2];
    assert!(matches!(
        writer.copy_to(&mut tiny),
        Err(BlittableError::InvalidOperation { .. })
    ));
}

#[test]
fn nesting_limit() {
    let mut env = TestEnv::new();
    // The fixture wraps one leaf object, so depth + 1 objects in total.
    let deepest = nested_object_json(MAX_NESTING_DEPTH - 1);
    assert_eq!(env.roundtrip(&deepest), deepest);

    let too_deep = nested_object_json(MAX_NESTING_DEPTH);
    let err = write_document(TokenBuffer::from_json(&too_deep).unwrap(), env.context_mut()).unwrap_err();
    assert!(matches!(err, BlittableError::InvalidOperation { .. }), "{err}");
}

#[test]
fn missing_members_and_indexes() {
    let mut env = TestEnv::new();
    let doc = env.encode(&employee_json());
    let root = doc.reader(env.context()).unwrap();

    assert_eq!(
        root.get("Salary").unwrap_err(),
        BlittableError::MemberNotFound {
            name: "Salary".into()
        }
    );

    let dogs = root.get("Dogs").unwrap();
    let dogs = dogs.as_array().unwrap();
    assert!(dogs.try_get(3).unwrap().is_none());
    assert_eq!(
        dogs.get(3).unwrap_err(),
        BlittableError::IndexOutOfRange { index: 3, len: 3 }
    );
}

#[test]
fn short_input_is_rejected() {
    let env = TestEnv::new();
    for len in 0..MIN_DOCUMENT_LEN {
        let doc = Document::from_bytes(env.pool.clone(), &[0u8; MIN_DOCUMENT_LEN][..len]).unwrap();
        let err = doc.reader(env.context()).unwrap_err();
        assert!(err.is_format_error(), "len {len}: {err}");
    }
}

#[test]
fn corrupted_documents_never_panic() {
    let mut env = TestEnv::new();
    let bytes = env.encode(&employee_json()).to_vec();

    // Truncation from the front or the back breaks the trailer or its targets.
    for cut in 0..bytes.len() {
        let doc = Document::from_bytes(env.pool.clone(), &bytes[..cut]).unwrap();
        if let Ok(root) = doc.reader(env.context()) {
            let _ = root.to_json();
        }
    }

    // Flipping single bytes may or may not be detected, but must not panic.
    for i in 0..bytes.len() {
        let mut corrupted = bytes.clone();
        corrupted[i] ^= 0xFF;
        let doc = Document::from_bytes(env.pool.clone(), &corrupted).unwrap();
        if let Ok(root) = doc.reader(env.context()) {
            let _ = root.to_json();
            let _ = root.try_get("Office");
        }
    }
}

#[test]
fn bad_root_tag_is_reported() {
    let mut env = TestEnv::new();
    let mut bytes = env.encode(&json!({"a": 1})).to_vec();
    let last = bytes.len() - 1;

    bytes[last] = 0x12;
    let doc = Document::from_bytes(env.pool.clone(), &bytes).unwrap();
    assert!(doc.reader(env.context()).unwrap_err().is_format_error());

    bytes[last] = 0x0F;
    let doc = Document::from_bytes(env.pool.clone(), &bytes).unwrap();
    assert!(doc.reader(env.context()).unwrap_err().is_format_error());
}
