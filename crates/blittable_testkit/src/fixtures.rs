//! Test fixtures and document helpers.
//!
//! Provides a ready-made pool and context pair plus the sample documents
//! used across the integration tests.

use blittable_format::{write_document, ContextConfig, Document, DocumentContext, TokenBuffer};
use blittable_memory::{MemoryPool, PoolConfig};
use serde_json::{json, Map, Value as JsonValue};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call has an effect.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A pool and a context bound to it.
pub struct TestEnv {
    /// The shared pool.
    pub pool: Arc<MemoryPool>,
    ctx: DocumentContext,
}

impl TestEnv {
    /// Creates an environment with default settings.
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Creates an environment with a custom context configuration.
    pub fn with_config(config: ContextConfig) -> Self {
        init_test_tracing();
        let pool = MemoryPool::shared(PoolConfig::default());
        let ctx = DocumentContext::new(Arc::clone(&pool), config)
            .expect("Failed to create document context");
        Self { pool, ctx }
    }

    /// Returns the context.
    pub fn context(&self) -> &DocumentContext {
        &self.ctx
    }

    /// Returns the context mutably, for writers.
    pub fn context_mut(&mut self) -> &mut DocumentContext {
        &mut self.ctx
    }

    /// Encodes a JSON value, panicking on failure.
    pub fn encode(&mut self, value: &JsonValue) -> Document {
        let tokens = TokenBuffer::from_json(value).expect("Failed to tokenize document");
        write_document(tokens, &mut self.ctx).expect("Failed to encode document")
    }

    /// Encodes a value and reads it straight back as JSON.
    pub fn roundtrip(&mut self, value: &JsonValue) -> JsonValue {
        let doc = self.encode(value);
        let root = doc.reader(&self.ctx).expect("Failed to open document");
        root.to_json().expect("Failed to materialize document")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// The sample employee record.
pub fn employee_json() -> JsonValue {
    json!({
        "Name": "Oren",
        "Age": 34,
        "Dogs": ["Arava", "Oscar", "Phoebe"],
        "Office": {
            "Name": "Hibernating Rhinos",
            "Street": "Hanashia 21",
            "City": "Hadera"
        }
    })
}

/// A flat object with `count` properties `Field{i}` holding `"{i}"`.
pub fn flat_object_json(count: usize) -> JsonValue {
    let mut map = Map::with_capacity(count);
    for i in 0..count {
        map.insert(format!("Field{i}"), JsonValue::String(i.to_string()));
    }
    JsonValue::Object(map)
}

/// An array of `count` small integers.
pub fn int_array_json(count: usize) -> JsonValue {
    JsonValue::Array((0..count as i64).map(JsonValue::from).collect())
}

/// An object nested `depth` levels deep through the property `"child"`.
pub fn nested_object_json(depth: usize) -> JsonValue {
    let mut value = json!({"leaf": true});
    for level in 0..depth {
        value = json!({"level": level, "child": value});
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_object_has_expected_fields() {
        let value = flat_object_json(3);
        assert_eq!(value, json!({"Field0": "0", "Field1": "1", "Field2": "2"}));
    }

    #[test]
    fn env_roundtrips_employee() {
        let mut env = TestEnv::new();
        assert_eq!(env.roundtrip(&employee_json()), employee_json());
    }

    #[test]
    fn nested_fixture_depth() {
        let mut value = &nested_object_json(3);
        let mut levels = 0;
        while let Some(child) = value.get("child") {
            value = child;
            levels += 1;
        }
        assert_eq!(levels, 3);
    }
}
