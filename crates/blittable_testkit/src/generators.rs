//! Property-based test generators using proptest.
//!
//! Provides strategies for generating JSON documents the writer accepts.

use proptest::prelude::*;
use serde_json::{Map, Number, Value as JsonValue};

/// Strategy for generating property names.
///
/// Mostly short ASCII, with some non-ASCII names to exercise byte ordering.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_]{0,15}").expect("Invalid regex"),
        1 => prop::string::string_regex("[a-zé世]{1,6}").expect("Invalid regex"),
    ]
}

/// Strategy for generating string values, including long compressible ones.
pub fn string_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        6 => ".{0,24}",
        1 => ("[a-z ]{1,8}", 20usize..60).prop_map(|(unit, times)| unit.repeat(times)),
        1 => prop::string::string_regex("[a-zA-Z0-9]{129,300}").expect("Invalid regex"),
    ]
}

/// Strategy for generating finite floats.
pub fn float_strategy() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::SUBNORMAL
}

/// Strategy for generating scalar JSON values.
pub fn json_scalar_strategy() -> impl Strategy<Value = JsonValue> {
    prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::Bool),
        any::<i64>().prop_map(JsonValue::from),
        float_strategy().prop_filter_map("float must be finite", |f| {
            Number::from_f64(f).map(JsonValue::Number)
        }),
        string_value_strategy().prop_map(JsonValue::String),
    ]
}

/// Strategy for generating arbitrary JSON values up to `depth` levels.
pub fn json_value_strategy(depth: u32) -> impl Strategy<Value = JsonValue> {
    json_scalar_strategy().prop_recursive(depth, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(JsonValue::Array),
            prop::collection::btree_map(property_name_strategy(), inner, 0..8)
                .prop_map(|entries| JsonValue::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for generating whole documents; the root is always an object.
pub fn json_document_strategy() -> impl Strategy<Value = JsonValue> {
    prop::collection::btree_map(property_name_strategy(), json_value_strategy(3), 0..12)
        .prop_map(|entries| JsonValue::Object(entries.into_iter().collect()))
}

/// Strategy for generating a document and a permutation of its properties.
///
/// Both objects hold the same properties in different insertion orders.
pub fn shuffled_document_strategy() -> impl Strategy<Value = (JsonValue, JsonValue)> {
    prop::collection::btree_map(property_name_strategy(), json_scalar_strategy(), 1..16)
        .prop_flat_map(|entries| {
            let entries: Vec<(String, JsonValue)> = entries.into_iter().collect();
            let len = entries.len();
            (Just(entries), Just((0..len).collect::<Vec<_>>()).prop_shuffle())
        })
        .prop_map(|(entries, order)| {
            let original: Map<_, _> = entries.iter().cloned().collect();
            let shuffled: Map<_, _> = order.into_iter().map(|i| entries[i].clone()).collect();
            (JsonValue::Object(original), JsonValue::Object(shuffled))
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
