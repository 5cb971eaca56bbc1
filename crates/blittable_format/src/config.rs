//! Document context configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::DocumentContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Initial size of the scratch buffer. It grows on demand.
    pub initial_scratch_size: usize,

    /// Size of the first segment of every document buffer.
    pub initial_buffer_size: usize,

    /// Whether the writer LZ4-compresses long strings.
    pub compression: bool,

    /// Strings longer than this many UTF-8 bytes are compression candidates.
    pub compression_threshold: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            initial_scratch_size: 256,
            initial_buffer_size: 64,
            compression: true,
            compression_threshold: 128,
        }
    }
}

impl ContextConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial scratch buffer size.
    #[must_use]
    pub const fn initial_scratch_size(mut self, size: usize) -> Self {
        self.initial_scratch_size = size;
        self
    }

    /// Sets the first segment size of document buffers.
    #[must_use]
    pub const fn initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = size;
        self
    }

    /// Enables or disables string compression.
    #[must_use]
    pub const fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Sets the string length above which compression is attempted.
    #[must_use]
    pub const fn compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ContextConfig::default();
        assert_eq!(config.initial_scratch_size, 256);
        assert_eq!(config.initial_buffer_size, 64);
        assert!(config.compression);
        assert_eq!(config.compression_threshold, 128);
    }

    #[test]
    fn builder_pattern() {
        let config = ContextConfig::new()
            .initial_scratch_size(1024)
            .initial_buffer_size(16)
            .compression(false)
            .compression_threshold(512);

        assert_eq!(config.initial_scratch_size, 1024);
        assert_eq!(config.initial_buffer_size, 16);
        assert!(!config.compression);
        assert_eq!(config.compression_threshold, 512);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: ContextConfig = serde_json::from_str(r#"{"compression": false}"#).unwrap();
        assert!(!config.compression);
        assert_eq!(config.compression_threshold, 128);
    }
}
