//! Pool configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::MemoryPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Ceiling on cumulative outstanding bytes.
    ///
    /// Every `acquire` that leaves the pool above this ceiling drains the
    /// free lists back to the allocator.
    pub max_outstanding_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_outstanding_bytes: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

impl PoolConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outstanding-bytes ceiling.
    #[must_use]
    pub const fn max_outstanding_bytes(mut self, bytes: usize) -> Self {
        self.max_outstanding_bytes = bytes;
        self
    }
}
