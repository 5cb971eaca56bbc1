//! Per-batch document state.

use crate::comparator::PropertyComparator;
use crate::compression::Lz4Codec;
use crate::config::ContextConfig;
use crate::error::BlittableResult;
use blittable_memory::{GrowableBuffer, MemoryPool, PooledBlock};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// State shared by the writes and reads of one batch of documents.
///
/// A context owns a scratch buffer, the cache of encoded property names and
/// an LZ4 codec. A writer borrows it mutably; once writing is done, any
/// number of readers on any number of threads may share it.
///
/// # Example
///
/// ```rust
/// use blittable_format::{ContextConfig, DocumentContext};
/// use blittable_memory::{MemoryPool, PoolConfig};
///
/// let pool = MemoryPool::shared(PoolConfig::default());
/// let ctx = DocumentContext::new(pool, ContextConfig::default()).unwrap();
///
/// let a = ctx.comparator_for("Name").unwrap();
/// let b = ctx.comparator_for("Name").unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub struct DocumentContext {
    pool: Arc<MemoryPool>,
    config: ContextConfig,
    scratch: Option<PooledBlock>,
    comparators: RwLock<HashMap<Box<str>, Arc<PropertyComparator>>>,
    codec: Lz4Codec,
    documents_started: u64,
}

impl DocumentContext {
    /// Creates a context drawing memory from `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch buffer cannot be acquired.
    pub fn new(pool: Arc<MemoryPool>, config: ContextConfig) -> BlittableResult<Self> {
        let scratch = pool.acquire(config.initial_scratch_size)?;
        Ok(Self {
            pool,
            config,
            scratch: Some(scratch),
            comparators: RwLock::new(HashMap::new()),
            codec: Lz4Codec::new(),
            documents_started: 0,
        })
    }

    /// Returns the memory pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns the LZ4 codec.
    #[must_use]
    pub fn codec(&self) -> &Lz4Codec {
        &self.codec
    }

    /// Returns the cached encoding of `name`, encoding it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot supply memory for a new name.
    pub fn comparator_for(&self, name: &str) -> BlittableResult<Arc<PropertyComparator>> {
        if let Some(comparator) = self.comparators.read().get(name) {
            return Ok(Arc::clone(comparator));
        }

        let mut comparators = self.comparators.write();
        if let Some(comparator) = comparators.get(name) {
            return Ok(Arc::clone(comparator));
        }
        let comparator = Arc::new(PropertyComparator::new(Arc::clone(&self.pool), name)?);
        comparators.insert(Box::from(name), Arc::clone(&comparator));
        Ok(comparator)
    }

    /// Returns the number of cached property names.
    #[must_use]
    pub fn cached_names(&self) -> usize {
        self.comparators.read().len()
    }

    /// Returns a scratch area of at least `min_size` bytes.
    ///
    /// The scratch buffer grows geometrically and never shrinks. Its
    /// contents are unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if a larger block cannot be acquired.
    pub fn scratch(&mut self, min_size: usize) -> BlittableResult<&mut [u8]> {
        let current = self.scratch.as_ref().map_or(0, |block| block.len());
        if current < min_size {
            let grown = self.pool.acquire(min_size.max(current.saturating_mul(2)))?;
            if let Some(old) = self.scratch.replace(grown) {
                self.pool.release(old)?;
            }
        }
        match self.scratch.as_mut() {
            Some(block) => Ok(block.as_mut_slice()),
            None => Ok(&mut []),
        }
    }

    /// Creates a buffer for the next document.
    ///
    /// # Errors
    ///
    /// Returns an error if the first segment cannot be acquired.
    pub fn new_buffer(&mut self) -> BlittableResult<GrowableBuffer> {
        self.documents_started += 1;
        let owner: Arc<str> = Arc::from(format!("document-{}", self.documents_started));
        Ok(GrowableBuffer::new(
            Arc::clone(&self.pool),
            self.config.initial_buffer_size,
            Some(owner),
        )?)
    }

    /// Releases the scratch buffer and the cached property names.
    ///
    /// Idempotent. Names still held by a live comparator handle are released
    /// when that handle drops.
    pub fn dispose(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            let id = scratch.id();
            if let Err(e) = self.pool.release(scratch) {
                error!(block = %id, error = %e, "failed to release scratch buffer");
            }
        }
        self.comparators.write().clear();
    }
}

impl fmt::Debug for DocumentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentContext")
            .field("config", &self.config)
            .field("cached_names", &self.cached_names())
            .field("scratch", &self.scratch.as_ref().map(|block| block.len()))
            .finish()
    }
}

impl Drop for DocumentContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
