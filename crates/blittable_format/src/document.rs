//! Finished, immutable documents.

use crate::context::DocumentContext;
use crate::error::BlittableResult;
use crate::reader::{BlittableObject, DocumentLayout};
use blittable_memory::{MemoryPool, PooledBlock};
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// A finished document held in one pool block.
///
/// The bytes never change after the writer is done. Readers borrow the
/// document, so it cannot go back to the pool while any reader is alive; on
/// drop the block is released.
pub struct Document {
    pool: Arc<MemoryPool>,
    block: Option<PooledBlock>,
    len: usize,
}

impl Document {
    pub(crate) fn from_block(pool: Arc<MemoryPool>, block: PooledBlock, len: usize) -> Self {
        Self {
            pool,
            block: Some(block),
            len,
        }
    }

    /// Copies externally stored document bytes into a pool block.
    ///
    /// The bytes are not validated until a reader is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be acquired.
    pub fn from_bytes(pool: Arc<MemoryPool>, bytes: &[u8]) -> BlittableResult<Self> {
        let mut block = pool.acquire(bytes.len())?;
        block[..bytes.len()].copy_from_slice(bytes);
        Ok(Self::from_block(pool, block, bytes.len()))
    }

    /// Returns the document bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.block {
            Some(block) => &block[..self.len],
            None => &[],
        }
    }

    /// Returns the document size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false for a written document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the document bytes as a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Parses the trailer.
    ///
    /// # Errors
    ///
    /// Returns an error if the trailer is malformed.
    pub fn layout<'a>(&'a self, ctx: &'a DocumentContext) -> BlittableResult<DocumentLayout<'a>> {
        DocumentLayout::parse(self.as_bytes(), ctx)
    }

    /// Returns a reader over the root object.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn reader<'a>(&'a self, ctx: &'a DocumentContext) -> BlittableResult<BlittableObject<'a>> {
        self.layout(ctx)?.root()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document").field("len", &self.len).finish()
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            let id = block.id();
            if let Err(e) = self.pool.release(block) {
                error!(block = %id, error = %e, "failed to release document");
            }
        }
    }
}
