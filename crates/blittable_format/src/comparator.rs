//! Property-name comparison.
//!
//! The writer sorts every object's entries with [`compare_encoded`] and the
//! reader binary-searches them with the same function. Both sides must agree
//! bit for bit or lookups silently miss.

use crate::error::BlittableResult;
use blittable_memory::{MemoryPool, PooledBlock};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Compares two UTF-8 encoded names byte by byte over their common prefix;
/// on a tie the shorter name sorts first.
#[must_use]
pub fn compare_encoded(a: &[u8], b: &[u8]) -> Ordering {
    let common = a.len().min(b.len());
    match a[..common].cmp(&b[..common]) {
        Ordering::Equal => a.len().cmp(&b.len()),
        other => other,
    }
}

/// A property name encoded once into pooled memory.
///
/// Obtained from [`crate::DocumentContext::comparator_for`]. The block goes
/// back to the pool when the last handle drops.
pub struct PropertyComparator {
    pool: Arc<MemoryPool>,
    block: Option<PooledBlock>,
    len: usize,
}

impl PropertyComparator {
    pub(crate) fn new(pool: Arc<MemoryPool>, name: &str) -> BlittableResult<Self> {
        let mut block = pool.acquire(name.len())?;
        block[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            pool,
            block: Some(block),
            len: name.len(),
        })
    }

    /// Returns the UTF-8 encoding of the name.
    #[must_use]
    pub fn encoded(&self) -> &[u8] {
        match &self.block {
            Some(block) => &block[..self.len],
            None => &[],
        }
    }

    /// Returns the encoded length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true for the empty name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Orders this name against raw encoded bytes, without allocating.
    #[must_use]
    pub fn compare_to(&self, other: &[u8]) -> Ordering {
        compare_encoded(self.encoded(), other)
    }

    /// Returns the name as an owned string.
    #[must_use]
    pub fn materialize(&self) -> String {
        String::from_utf8_lossy(self.encoded()).into_owned()
    }
}

impl fmt::Debug for PropertyComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyComparator")
            .field("name", &String::from_utf8_lossy(self.encoded()))
            .finish()
    }
}

impl Drop for PropertyComparator {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            let id = block.id();
            if let Err(e) = self.pool.release(block) {
                error!(block = %id, error = %e, "failed to release property name");
            }
        }
    }
}
