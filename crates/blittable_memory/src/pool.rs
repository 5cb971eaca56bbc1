//! Size-bucketed memory pool.

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// One size class per bit of `usize`.
const SIZE_CLASSES: usize = usize::BITS as usize;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a pooled allocation.
///
/// Ids play the role of addresses: an id is unique among the blocks a pool
/// has outstanding, and a block keeps its id when it is recycled through a
/// free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    /// Returns the raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returns the size class serving a request of `min_size` bytes: the
/// smallest power of two that is `>= min_size` (and at least 1).
#[must_use]
pub fn size_class_for(min_size: usize) -> Option<usize> {
    min_size.max(1).checked_next_power_of_two()
}

/// Bookkeeping for one outstanding allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRecord {
    /// The block id.
    pub block: BlockId,
    /// The power-of-two size of the block.
    pub size: usize,
    /// Optional tag naming the component or document holding the block.
    pub owner: Option<Arc<str>>,
}

/// A block of memory handed out by a [`MemoryPool`].
///
/// The block owns its bytes. Handing it back with [`MemoryPool::release`]
/// recycles it; dropping it frees the memory but leaves the allocation
/// recorded as outstanding until the pool is disposed.
pub struct PooledBlock {
    id: BlockId,
    pool: u64,
    data: Box<[u8]>,
}

impl PooledBlock {
    /// Returns the block id.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the id of the pool that handed out this block.
    #[must_use]
    pub fn pool_id(&self) -> u64 {
        self.pool
    }

    /// Returns the capacity of the block, always a power of two.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: the smallest size class is one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the block contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Returns the block contents mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Deref for PooledBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl fmt::Debug for PooledBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBlock")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A recycled block waiting in a free list.
struct FreeBlock {
    id: BlockId,
    data: Box<[u8]>,
}

/// Point-in-time counters of a [`MemoryPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Number of blocks currently handed out.
    pub outstanding_blocks: usize,
    /// Total bytes currently handed out.
    pub outstanding_bytes: usize,
    /// Number of blocks waiting in free lists.
    pub free_blocks: usize,
    /// Total bytes waiting in free lists.
    pub free_bytes: usize,
    /// Number of `acquire` calls so far.
    pub acquire_calls: u64,
    /// Number of `release` calls so far.
    pub release_calls: u64,
}

/// A pool of power-of-two sized memory blocks.
///
/// # Thread Safety
///
/// The outstanding map and each size class's free list are locked
/// independently, so callers on different threads contend only when they
/// touch the same structure. There is no lock spanning the whole pool.
///
/// # Example
///
/// ```rust
/// use blittable_memory::{MemoryPool, PoolConfig};
///
/// let pool = MemoryPool::new(PoolConfig::default());
/// let block = pool.acquire(100).unwrap();
/// assert_eq!(block.len(), 128);
/// let id = block.id();
/// pool.release(block).unwrap();
///
/// // The next request in the same size class reuses the block.
/// let again = pool.acquire(120).unwrap();
/// assert_eq!(again.id(), id);
/// ```
pub struct MemoryPool {
    id: u64,
    config: PoolConfig,
    outstanding: Mutex<HashMap<BlockId, AllocationRecord>>,
    free_lists: Vec<Mutex<Vec<FreeBlock>>>,
    next_block: AtomicU64,
    outstanding_bytes: AtomicUsize,
    acquire_calls: AtomicU64,
    release_calls: AtomicU64,
    disposed: AtomicBool,
}

impl MemoryPool {
    /// Creates a new empty pool.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            outstanding: Mutex::new(HashMap::new()),
            free_lists: (0..SIZE_CLASSES).map(|_| Mutex::new(Vec::new())).collect(),
            next_block: AtomicU64::new(1),
            outstanding_bytes: AtomicUsize::new(0),
            acquire_calls: AtomicU64::new(0),
            release_calls: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Creates a new pool wrapped in an [`Arc`] for sharing between
    /// contexts and buffers.
    #[must_use]
    pub fn shared(config: PoolConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Returns the pool id carried by every block it hands out.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Acquires a block of at least `min_size` bytes.
    ///
    /// The block's length is the smallest power of two `>= min_size`. A
    /// free block of that size class is reused when one is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is disposed, if `min_size` has no size
    /// class, or if the chosen id is already outstanding.
    pub fn acquire(&self, min_size: usize) -> PoolResult<PooledBlock> {
        self.acquire_inner(min_size, None)
    }

    /// Acquires a block and tags its record with `owner`.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryPool::acquire`].
    pub fn acquire_tagged(&self, min_size: usize, owner: &Arc<str>) -> PoolResult<PooledBlock> {
        self.acquire_inner(min_size, Some(Arc::clone(owner)))
    }

    fn acquire_inner(&self, min_size: usize, owner: Option<Arc<str>>) -> PoolResult<PooledBlock> {
        if self.is_disposed() {
            return Err(PoolError::Disposed);
        }
        self.acquire_calls.fetch_add(1, Ordering::Relaxed);

        let size = size_class_for(min_size).ok_or(PoolError::AllocationTooLarge {
            requested: min_size,
        })?;
        let class = size.trailing_zeros() as usize;

        let reused = self.free_lists[class].lock().pop();
        let (id, data) = match reused {
            Some(free) => {
                trace!(pool = self.id, block = %free.id, size, "pool hit");
                (free.id, free.data)
            }
            None => {
                let id = BlockId(self.next_block.fetch_add(1, Ordering::Relaxed));
                trace!(pool = self.id, block = %id, size, "pool miss");
                (id, vec![0u8; size].into_boxed_slice())
            }
        };

        match self.outstanding.lock().entry(id) {
            Entry::Occupied(_) => return Err(PoolError::DuplicateRegistration { block: id }),
            Entry::Vacant(slot) => {
                slot.insert(AllocationRecord {
                    block: id,
                    size,
                    owner,
                });
            }
        }

        let total = self.outstanding_bytes.fetch_add(size, Ordering::AcqRel) + size;
        if total > self.config.max_outstanding_bytes {
            let freed = self.on_low_memory();
            warn!(
                pool = self.id,
                outstanding = total,
                ceiling = self.config.max_outstanding_bytes,
                freed,
                "outstanding memory above ceiling, drained free lists"
            );
        }

        Ok(PooledBlock {
            id,
            pool: self.id,
            data,
        })
    }

    /// Returns a block to the pool.
    ///
    /// The block moves from the outstanding map to the free list of its
    /// size class. Memory is not handed back to the allocator here.
    /// Releasing into a disposed pool simply frees the block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block came from another pool or is not
    /// currently outstanding.
    pub fn release(&self, block: PooledBlock) -> PoolResult<()> {
        self.release_calls.fetch_add(1, Ordering::Relaxed);

        if block.pool != self.id {
            return Err(PoolError::ForeignBlock {
                block: block.id,
                pool: block.pool,
            });
        }
        if self.is_disposed() {
            return Ok(());
        }

        let record = self
            .outstanding
            .lock()
            .remove(&block.id)
            .ok_or(PoolError::NotOutstanding { block: block.id })?;
        self.outstanding_bytes.fetch_sub(record.size, Ordering::AcqRel);

        let class = record.size.trailing_zeros() as usize;
        self.free_lists[class].lock().push(FreeBlock {
            id: block.id,
            data: block.data,
        });
        Ok(())
    }

    /// Drains every free list, handing the memory back to the allocator.
    ///
    /// Returns the number of bytes freed.
    pub fn on_low_memory(&self) -> usize {
        let mut freed = 0;
        for list in &self.free_lists {
            let drained = std::mem::take(&mut *list.lock());
            freed += drained.iter().map(|free| free.data.len()).sum::<usize>();
        }
        freed
    }

    /// Frees all pooled memory and forgets all outstanding records.
    ///
    /// Idempotent. Blocks still held by callers keep their memory until
    /// they are dropped or released.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let freed = self.on_low_memory();
        let leaked = {
            let mut outstanding = self.outstanding.lock();
            let leaked = outstanding.len();
            outstanding.clear();
            leaked
        };
        self.outstanding_bytes.store(0, Ordering::Release);

        if leaked > 0 {
            warn!(pool = self.id, leaked, "memory pool disposed with outstanding allocations");
        }
        debug!(pool = self.id, freed, "memory pool disposed");
    }

    /// Returns true once [`MemoryPool::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns the records of all outstanding allocations.
    #[must_use]
    pub fn outstanding_records(&self) -> Vec<AllocationRecord> {
        self.outstanding.lock().values().cloned().collect()
    }

    /// Returns true if `block` is currently outstanding.
    #[must_use]
    pub fn is_outstanding(&self, block: BlockId) -> bool {
        self.outstanding.lock().contains_key(&block)
    }

    /// Returns a snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let outstanding_blocks = self.outstanding.lock().len();
        let (mut free_blocks, mut free_bytes) = (0, 0);
        for list in &self.free_lists {
            let list = list.lock();
            free_blocks += list.len();
            free_bytes += list.iter().map(|free| free.data.len()).sum::<usize>();
        }
        PoolStats {
            outstanding_blocks,
            outstanding_bytes: self.outstanding_bytes.load(Ordering::Acquire),
            free_blocks,
            free_bytes,
            acquire_calls: self.acquire_calls.load(Ordering::Relaxed),
            release_calls: self.release_calls.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPool")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        self.dispose();
    }
}
