//! Append-only segmented write buffer.

use crate::error::{PoolError, PoolResult};
use crate::pool::{MemoryPool, PooledBlock};
use std::fmt;
use std::sync::Arc;
use tracing::{error, trace};

/// A segment that has been filled and left behind.
enum Segment {
    /// A real pool block, completely filled.
    Allocated(PooledBlock),
    /// A size class jumped over by a single large write. Holds no bytes.
    Skipped {
        /// The size the doubling sequence reached at this point.
        size: usize,
    },
}

impl Segment {
    fn size(&self) -> usize {
        match self {
            Segment::Allocated(block) => block.len(),
            Segment::Skipped { size } => *size,
        }
    }
}

/// An append-only byte sequence built from pool blocks of doubling size.
///
/// Bytes are written into the current block until it is full. The next
/// block is twice the size of the current one; when a single write needs
/// more than that, the sizes in between are recorded as skipped segments so
/// the sequence of segment sizes stays a pure doubling progression.
///
/// Writing into a disposed buffer is a programmer error and panics.
///
/// # Example
///
/// ```rust
/// use blittable_memory::{GrowableBuffer, MemoryPool, PoolConfig};
///
/// let pool = MemoryPool::shared(PoolConfig::default());
/// let mut buffer = GrowableBuffer::new(pool, 4, None).unwrap();
/// buffer.write(b"hello, ").unwrap();
/// buffer.write(b"segments").unwrap();
///
/// let mut out = vec![0u8; buffer.logical_size()];
/// assert_eq!(buffer.copy_into(&mut out), 15);
/// assert_eq!(&out, b"hello, segments");
/// ```
pub struct GrowableBuffer {
    pool: Arc<MemoryPool>,
    owner: Option<Arc<str>>,
    segments: Vec<Segment>,
    current: Option<PooledBlock>,
    position_in_current: usize,
    logical_size: usize,
}

impl GrowableBuffer {
    /// Creates a buffer whose first segment holds at least `initial_size`
    /// bytes. Every block acquired for this buffer is tagged with `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the first block cannot be acquired.
    pub fn new(
        pool: Arc<MemoryPool>,
        initial_size: usize,
        owner: Option<Arc<str>>,
    ) -> PoolResult<Self> {
        let first = acquire(&pool, initial_size, owner.as_ref())?;
        Ok(Self {
            pool,
            owner,
            segments: Vec::new(),
            current: Some(first),
            position_in_current: 0,
            logical_size: 0,
        })
    }

    /// Appends `bytes` to the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if a new segment cannot be acquired.
    ///
    /// # Panics
    ///
    /// Panics if the buffer has been disposed.
    pub fn write(&mut self, mut bytes: &[u8]) -> PoolResult<()> {
        while !bytes.is_empty() {
            let start = self.position_in_current;
            let current = self.current_block();
            let available = current.len() - start;
            if available == 0 {
                self.grow(bytes.len())?;
                continue;
            }

            let n = available.min(bytes.len());
            current[start..start + n].copy_from_slice(&bytes[..n]);
            self.position_in_current += n;
            self.logical_size += n;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    /// Appends a single byte.
    ///
    /// # Errors
    ///
    /// Returns an error if a new segment cannot be acquired.
    ///
    /// # Panics
    ///
    /// Panics if the buffer has been disposed.
    pub fn write_byte(&mut self, byte: u8) -> PoolResult<()> {
        if self.current_block().len() == self.position_in_current {
            self.grow(1)?;
        }
        let position = self.position_in_current;
        self.current_block()[position] = byte;
        self.position_in_current += 1;
        self.logical_size += 1;
        Ok(())
    }

    fn current_block(&mut self) -> &mut PooledBlock {
        match self.current.as_mut() {
            Some(block) => block,
            None => panic!("write into a disposed GrowableBuffer"),
        }
    }

    /// Moves to a new segment large enough for `remaining` bytes.
    fn grow(&mut self, remaining: usize) -> PoolResult<()> {
        let too_large = PoolError::AllocationTooLarge {
            requested: remaining,
        };
        let current_size = self.current_block().len();

        let mut skipped = Vec::new();
        let mut next = current_size.checked_mul(2).ok_or(too_large.clone())?;
        while next < remaining {
            skipped.push(next);
            next = next.checked_mul(2).ok_or(too_large.clone())?;
        }

        let block = acquire(&self.pool, next, self.owner.as_ref())?;
        trace!(
            size = next,
            skipped = skipped.len(),
            logical_size = self.logical_size,
            "buffer segment added"
        );

        if let Some(previous) = self.current.replace(block) {
            self.segments.push(Segment::Allocated(previous));
        }
        self.segments
            .extend(skipped.into_iter().map(|size| Segment::Skipped { size }));
        self.position_in_current = 0;
        Ok(())
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn logical_size(&self) -> usize {
        self.logical_size
    }

    /// Returns the number of segments, skipped ones and the current one
    /// included.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len() + usize::from(self.current.is_some())
    }

    /// Returns the sizes of all segments in order, skipped ones included.
    #[must_use]
    pub fn segment_sizes(&self) -> Vec<usize> {
        self.segments
            .iter()
            .map(Segment::size)
            .chain(self.current.as_ref().map(PooledBlock::len))
            .collect()
    }

    /// Returns true once the buffer has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.current.is_none()
    }

    /// Copies the written bytes, in order, to the start of `dest`.
    ///
    /// Returns the number of bytes copied, always [`logical_size`].
    ///
    /// # Panics
    ///
    /// Panics if `dest` is shorter than [`logical_size`].
    ///
    /// [`logical_size`]: GrowableBuffer::logical_size
    pub fn copy_into(&self, dest: &mut [u8]) -> usize {
        assert!(
            dest.len() >= self.logical_size,
            "destination holds {} bytes, buffer has {}",
            dest.len(),
            self.logical_size
        );

        let mut offset = 0;
        for segment in &self.segments {
            if let Segment::Allocated(block) = segment {
                dest[offset..offset + block.len()].copy_from_slice(block);
                offset += block.len();
            }
        }
        if let Some(current) = &self.current {
            let filled = self.position_in_current;
            dest[offset..offset + filled].copy_from_slice(&current[..filled]);
            offset += filled;
        }
        debug_assert_eq!(offset, self.logical_size);
        offset
    }

    /// Returns the written bytes as a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.logical_size];
        self.copy_into(&mut out);
        out
    }

    /// Releases every segment back to the pool. Idempotent.
    pub fn dispose(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };
        let blocks = self
            .segments
            .drain(..)
            .filter_map(|segment| match segment {
                Segment::Allocated(block) => Some(block),
                Segment::Skipped { .. } => None,
            })
            .chain(std::iter::once(current));
        for block in blocks {
            let id = block.id();
            if let Err(e) = self.pool.release(block) {
                error!(block = %id, error = %e, "failed to release buffer segment");
            }
        }
        self.position_in_current = 0;
    }
}

fn acquire(pool: &MemoryPool, size: usize, owner: Option<&Arc<str>>) -> PoolResult<PooledBlock> {
    match owner {
        Some(owner) => pool.acquire_tagged(size, owner),
        None => pool.acquire(size),
    }
}

impl fmt::Debug for GrowableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("owner", &self.owner)
            .field("segments", &self.segment_sizes())
            .field("logical_size", &self.logical_size)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for GrowableBuffer {
    fn drop(&mut self) {
        self.dispose();
    }
}
