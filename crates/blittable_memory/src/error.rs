//! Error types for pool and buffer operations.

use crate::pool::BlockId;
use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur while acquiring or releasing pooled memory.
///
/// Apart from [`PoolError::AllocationTooLarge`], every variant is a
/// contract violation by the caller or a bookkeeping bug, never a
/// transient condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The released block is not currently outstanding in this pool.
    #[error("double free or foreign pointer: block {block} is not outstanding")]
    NotOutstanding {
        /// The block that was released.
        block: BlockId,
    },

    /// The released block was handed out by a different pool.
    #[error("block {block} belongs to pool {pool}, not to this pool")]
    ForeignBlock {
        /// The block that was released.
        block: BlockId,
        /// The pool that owns the block.
        pool: u64,
    },

    /// A block id was registered as outstanding twice.
    #[error("block {block} is already registered as outstanding")]
    DuplicateRegistration {
        /// The block that was registered twice.
        block: BlockId,
    },

    /// The requested size has no power-of-two size class.
    #[error("allocation of {requested} bytes exceeds the largest size class")]
    AllocationTooLarge {
        /// The requested minimum size.
        requested: usize,
    },

    /// The pool was disposed and hands out no more memory.
    #[error("memory pool is disposed")]
    Disposed,
}
