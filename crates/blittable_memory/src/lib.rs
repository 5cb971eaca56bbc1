//! # Blittable Memory
//!
//! Pooled memory for building blittable documents.
//!
//! This crate provides the two lowest layers of the document stack:
//!
//! - [`MemoryPool`] - a power-of-two size-bucketed pool with per-class free
//!   lists, outstanding-allocation tracking and a pressure hook
//! - [`GrowableBuffer`] - an append-only byte sequence made of pool blocks of
//!   doubling size, linearized into one destination on demand
//!
//! ## Design Principles
//!
//! - Blocks are owned values; handing one back to the pool moves it
//! - Block ids stand in for addresses and are unique among outstanding blocks
//! - The outstanding map and each free list lock independently
//! - Pools are passed explicitly, there is no global instance
//!
//! ## Example
//!
//! ```rust
//! use blittable_memory::{MemoryPool, PoolConfig};
//!
//! let pool = MemoryPool::new(PoolConfig::default());
//! let block = pool.acquire(1000).unwrap();
//! assert_eq!(block.len(), 1024);
//! pool.release(block).unwrap();
//! assert_eq!(pool.stats().free_blocks, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod config;
mod error;
mod pool;

pub use buffer::GrowableBuffer;
pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use pool::{size_class_for, AllocationRecord, BlockId, MemoryPool, PoolStats, PooledBlock};
