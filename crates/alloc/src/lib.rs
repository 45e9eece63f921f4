//! # nebula-alloc
//!
//! Allocation engines for high-frequency churn of small, uniformly sized
//! objects.
//!
//! - [`PoolAllocator`](pool::PoolAllocator): sixteen size classes (8 to 128
//!   bytes) with intrusive free lists, refilled in batches from a growing
//!   heap slab. Anything larger goes to the backing allocator.
//! - [`ChunkAllocator`](chunk::ChunkAllocator): one fixed block size, blocks
//!   grouped in chunks of up to 255 whose free lists are one-byte indices
//!   stored in the free blocks. Empty chunks are compacted away.
//!
//! Both engines are single-threaded (`&mut self`) and implement
//! [`RawStorage`](allocator::RawStorage), so the typed layer in [`typed`]
//! and the mutex wrapper [`LockedAllocator`](allocator::LockedAllocator)
//! work with either.
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_alloc::prelude::*;
//!
//! let mut pool = PoolAllocator::new();
//! let block = pool.allocate(24)?;
//! unsafe { pool.deallocate(block, 24) };
//!
//! let mut nodes = ChunkAllocator::for_type::<[u64; 3]>()?;
//! let node = nodes.alloc_init([1u64, 2, 3])?;
//! unsafe { nodes.drop_typed(node) };
//! # Ok::<(), nebula_alloc::MemoryError>(())
//! ```
//!
//! ## Features
//!
//! - `logging` (default): `tracing` events for slab growth, scavenging,
//!   chunk churn, foreign frees and leaks at drop

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]
#![warn(rust_2018_idioms)]
// Pointer alignment casts onto free-list nodes are checked by construction
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::inline_always)]

pub mod allocator;
pub mod chunk;
pub mod error;
pub mod pool;
pub mod typed;
pub mod utils;

pub use error::{AllocError, AllocResult, MemoryError, MemoryResult};

/// Common imports
pub mod prelude {
    pub use crate::allocator::{
        Allocator, LockedAllocator, MemoryUsage, RawStorage, SystemAllocator, TrackedAllocator,
    };
    pub use crate::chunk::{ChunkAllocator, ChunkConfig, ChunkStats};
    pub use crate::error::{AllocError, AllocResult, MemoryError, MemoryResult};
    pub use crate::pool::{PoolAllocator, PoolConfig, PoolStats, SizeClass};
    pub use crate::typed::TypedAllocator;
}
