//! Fixed-block chunk allocator
//!
//! One [`ChunkAllocator`] per block size, typically one per stored type.

mod allocator;
mod arena;
mod config;
mod stats;

pub use allocator::ChunkAllocator;
pub use arena::MAX_BLOCKS_PER_CHUNK;
pub use config::ChunkConfig;
pub use stats::ChunkStats;
