//! Segregated size-class pool
//!
//! One [`PoolAllocator`] serves every request up to [`MAX_BYTES`] from
//! sixteen size classes and forwards bigger ones to its backing allocator.

mod allocator;
mod config;
mod size_class;
mod stats;

pub use allocator::PoolAllocator;
pub use config::{DEFAULT_GROWTH_FACTOR, DEFAULT_REFILL_BATCH, PoolConfig};
pub use size_class::{ALIGN, MAX_BYTES, NUM_CLASSES, SizeClass, round_up};
pub use stats::PoolStats;
