//! Backing allocators and the traits the engines are built on
//!
//! - [`SystemAllocator`]: the default source of slabs and chunk buffers
//! - [`TrackedAllocator`]: counting wrapper with an optional byte budget
//! - [`LockedAllocator`]: mutex strategy for sharing an engine across threads

mod locked;
mod system;
mod tracked;
mod traits;

pub use locked::LockedAllocator;
pub use system::SystemAllocator;
pub use tracked::TrackedAllocator;
pub use traits::{Allocator, MemoryUsage, RawStorage, RawStorageExt, ThreadSafeAllocator};

pub use crate::error::{AllocError, AllocResult};
