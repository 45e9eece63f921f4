//! Pool allocator statistics

use super::size_class::NUM_CLASSES;

/// Snapshot of a [`PoolAllocator`](super::PoolAllocator)
///
/// Structural fields are always exact. Operation counters stay at zero
/// unless `PoolConfig::track_stats` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Free blocks per size class
    pub free_blocks: [usize; NUM_CLASSES],
    /// Bytes obtained from the backing allocator for slabs
    pub heap_size: usize,
    /// Bytes left uncarved in the current slab
    pub slab_remaining: usize,
    /// Number of slabs obtained so far
    pub slab_count: usize,
    /// Pooled allocations served
    pub total_allocs: u64,
    /// Pooled deallocations accepted
    pub total_deallocs: u64,
    /// Requests forwarded to the backing allocator
    pub large_allocs: u64,
    /// Refills performed
    pub refills: u64,
    /// Blocks borrowed from a larger class as an emergency slab
    pub scavenges: u64,
}

impl PoolStats {
    /// Free blocks across all classes
    pub fn total_free_blocks(&self) -> usize {
        self.free_blocks.iter().sum()
    }

    /// Bytes sitting on free lists
    pub fn free_bytes(&self) -> usize {
        self.free_blocks
            .iter()
            .enumerate()
            .map(|(index, count)| count * (index + 1) * super::size_class::ALIGN)
            .sum()
    }
}
