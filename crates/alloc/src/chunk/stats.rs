//! Chunk allocator statistics

/// Snapshot of a [`ChunkAllocator`](super::ChunkAllocator)
///
/// Structural fields are always exact. Operation counters stay at zero
/// unless `ChunkConfig::track_stats` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStats {
    /// Size of each block
    pub block_size: usize,
    /// Blocks per chunk
    pub blocks_per_chunk: usize,
    /// Chunks currently held
    pub chunk_count: usize,
    /// Blocks handed out and not yet returned
    pub live_blocks: usize,
    /// Free blocks across all chunks
    pub free_blocks: usize,
    /// Allocations served
    pub total_allocs: u64,
    /// Deallocations accepted
    pub total_deallocs: u64,
    /// Chunks obtained from the backing allocator
    pub chunks_created: u64,
    /// Chunks released by compaction
    pub chunks_released: u64,
    /// Empty chunks swapped to the tail
    pub relocations: u64,
}

impl ChunkStats {
    /// Bytes reserved in chunk buffers
    pub fn reserved_bytes(&self) -> usize {
        self.chunk_count * self.blocks_per_chunk * self.block_size
    }
}
