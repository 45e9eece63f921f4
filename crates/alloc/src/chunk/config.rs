//! Chunk allocator configuration

use super::arena::MAX_BLOCKS_PER_CHUNK;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::is_power_of_two;

/// Configuration for a fixed-block chunk allocator
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Blocks per chunk, `1..=255`
    pub blocks_per_chunk: usize,

    /// Block alignment; `None` derives it from the block size
    pub block_align: Option<usize>,

    /// Enable operation counters
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for deallocated memory (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            blocks_per_chunk: MAX_BLOCKS_PER_CHUNK,
            block_align: None,
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl ChunkConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            blocks_per_chunk: MAX_BLOCKS_PER_CHUNK,
            block_align: None,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            blocks_per_chunk: MAX_BLOCKS_PER_CHUNK,
            block_align: None,
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, blocks_per_chunk: usize) -> Self {
        self.blocks_per_chunk = blocks_per_chunk;
        self
    }

    #[must_use]
    pub fn with_align(mut self, block_align: usize) -> Self {
        self.block_align = Some(block_align);
        self
    }

    #[must_use]
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    /// Checks the configuration can drive a chunk allocator
    pub fn validate(&self) -> MemoryResult<()> {
        if self.blocks_per_chunk == 0 || self.blocks_per_chunk > MAX_BLOCKS_PER_CHUNK {
            return Err(MemoryError::invalid_config(format!(
                "blocks_per_chunk must be in 1..={MAX_BLOCKS_PER_CHUNK}, got {}",
                self.blocks_per_chunk
            )));
        }
        if let Some(align) = self.block_align
            && !is_power_of_two(align)
        {
            return Err(MemoryError::invalid_config(format!(
                "block_align must be a power of two, got {align}"
            )));
        }
        Ok(())
    }
}
