//! Pool allocator configuration

use crate::error::{MemoryError, MemoryResult};

/// Blocks carved per refill
pub const DEFAULT_REFILL_BATCH: usize = 10;

/// New slab size as a multiple of one batch's bytes
pub const DEFAULT_GROWTH_FACTOR: usize = 4;

/// Configuration for the segregated pool allocator
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Blocks carved from the slab when a class runs dry
    pub refill_batch: usize,

    /// A fresh slab holds `refill_batch * class_size * growth_factor` bytes
    pub growth_factor: usize,

    /// Enable operation counters
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for deallocated memory (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refill_batch: DEFAULT_REFILL_BATCH,
            growth_factor: DEFAULT_GROWTH_FACTOR,
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

impl PoolConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            refill_batch: DEFAULT_REFILL_BATCH,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            refill_batch: DEFAULT_REFILL_BATCH,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - bigger batches, fewer slab requests
    #[must_use]
    pub fn performance() -> Self {
        Self {
            refill_batch: 64,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    #[must_use]
    pub fn with_refill_batch(mut self, refill_batch: usize) -> Self {
        self.refill_batch = refill_batch;
        self
    }

    #[must_use]
    pub fn with_growth_factor(mut self, growth_factor: usize) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    #[must_use]
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    /// Checks the configuration can drive a pool
    pub fn validate(&self) -> MemoryResult<()> {
        if self.refill_batch == 0 {
            return Err(MemoryError::invalid_config("refill_batch must be at least 1"));
        }
        if self.growth_factor == 0 {
            return Err(MemoryError::invalid_config("growth_factor must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(PoolConfig::default().validate().is_ok());
        assert!(PoolConfig::production().validate().is_ok());
        assert!(PoolConfig::debug().validate().is_ok());
        assert!(PoolConfig::performance().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_batch() {
        let err = PoolConfig::default()
            .with_refill_batch(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "MEM:CONFIG:INVALID");
        assert!(PoolConfig::default().with_growth_factor(0).validate().is_err());
    }
}
