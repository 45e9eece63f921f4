//! Error types for nebula-alloc
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.

use core::alloc::Layout;
use thiserror::Error;

// ============================================================================
// Main Error Types
// ============================================================================

/// Allocation engine errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Invalid memory layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("Size overflow during operation: {operation}")]
    SizeOverflow { operation: String },

    #[error("Invalid alignment: {alignment}")]
    InvalidAlignment { alignment: usize },

    #[error("Allocation exceeds maximum size: {size} bytes (max: {max_size})")]
    ExceedsMaxSize { size: usize, max_size: usize },

    // --- Pool Errors ---
    #[error("Pool exhausted: cannot serve {requested} bytes (heap: {heap_size} bytes, nothing to scavenge)")]
    PoolExhausted { requested: usize, heap_size: usize },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // --- System Errors ---
    #[error("Memory corruption detected in {component}: {details}")]
    Corruption { component: String, details: String },
}

impl MemoryError {
    /// Check if error is retryable
    ///
    /// Exhaustion is terminal for a pool: once growth and scavenging have
    /// both failed, retrying the same request cannot succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::InvalidLayout { .. } => "MEM:ALLOC:LAYOUT",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::InvalidAlignment { .. } => "MEM:ALLOC:ALIGN",
            Self::ExceedsMaxSize { .. } => "MEM:ALLOC:MAX",
            Self::PoolExhausted { .. } => "MEM:POOL:EXHAUSTED",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::Corruption { .. } => "MEM:SYSTEM:CORRUPTION",
        }
    }

    // ============================================================================
    // Convenience Constructors - Allocation Errors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        tracing::error!(size, align, "memory allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create allocation failed error from layout
    pub fn allocation_failed_with_layout(layout: Layout) -> Self {
        Self::allocation_failed(layout.size(), layout.align())
    }

    /// Create invalid layout error
    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout {
            reason: reason.into(),
        }
    }

    /// Create size overflow error
    pub fn size_overflow(operation: impl Into<String>) -> Self {
        Self::SizeOverflow {
            operation: operation.into(),
        }
    }

    /// Create invalid alignment error
    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::InvalidAlignment { alignment }
    }

    /// Create exceeds max size error
    pub fn exceeds_max_size(size: usize, max_size: usize) -> Self {
        Self::ExceedsMaxSize { size, max_size }
    }

    // ============================================================================
    // Convenience Constructors - Pool Errors
    // ============================================================================

    /// Create pool exhausted error
    pub fn pool_exhausted(requested: usize, heap_size: usize) -> Self {
        #[cfg(feature = "logging")]
        tracing::error!(requested, heap_size, "pool exhausted, no class left to scavenge");

        Self::PoolExhausted {
            requested,
            heap_size,
        }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        let reason = reason.into();

        #[cfg(feature = "logging")]
        tracing::warn!(%reason, "invalid allocator configuration");

        Self::InvalidConfig { reason }
    }

    /// Create corruption error
    pub fn corruption(component: impl Into<String>, details: impl Into<String>) -> Self {
        let component = component.into();
        let details = details.into();

        #[cfg(feature = "logging")]
        tracing::error!(%component, %details, "allocator bookkeeping corrupted");

        Self::Corruption { component, details }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for memory operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

/// Convenience alias
pub type Result<T> = MemoryResult<T>;

// ============================================================================
// Compatibility Aliases
// ============================================================================

/// Allocation error (alias for `MemoryError`)
pub type AllocError = MemoryError;

/// Allocation result (alias for `MemoryResult`)
pub type AllocResult<T> = MemoryResult<T>;
