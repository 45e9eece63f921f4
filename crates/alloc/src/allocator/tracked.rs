//! Tracked allocator implementation
//!
//! Wraps another backing allocator and counts what passes through it. An
//! optional byte budget makes it refuse requests once the live total would
//! exceed the limit, which is how a pool's growth-failure path is exercised.
//!
//! # Safety
//!
//! - All unsafe operations are forwarded to the inner allocator unchanged
//! - Counters are atomics, so sharing follows the inner allocator's bounds
//!
//! ## Invariants
//!
//! - Every successful allocation adds its size to `allocated_bytes`
//! - Every deallocation subtracts its size again
//! - Failed allocations only bump the failure counter

use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::{AllocError, AllocResult, Allocator, MemoryUsage, ThreadSafeAllocator};

/// A wrapper allocator that tracks memory usage statistics
#[derive(Debug)]
pub struct TrackedAllocator<A> {
    /// The underlying allocator
    inner: A,
    /// Live byte budget, `None` for unlimited
    limit: Option<usize>,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    failures: AtomicUsize,
    current_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl<A> TrackedAllocator<A> {
    /// Creates a new TrackedAllocator wrapping the provided allocator
    pub fn new(allocator: A) -> Self {
        Self {
            inner: allocator,
            limit: None,
            allocations: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            current_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
        }
    }

    /// Creates a tracker that refuses to hold more than `limit` live bytes
    pub fn with_limit(allocator: A, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(allocator)
        }
    }

    /// Gets a reference to the underlying allocator
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Consumes the tracker and returns the underlying allocator
    pub fn into_inner(self) -> A {
        self.inner
    }

    /// Live byte budget, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the total bytes currently allocated
    pub fn allocated_bytes(&self) -> usize {
        self.current_bytes.load(Ordering::Acquire)
    }

    /// Returns the peak bytes allocated
    pub fn peak_allocated_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Returns the total number of successful allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Returns the total number of deallocations performed
    pub fn deallocation_count(&self) -> usize {
        self.deallocations.load(Ordering::Relaxed)
    }

    /// Returns the number of failed allocations
    pub fn failed_allocations(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Check if there are any live allocations left
    pub fn has_leaks(&self) -> bool {
        self.allocation_count() > self.deallocation_count()
    }

    /// Get the number of live allocations
    pub fn potential_leaks(&self) -> usize {
        self.allocation_count()
            .saturating_sub(self.deallocation_count())
    }

    /// Reserves `size` bytes against the budget
    fn reserve(&self, size: usize, limit: usize) -> bool {
        self.current_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(size).filter(|next| *next <= limit)
            })
            .is_ok()
    }
}

// SAFETY: TrackedAllocator implements Allocator by forwarding to inner allocator.
// - Budget checks only ever refuse requests, they never alter pointers
// - deallocate forwards the caller's pointer and layout unchanged
unsafe impl<A: Allocator> Allocator for TrackedAllocator<A> {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let size = layout.size();

        let reserved = match self.limit {
            Some(limit) => {
                if !self.reserve(size, limit) {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(AllocError::allocation_failed_with_layout(layout));
                }
                true
            }
            None => false,
        };

        // SAFETY: Forwarding to inner allocator with the caller's layout.
        match unsafe { self.inner.allocate(layout) } {
            Ok(ptr) => {
                let current = if reserved {
                    self.current_bytes.load(Ordering::Acquire)
                } else {
                    self.current_bytes.fetch_add(size, Ordering::AcqRel) + size
                };
                self.allocations.fetch_add(1, Ordering::Relaxed);
                self.peak_bytes.fetch_max(current, Ordering::Relaxed);
                Ok(ptr)
            }
            Err(err) => {
                if reserved {
                    self.current_bytes.fetch_sub(size, Ordering::AcqRel);
                }
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding caller's pointer/layout (caller contract).
        unsafe { self.inner.deallocate(ptr, layout) };
        self.current_bytes.fetch_sub(layout.size(), Ordering::AcqRel);
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }
}

// SAFETY: Counters are atomics; thread safety comes from the inner allocator.
unsafe impl<A: ThreadSafeAllocator> ThreadSafeAllocator for TrackedAllocator<A> {}

impl<A> MemoryUsage for TrackedAllocator<A> {
    fn used_memory(&self) -> usize {
        self.allocated_bytes()
    }

    fn available_memory(&self) -> Option<usize> {
        self.limit
            .map(|limit| limit.saturating_sub(self.allocated_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;

    #[test]
    fn test_counts_allocations() {
        let tracked = TrackedAllocator::new(SystemAllocator);
        let layout = Layout::from_size_align(128, 8).unwrap();

        unsafe {
            let a = tracked.allocate(layout).unwrap();
            let b = tracked.allocate(layout).unwrap();
            assert_eq!(tracked.allocated_bytes(), 256);
            assert_eq!(tracked.allocation_count(), 2);

            tracked.deallocate(a.cast(), layout);
            assert_eq!(tracked.allocated_bytes(), 128);
            assert!(tracked.has_leaks());

            tracked.deallocate(b.cast(), layout);
        }

        assert_eq!(tracked.allocated_bytes(), 0);
        assert_eq!(tracked.peak_allocated_bytes(), 256);
        assert!(!tracked.has_leaks());
    }

    #[test]
    fn test_limit_refuses_and_recovers() {
        let tracked = TrackedAllocator::with_limit(SystemAllocator, 100);
        let layout = Layout::from_size_align(64, 8).unwrap();

        unsafe {
            let a = tracked.allocate(layout).unwrap();
            assert!(tracked.allocate(layout).is_err());
            assert_eq!(tracked.failed_allocations(), 1);
            assert_eq!(tracked.available_memory(), Some(36));

            tracked.deallocate(a.cast(), layout);
            let b = tracked.allocate(layout).unwrap();
            tracked.deallocate(b.cast(), layout);
        }

        assert_eq!(tracked.allocation_count(), 2);
        assert_eq!(tracked.potential_leaks(), 0);
    }
}
