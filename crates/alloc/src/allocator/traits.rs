//! Allocator traits
//!
//! Two seams meet here:
//! - [`Allocator`]: the backing layer the engines obtain slabs and chunk
//!   buffers from (shared-reference, layout-based, like `std::alloc`)
//! - [`RawStorage`]: what the engines themselves provide to the typed
//!   adapter (exclusive-reference, size-based)
//!
//! # Safety
//!
//! All unsafe traits in this module impose strict contracts on implementors:
//! - **Allocator**: Returned pointers must be valid, aligned, and exclusive
//! - **ThreadSafeAllocator**: Operations must be safe across threads
//! - **RawStorage**: Returned blocks hold at least the requested bytes and are
//!   aligned to `max_align()`

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::{AllocError, AllocResult};

/// Backing allocator interface
///
/// # Safety Requirements
///
/// Implementors must ensure that:
/// - Returned pointers are valid for reads and writes of `layout.size()` bytes
/// - Memory is properly aligned according to the layout
/// - Two live allocations never overlap
pub unsafe trait Allocator {
    /// Allocates memory with the given layout
    ///
    /// # Safety
    /// Memory content is uninitialized and must be initialized before use.
    ///
    /// # Errors
    /// Returns [`AllocError::AllocationFailed`] if memory cannot be provided.
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Deallocates memory at the given pointer with the specified layout
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator
    /// - `layout` must match the original allocation layout exactly
    /// - After this call, `ptr` becomes invalid and must not be used
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Moves an allocation to a new layout, preserving the common prefix
    ///
    /// # Safety
    /// Same requirements as [`Allocator::deallocate`] for `ptr` and
    /// `old_layout`. On success the old pointer becomes invalid.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if old_layout == new_layout {
            return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
        }

        // SAFETY: new_layout is a valid Layout; caller upholds allocate's contract.
        let new_ptr = unsafe { self.allocate(new_layout)? };

        let copy_size = core::cmp::min(old_layout.size(), new_layout.size());
        if copy_size > 0 {
            // SAFETY: Copying the overlapping prefix into the fresh block.
            // - ptr is valid for old_layout.size() bytes (caller contract)
            // - new_ptr is valid for new_layout.size() bytes (allocate contract)
            // - The blocks are distinct live allocations, so they do not overlap
            unsafe {
                core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.cast::<u8>().as_ptr(), copy_size);
            }
        }

        // SAFETY: ptr/old_layout describe a live allocation from self (caller contract).
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_ptr)
    }
}

// SAFETY: Forwards every call to the referenced allocator unchanged.
unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        unsafe { (**self).allocate(layout) }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        unsafe { (**self).reallocate(ptr, old_layout, new_layout) }
    }
}

/// Marker trait for allocators that can be shared between threads
///
/// # Safety
/// Implementors must guarantee that concurrent `allocate`/`deallocate`
/// calls through `&self` never hand out the same memory twice.
pub unsafe trait ThreadSafeAllocator: Allocator + Sync + Send {}

/// Raw block storage provided by an allocation engine
///
/// Both engines implement this so a typed adapter can treat them as
/// interchangeable. Unlike [`Allocator`], operations take `&mut self`: the
/// engines keep their free structures without interior synchronization.
///
/// # Safety
/// A successful `allocate_raw(size)` must return a block that is valid for
/// `size` bytes, aligned to `max_align()`, and disjoint from every other live
/// block of the same engine.
pub unsafe trait RawStorage {
    /// Returns storage for at least `size` bytes
    fn allocate_raw(&mut self, size: usize) -> AllocResult<NonNull<u8>>;

    /// Returns a block to the engine
    ///
    /// # Safety
    /// `ptr` must come from `allocate_raw` on this engine with the same
    /// `size`, and must not be used afterwards.
    unsafe fn deallocate_raw(&mut self, ptr: NonNull<u8>, size: usize);

    /// Alignment every returned block is guaranteed to have
    fn max_align(&self) -> usize;

    /// Largest request the engine can serve, `None` if unbounded
    fn max_size(&self) -> Option<usize> {
        None
    }

    /// Checks that `layout` can be served by this engine
    fn check_layout(&self, layout: Layout) -> AllocResult<()> {
        if layout.align() > self.max_align() {
            return Err(AllocError::invalid_alignment(layout.align()));
        }
        match self.max_size() {
            Some(max) if layout.size() > max => {
                Err(AllocError::exceeds_max_size(layout.size(), max))
            }
            _ => Ok(()),
        }
    }
}

impl<S: RawStorage + ?Sized> RawStorageExt for S {}

/// Layout-based convenience over [`RawStorage`]
pub trait RawStorageExt: RawStorage {
    /// Allocates storage for `layout` after checking the engine can honour it
    fn allocate_layout(&mut self, layout: Layout) -> AllocResult<NonNull<u8>> {
        self.check_layout(layout)?;
        self.allocate_raw(layout.size())
    }

    /// Returns storage obtained through [`RawStorageExt::allocate_layout`]
    ///
    /// # Safety
    /// Same as [`RawStorage::deallocate_raw`] with `layout.size()`.
    unsafe fn deallocate_layout(&mut self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { self.deallocate_raw(ptr, layout.size()) }
    }
}

/// Memory usage reporting
pub trait MemoryUsage {
    /// Get currently used memory in bytes
    fn used_memory(&self) -> usize;

    /// Get available memory in bytes (if known)
    fn available_memory(&self) -> Option<usize>;

    /// Get total memory capacity in bytes (if known)
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Returns memory usage as a percentage (0.0 to 100.0)
    ///
    /// Returns `None` if total memory is unknown.
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }
}
