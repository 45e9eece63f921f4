//! System allocator implementation
//!
//! The default backing allocator for both engines: every slab, chunk buffer
//! and above-ceiling request ends up here unless another [`Allocator`] is
//! supplied.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use std::alloc::System;

use super::{AllocError, AllocResult, Allocator, ThreadSafeAllocator};

/// Wrapper for the system's default allocator
///
/// # Thread Safety
/// The system allocator is inherently thread-safe as it uses the platform's
/// default memory management which handles concurrent allocations properly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Creates a new SystemAllocator
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

// SAFETY: Delegates to std::alloc::System, which upholds the GlobalAlloc
// contract; null results are turned into errors, never returned.
unsafe impl Allocator for SystemAllocator {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            let ptr = NonNull::<u8>::dangling();
            return Ok(NonNull::slice_from_raw_parts(ptr, 0));
        }

        // SAFETY: layout has non-zero size (checked above).
        let ptr = unsafe { System.alloc(layout) };

        NonNull::new(ptr)
            .map(|p| NonNull::slice_from_raw_parts(p, layout.size()))
            .ok_or_else(|| AllocError::allocation_failed_with_layout(layout))
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        // SAFETY: ptr was returned by System.alloc with this layout (caller contract).
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if old_layout.align() == new_layout.align()
            && old_layout.size() > 0
            && new_layout.size() > 0
        {
            // SAFETY: Same alignment, both sizes non-zero, ptr/old_layout live (caller contract).
            let new_ptr = unsafe { System.realloc(ptr.as_ptr(), old_layout, new_layout.size()) };
            return NonNull::new(new_ptr)
                .map(|p| NonNull::slice_from_raw_parts(p, new_layout.size()))
                .ok_or_else(|| AllocError::allocation_failed_with_layout(new_layout));
        }

        let new_ptr = unsafe { self.allocate(new_layout)? };
        let copy_size = core::cmp::min(old_layout.size(), new_layout.size());
        if copy_size > 0 {
            // SAFETY: Distinct live allocations, both valid for copy_size bytes.
            unsafe {
                core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.cast::<u8>().as_ptr(), copy_size);
            }
        }
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_ptr)
    }
}

// SAFETY: System is a process-wide thread-safe allocator.
unsafe impl ThreadSafeAllocator for SystemAllocator {}
