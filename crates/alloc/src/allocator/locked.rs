//! Mutex-guarded engine
//!
//! The engines are single-threaded components. [`LockedAllocator`] is the
//! external-lock strategy for sharing one: every operation takes a
//! `parking_lot::Mutex` around the engine, which turns any [`RawStorage`]
//! into a [`ThreadSafeAllocator`].

use core::alloc::Layout;
use core::ptr::NonNull;

use parking_lot::{Mutex, MutexGuard};

use super::{AllocResult, Allocator, RawStorage, RawStorageExt, ThreadSafeAllocator};

/// An engine shared behind a mutex
#[derive(Debug)]
pub struct LockedAllocator<S> {
    inner: Mutex<S>,
}

impl<S: RawStorage> LockedAllocator<S> {
    /// Wraps an engine
    pub fn new(engine: S) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }

    /// Locks the engine for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock()
    }

    /// Runs `f` with exclusive access to the engine
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// Consumes the wrapper and returns the engine
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

// SAFETY: All engine access is serialized by the mutex; the engine's own
// RawStorage contract gives aligned, disjoint blocks of at least layout.size().
unsafe impl<S: RawStorage> Allocator for LockedAllocator<S> {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let ptr = self.inner.lock().allocate_layout(layout)?;
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: ptr/layout came from allocate above (caller contract).
        unsafe { self.inner.lock().deallocate_layout(ptr, layout) };
    }
}

// SAFETY: Mutex<S> is Sync when S: Send, and every access goes through it.
unsafe impl<S: RawStorage + Send> ThreadSafeAllocator for LockedAllocator<S> {}
