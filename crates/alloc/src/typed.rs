//! Typed layer over the raw engines
//!
//! Placement construction and destruction on raw storage, plus
//! [`TypedAllocator`], which derives sizes from `T` and works with any
//! [`RawStorage`] engine.
//!
//! ```
//! use nebula_alloc::prelude::*;
//!
//! let mut pool = PoolAllocator::new();
//! let value = pool.alloc_init(String::from("pooled"))?;
//! assert_eq!(unsafe { value.as_ref() }, "pooled");
//! unsafe { pool.drop_typed(value) };
//! # Ok::<(), nebula_alloc::MemoryError>(())
//! ```

use core::alloc::Layout;
use core::mem;
use core::ptr::{self, NonNull};

use crate::allocator::{RawStorage, RawStorageExt};
use crate::error::{AllocError, AllocResult};

/// Moves `value` into uninitialized storage
///
/// # Safety
/// `ptr` must be valid for writes and aligned for `T`. Any previous value
/// at `ptr` is overwritten without being dropped.
#[inline]
pub unsafe fn construct<T>(ptr: NonNull<T>, value: T) {
    unsafe { ptr.as_ptr().write(value) }
}

/// Writes `T::default()` into uninitialized storage
///
/// # Safety
/// Same as [`construct`].
#[inline]
pub unsafe fn construct_default<T: Default>(ptr: NonNull<T>) {
    unsafe { construct(ptr, T::default()) }
}

/// Writes a clone of `value` into uninitialized storage
///
/// # Safety
/// Same as [`construct`].
#[inline]
pub unsafe fn construct_clone<T: Clone>(ptr: NonNull<T>, value: &T) {
    unsafe { construct(ptr, value.clone()) }
}

/// Writes the result of `make` into uninitialized storage
///
/// # Safety
/// Same as [`construct`].
#[inline]
pub unsafe fn construct_with<T>(ptr: NonNull<T>, make: impl FnOnce() -> T) {
    unsafe { construct(ptr, make()) }
}

/// Drops the value at `ptr` in place
///
/// No-op for types without drop glue.
///
/// # Safety
/// `ptr` must point to an initialized `T` that is not used afterwards.
#[inline]
pub unsafe fn destroy<T>(ptr: NonNull<T>) {
    if mem::needs_drop::<T>() {
        unsafe { ptr::drop_in_place(ptr.as_ptr()) }
    }
}

/// Drops `len` consecutive values starting at `first`
///
/// # Safety
/// `first..first + len` must hold initialized values that are not used
/// afterwards.
#[inline]
pub unsafe fn destroy_range<T>(first: NonNull<T>, len: usize) {
    if mem::needs_drop::<T>() {
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first.as_ptr(), len)) }
    }
}

/// Type-safe allocation on any [`RawStorage`] engine
///
/// Sizes and alignments come from `T`. Requests an engine cannot honour
/// fail with [`AllocError::InvalidAlignment`] or
/// [`AllocError::ExceedsMaxSize`] instead of returning misaligned storage.
pub trait TypedAllocator: RawStorage {
    /// Uninitialized storage for one `T`
    #[inline]
    fn alloc_typed<T>(&mut self) -> AllocResult<NonNull<T>> {
        Ok(self.allocate_layout(Layout::new::<T>())?.cast())
    }

    /// Uninitialized storage for `len` consecutive `T`s
    fn alloc_array<T>(&mut self, len: usize) -> AllocResult<NonNull<T>> {
        let layout =
            Layout::array::<T>(len).map_err(|_| AllocError::size_overflow("array layout"))?;
        Ok(self.allocate_layout(layout)?.cast())
    }

    /// Storage holding `value`
    #[inline]
    fn alloc_init<T>(&mut self, value: T) -> AllocResult<NonNull<T>> {
        let ptr = self.alloc_typed::<T>()?;
        // SAFETY: fresh storage sized and aligned for T.
        unsafe { construct(ptr, value) };
        Ok(ptr)
    }

    /// Storage holding `T::default()`
    #[inline]
    fn alloc_default<T: Default>(&mut self) -> AllocResult<NonNull<T>> {
        self.alloc_init(T::default())
    }

    /// Returns storage for one `T` without dropping it
    ///
    /// # Safety
    /// `ptr` must come from `alloc_typed::<T>` or `alloc_init` on this
    /// engine and must not be used afterwards.
    #[inline]
    unsafe fn dealloc_typed<T>(&mut self, ptr: NonNull<T>) {
        unsafe { self.deallocate_layout(ptr.cast(), Layout::new::<T>()) }
    }

    /// Returns storage for `len` `T`s without dropping them
    ///
    /// # Safety
    /// `ptr` must come from `alloc_array::<T>(len)` on this engine.
    unsafe fn dealloc_array<T>(&mut self, ptr: NonNull<T>, len: usize) {
        // SAFETY: alloc_array accepted this layout.
        let layout = unsafe {
            Layout::from_size_align_unchecked(mem::size_of::<T>() * len, mem::align_of::<T>())
        };
        unsafe { self.deallocate_layout(ptr.cast(), layout) }
    }

    /// Drops the value and returns its storage
    ///
    /// # Safety
    /// Same as [`TypedAllocator::dealloc_typed`], and `*ptr` must be initialized.
    #[inline]
    unsafe fn drop_typed<T>(&mut self, ptr: NonNull<T>) {
        unsafe {
            destroy(ptr);
            self.dealloc_typed(ptr);
        }
    }
}

impl<S: RawStorage + ?Sized> TypedAllocator for S {}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::chunk::{ChunkAllocator, ChunkConfig};
    use crate::pool::{PoolAllocator, PoolConfig};

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_destroy_runs_drop_once() {
        let drops = Rc::new(Cell::new(0));
        let mut pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();

        let ptr = pool.alloc_init(DropCounter(Rc::clone(&drops))).unwrap();
        assert_eq!(drops.get(), 0);
        unsafe { pool.drop_typed(ptr) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_destroy_range() {
        let drops = Rc::new(Cell::new(0));
        let mut pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();

        let first = pool.alloc_array::<DropCounter>(4).unwrap();
        for i in 0..4 {
            unsafe { construct(first.add(i), DropCounter(Rc::clone(&drops))) };
        }
        unsafe {
            destroy_range(first, 4);
            pool.dealloc_array(first, 4);
        }
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn test_construct_variants() {
        let mut chunks = ChunkAllocator::for_type::<Vec<u32>>().unwrap();

        let a = chunks.alloc_default::<Vec<u32>>().unwrap();
        let template = vec![1, 2, 3];
        let b = chunks.alloc_typed::<Vec<u32>>().unwrap();
        let c = chunks.alloc_typed::<Vec<u32>>().unwrap();

        unsafe {
            construct_clone(b, &template);
            construct_with(c, || vec![7; 2]);

            assert!(a.as_ref().is_empty());
            assert_eq!(b.as_ref(), &template);
            assert_eq!(c.as_ref(), &[7, 7]);

            chunks.drop_typed(a);
            chunks.drop_typed(b);
            chunks.drop_typed(c);
        }
        assert_eq!(chunks.live_blocks(), 0);
    }

    #[test]
    fn test_engine_limits_are_enforced() {
        let mut chunks = ChunkAllocator::with_config(8, ChunkConfig::production()).unwrap();
        assert!(matches!(
            chunks.alloc_typed::<[u64; 2]>(),
            Err(AllocError::ExceedsMaxSize {
                size: 16,
                max_size: 8
            })
        ));

        #[repr(align(32))]
        struct Wide(#[allow(dead_code)] u8);

        let mut pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();
        assert!(matches!(
            pool.alloc_typed::<Wide>(),
            Err(AllocError::InvalidAlignment { alignment: 32 })
        ));
    }

    #[test]
    fn test_array_overflow() {
        let mut pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();
        assert!(matches!(
            pool.alloc_array::<u64>(usize::MAX),
            Err(AllocError::SizeOverflow { .. })
        ));
    }
}
