//! Segregated size-class pool allocator
//!
//! # Safety
//!
//! This module keeps sixteen intrusive free lists over raw slab memory:
//! - Free blocks store the next pointer in their first word (intrusive list)
//! - New blocks are carved from a heap slab `[start, end)` obtained in bulk
//!   from the backing allocator
//! - Slabs are never returned until the pool is dropped
//!
//! ## Invariants
//!
//! - Every block on list *k* is exactly `8 * (k + 1)` bytes and 8-aligned
//! - `slab.start <= slab.end`; carving only moves `start` forward
//! - Every slab base in `slabs` came from `backing` with the stored layout
//! - A block is never on a free list and carved from the slab at the same time

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use super::config::PoolConfig;
use super::size_class::{ALIGN, MAX_BYTES, NUM_CLASSES, SizeClass};
use super::stats::PoolStats;
use crate::allocator::{Allocator, MemoryUsage, RawStorage, SystemAllocator};
use crate::error::{MemoryError, MemoryResult};

/// Node in a free list
///
/// Overlays the first word of a free block. The rest of the block is
/// unspecified while it is free.
#[repr(C)]
struct FreeNode {
    next: Option<NonNull<FreeNode>>,
}

/// Uncarved remainder of the current slab
#[derive(Debug)]
struct HeapSlab {
    start: NonNull<u8>,
    end: NonNull<u8>,
}

impl HeapSlab {
    fn empty() -> Self {
        let dangling = NonNull::<u8>::dangling();
        Self {
            start: dangling,
            end: dangling,
        }
    }

    /// Slab over `len` bytes at `base`
    ///
    /// # Safety
    /// `base` must be valid for `len` bytes.
    unsafe fn over(base: NonNull<u8>, len: usize) -> Self {
        Self {
            start: base,
            // SAFETY: one-past-the-end of a region valid for len bytes.
            end: unsafe { base.add(len) },
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.end.addr().get() - self.start.addr().get()
    }

    /// Takes `bytes` off the front of the slab
    ///
    /// # Safety
    /// `bytes <= self.remaining()`.
    #[inline]
    unsafe fn carve(&mut self, bytes: usize) -> NonNull<u8> {
        debug_assert!(bytes <= self.remaining());
        let block = self.start;
        // SAFETY: stays within [start, end] by the caller's bound.
        self.start = unsafe { self.start.add(bytes) };
        block
    }
}

/// Operation counters, maintained only when `track_stats` is set
#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_allocs: u64,
    total_deallocs: u64,
    large_allocs: u64,
    refills: u64,
    scavenges: u64,
}

/// Segregated size-class pool allocator
///
/// Serves any request up to [`MAX_BYTES`] from one of sixteen free lists
/// (8, 16, ..., 128 bytes). Empty lists are refilled in batches carved from a
/// heap slab; the slab is replaced with a bigger one from the backing
/// allocator when it runs out. Larger requests go straight to the backing
/// allocator.
///
/// # Memory Layout
/// ```text
/// slab:  [blk][blk][blk][blk][blk][ ...... uncarved ...... ]
///                                 ^start                   ^end
/// class 2 (24 bytes): head -> blk -> blk -> None
/// ```
///
/// The pool is single-threaded; wrap it in a
/// [`LockedAllocator`](crate::allocator::LockedAllocator) to share it.
pub struct PoolAllocator<A: Allocator = SystemAllocator> {
    free_lists: [Option<NonNull<FreeNode>>; NUM_CLASSES],
    free_counts: [usize; NUM_CLASSES],
    slab: HeapSlab,
    /// Every slab obtained from `backing`, released on drop
    slabs: Vec<(NonNull<u8>, Layout)>,
    heap_size: usize,
    /// Live bytes handed out above the ceiling
    large_bytes: usize,
    backing: A,
    config: PoolConfig,
    counters: Counters,
}

// SAFETY: The pool exclusively owns its slabs and free lists; raw pointers
// never alias memory owned by another instance. Moving it to another thread
// is sound as long as the backing allocator can move too.
unsafe impl<A: Allocator + Send> Send for PoolAllocator<A> {}

impl PoolAllocator<SystemAllocator> {
    /// Creates an empty pool over the system allocator
    ///
    /// No memory is requested until the first allocation.
    pub fn new() -> Self {
        Self::from_parts(PoolConfig::default(), SystemAllocator)
    }

    /// Creates a pool with custom configuration
    pub fn with_config(config: PoolConfig) -> MemoryResult<Self> {
        Self::with_backing(config, SystemAllocator)
    }

    /// Creates a pool with production config - optimized for performance
    pub fn production() -> Self {
        Self::from_parts(PoolConfig::production(), SystemAllocator)
    }

    /// Creates a pool with debug config - optimized for debugging
    pub fn debug() -> Self {
        Self::from_parts(PoolConfig::debug(), SystemAllocator)
    }
}

impl Default for PoolAllocator<SystemAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Allocator> PoolAllocator<A> {
    /// Creates a pool drawing slabs from `backing`
    pub fn with_backing(config: PoolConfig, backing: A) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, backing))
    }

    fn from_parts(config: PoolConfig, backing: A) -> Self {
        Self {
            free_lists: [None; NUM_CLASSES],
            free_counts: [0; NUM_CLASSES],
            slab: HeapSlab::empty(),
            slabs: Vec::new(),
            heap_size: 0,
            large_bytes: 0,
            backing,
            config,
            counters: Counters::default(),
        }
    }

    /// Allocates storage for `n` bytes
    ///
    /// Requests up to [`MAX_BYTES`] are served from the class free list
    /// (zero-byte requests from the smallest class); larger ones are
    /// forwarded to the backing allocator with 8-byte alignment.
    ///
    /// # Errors
    /// - [`MemoryError::PoolExhausted`] when the slab cannot grow and no
    ///   larger class has a block to scavenge
    /// - The backing allocator's error for above-ceiling requests
    pub fn allocate(&mut self, n: usize) -> MemoryResult<NonNull<u8>> {
        let Some(class) = SizeClass::for_size(n) else {
            return self.allocate_large(n);
        };

        let block = match self.pop(class) {
            Some(block) => block,
            None => self.refill(class)?,
        };

        if self.config.track_stats {
            self.counters.total_allocs += 1;
        }

        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: block is a class-sized block now owned by the caller.
            unsafe { ptr::write_bytes(block.as_ptr(), pattern, class.size()) };
        }

        Ok(block)
    }

    /// Returns a block to its class free list
    ///
    /// # Safety
    /// `ptr` must come from [`allocate`](Self::allocate) on this pool with a
    /// size mapping to the same class as `n` (or exactly `n` above the
    /// ceiling), and must not be used afterwards. This is not checked.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, n: usize) {
        let Some(class) = SizeClass::for_size(n) else {
            // SAFETY: allocate_large succeeded with exactly this layout.
            unsafe { self.deallocate_large(ptr, n) };
            return;
        };

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: ptr is a class-sized block returned by the caller.
            unsafe { ptr::write_bytes(ptr.as_ptr(), pattern, class.size()) };
        }

        // SAFETY: ptr is a free class-sized block (caller contract).
        unsafe { self.push(class, ptr) };

        if self.config.track_stats {
            self.counters.total_deallocs += 1;
        }
    }

    /// Deallocates `ptr` and allocates `new_n` bytes
    ///
    /// Contents are not preserved. When both sizes map to the same class the
    /// block is handed back unchanged.
    ///
    /// # Safety
    /// Same as [`deallocate`](Self::deallocate) for `ptr` and `old_n`. The
    /// old block is released even when the new allocation fails.
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_n: usize,
        new_n: usize,
    ) -> MemoryResult<NonNull<u8>> {
        if let (Some(old), Some(new)) = (SizeClass::for_size(old_n), SizeClass::for_size(new_n))
            && old == new
        {
            return Ok(ptr);
        }

        // SAFETY: forwarded caller contract.
        unsafe { self.deallocate(ptr, old_n) };
        self.allocate(new_n)
    }

    fn allocate_large(&mut self, n: usize) -> MemoryResult<NonNull<u8>> {
        let layout = Layout::from_size_align(n, ALIGN)
            .map_err(|_| MemoryError::size_overflow("large allocation layout"))?;

        // SAFETY: layout is valid and non-zero (n > MAX_BYTES).
        let block = unsafe { self.backing.allocate(layout)? }.cast::<u8>();
        self.large_bytes += n;

        if self.config.track_stats {
            self.counters.large_allocs += 1;
        }
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: fresh block valid for n bytes.
            unsafe { ptr::write_bytes(block.as_ptr(), pattern, n) };
        }

        Ok(block)
    }

    /// # Safety
    /// `ptr` came from `allocate_large(n)` on this pool.
    unsafe fn deallocate_large(&mut self, ptr: NonNull<u8>, n: usize) {
        // SAFETY: the same layout was accepted by from_size_align in allocate_large.
        let layout = unsafe { Layout::from_size_align_unchecked(n, ALIGN) };
        // SAFETY: ptr/layout match the backing allocation (caller contract).
        unsafe { self.backing.deallocate(ptr, layout) };
        self.large_bytes = self.large_bytes.saturating_sub(n);
    }

    #[inline]
    fn pop(&mut self, class: SizeClass) -> Option<NonNull<u8>> {
        let index = class.index();
        let head = self.free_lists[index]?;
        // SAFETY: head is a free block of this class holding a FreeNode.
        self.free_lists[index] = unsafe { head.as_ref().next };
        self.free_counts[index] -= 1;
        Some(head.cast())
    }

    /// # Safety
    /// `block` must be valid for `class.size()` bytes, 8-aligned, and not in
    /// use by anyone else.
    #[inline]
    unsafe fn push(&mut self, class: SizeClass, block: NonNull<u8>) {
        let index = class.index();
        let node = block.cast::<FreeNode>();
        // SAFETY: block is at least 8 bytes and 8-aligned (caller contract).
        unsafe {
            node.as_ptr().write(FreeNode {
                next: self.free_lists[index],
            });
        }
        self.free_lists[index] = Some(node);
        self.free_counts[index] += 1;
    }

    /// Carves a batch for an empty class and returns its first block
    fn refill(&mut self, class: SizeClass) -> MemoryResult<NonNull<u8>> {
        let size = class.size();
        let (first, count) = self.carve_batch(class)?;

        // Link blocks 1..count so block 1 ends up at the head.
        for i in (1..count).rev() {
            // SAFETY: block i lies inside the carved run of count * size bytes.
            unsafe { self.push(class, first.add(i * size)) };
        }

        if self.config.track_stats {
            self.counters.refills += 1;
        }

        Ok(first)
    }

    /// Takes up to one batch of `class` blocks from the slab, growing it
    /// when not even one block fits
    fn carve_batch(&mut self, class: SizeClass) -> MemoryResult<(NonNull<u8>, usize)> {
        let size = class.size();
        let batch = self.config.refill_batch;
        let batch_bytes = size
            .checked_mul(batch)
            .ok_or_else(|| MemoryError::size_overflow("refill batch size"))?;

        loop {
            let remaining = self.slab.remaining();

            if remaining >= batch_bytes {
                // SAFETY: batch_bytes <= remaining.
                return Ok((unsafe { self.slab.carve(batch_bytes) }, batch));
            }

            if remaining >= size {
                let count = remaining / size;
                // SAFETY: count * size <= remaining.
                return Ok((unsafe { self.slab.carve(count * size) }, count));
            }

            self.donate_scrap();
            self.grow_heap(class, batch_bytes)?;
        }
    }

    /// Puts the slab's leftover bytes on the class they exactly fit
    fn donate_scrap(&mut self) {
        let remaining = self.slab.remaining();
        if remaining == 0 {
            return;
        }

        // Slabs and carves are multiples of ALIGN, so scrap always has a class.
        debug_assert!(remaining.is_multiple_of(ALIGN));
        if let Some(class) = SizeClass::exact(remaining) {
            // SAFETY: the scrap is an uncarved, 8-aligned region of exactly class.size() bytes.
            unsafe { self.push(class, self.slab.start) };

            #[cfg(feature = "logging")]
            tracing::trace!(bytes = remaining, class = class.index(), "donated slab scrap");
        }

        self.slab = HeapSlab::empty();
    }

    /// Installs a fresh slab, or a scavenged block when the backing
    /// allocator refuses
    fn grow_heap(&mut self, class: SizeClass, batch_bytes: usize) -> MemoryResult<()> {
        let bytes = batch_bytes
            .checked_mul(self.config.growth_factor)
            .ok_or_else(|| MemoryError::size_overflow("slab growth"))?;
        let layout = Layout::from_size_align(bytes, ALIGN)
            .map_err(|_| MemoryError::invalid_layout("slab size exceeds isize::MAX"))?;

        self.slabs
            .try_reserve(1)
            .map_err(|_| MemoryError::allocation_failed(bytes, ALIGN))?;

        // SAFETY: layout is valid and non-zero.
        match unsafe { self.backing.allocate(layout) } {
            Ok(region) => {
                let base = region.cast::<u8>();
                self.slabs.push((base, layout));
                self.heap_size += bytes;
                // SAFETY: region is valid for `bytes` bytes.
                self.slab = unsafe { HeapSlab::over(base, bytes) };

                #[cfg(feature = "logging")]
                tracing::debug!(
                    bytes,
                    heap_size = self.heap_size,
                    class = class.index(),
                    "pool slab grown"
                );

                Ok(())
            }
            Err(_err) => {
                #[cfg(feature = "logging")]
                tracing::warn!(bytes, error = %_err, "slab growth failed, scavenging free lists");

                if self.scavenge(class) {
                    Ok(())
                } else {
                    self.slab = HeapSlab::empty();
                    Err(MemoryError::pool_exhausted(class.size(), self.heap_size))
                }
            }
        }
    }

    /// Turns one free block of `class` or larger into the slab
    fn scavenge(&mut self, class: SizeClass) -> bool {
        for donor in SizeClass::all().skip(class.index()) {
            if let Some(block) = self.pop(donor) {
                // SAFETY: block is a free block of donor.size() bytes.
                self.slab = unsafe { HeapSlab::over(block, donor.size()) };

                if self.config.track_stats {
                    self.counters.scavenges += 1;
                }

                #[cfg(feature = "logging")]
                tracing::debug!(
                    donor = donor.index(),
                    class = class.index(),
                    "scavenged block as emergency slab"
                );

                return true;
            }
        }
        false
    }

    /// Free blocks currently on `class`'s list
    pub fn free_blocks(&self, class: SizeClass) -> usize {
        self.free_counts[class.index()]
    }

    /// Bytes obtained from the backing allocator for slabs
    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    /// Number of slabs obtained so far
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Bytes left uncarved in the current slab
    pub fn slab_remaining(&self) -> usize {
        self.slab.remaining()
    }

    /// Checks if a pointer lies inside one of this pool's slabs
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr.addr();
        self.slabs.iter().any(|(base, layout)| {
            let start = base.addr().get();
            addr >= start && addr < start + layout.size()
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The allocator slabs are drawn from
    pub fn backing(&self) -> &A {
        &self.backing
    }

    /// Snapshot of the pool's state
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free_blocks: self.free_counts,
            heap_size: self.heap_size,
            slab_remaining: self.slab.remaining(),
            slab_count: self.slabs.len(),
            total_allocs: self.counters.total_allocs,
            total_deallocs: self.counters.total_deallocs,
            large_allocs: self.counters.large_allocs,
            refills: self.counters.refills,
            scavenges: self.counters.scavenges,
        }
    }

    fn free_list_bytes(&self) -> usize {
        SizeClass::all()
            .map(|class| self.free_counts[class.index()] * class.size())
            .sum()
    }
}

impl<A: Allocator> MemoryUsage for PoolAllocator<A> {
    fn used_memory(&self) -> usize {
        let pooled = self.heap_size - self.slab.remaining() - self.free_list_bytes();
        pooled + self.large_bytes
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.slab.remaining() + self.free_list_bytes())
    }
}

// SAFETY: Pooled blocks are 8-aligned and class-sized (>= size); large blocks
// come from the backing allocator with align 8 and exactly `size` bytes.
unsafe impl<A: Allocator> RawStorage for PoolAllocator<A> {
    #[inline]
    fn allocate_raw(&mut self, size: usize) -> MemoryResult<NonNull<u8>> {
        self.allocate(size)
    }

    #[inline]
    unsafe fn deallocate_raw(&mut self, ptr: NonNull<u8>, size: usize) {
        unsafe { self.deallocate(ptr, size) }
    }

    fn max_align(&self) -> usize {
        ALIGN
    }
}

impl<A: Allocator> Drop for PoolAllocator<A> {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        if !self.slabs.is_empty() {
            tracing::debug!(
                slabs = self.slabs.len(),
                heap_size = self.heap_size,
                "releasing pool slabs"
            );
        }

        for (base, layout) in self.slabs.drain(..) {
            // SAFETY: each slab came from backing.allocate(layout) and is
            // released exactly once here.
            unsafe { self.backing.deallocate(base, layout) };
        }
    }
}

impl<A: Allocator> core::fmt::Debug for PoolAllocator<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("free_blocks", &self.free_counts)
            .field("heap_size", &self.heap_size)
            .field("slab_remaining", &self.slab.remaining())
            .field("slab_count", &self.slabs.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
