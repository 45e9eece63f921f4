//! Fixed-block chunk allocator
//!
//! # Safety
//!
//! The allocator owns a `Vec<Chunk>`; each chunk owns one buffer from the
//! backing allocator. Cache hints are indices into the vector, so pushing
//! a chunk (which may move the vector) never invalidates them.
//!
//! ## Invariants
//!
//! - Every chunk buffer has layout `chunk_layout` from `backing`
//! - `alloc_chunk` / `dealloc_chunk` are `None` or `< chunks.len()`
//! - Once a chunk exists at least one chunk is always kept
//! - A buffer is released exactly once: on compaction or on drop

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use super::arena::Chunk;
use super::config::ChunkConfig;
use super::stats::ChunkStats;
use crate::allocator::{Allocator, MemoryUsage, RawStorage, SystemAllocator};
use crate::error::{MemoryError, MemoryResult};
use crate::utils::{checked_align_up, natural_align};

/// Alignment limit when it is derived from the block size
const MAX_NATURAL_ALIGN: usize = 16;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_allocs: u64,
    total_deallocs: u64,
    chunks_created: u64,
    chunks_released: u64,
    relocations: u64,
}

/// Allocator for blocks of one fixed size
///
/// Blocks live in chunks of up to 255 blocks each. A fully freed chunk is
/// either kept as a spare, released, or swapped to the tail of the chunk
/// list so a later deallocation can release it:
///
/// ```text
/// dealloc empties chunk i:
///   i is last:       release it if chunk i-1 is empty too
///   last is empty:   release last, allocate from i next
///   otherwise:       swap(i, last), allocate from last next
/// ```
pub struct ChunkAllocator<A: Allocator = SystemAllocator> {
    chunks: Vec<Chunk>,
    alloc_chunk: Option<usize>,
    dealloc_chunk: Option<usize>,
    block_size: usize,
    block_align: usize,
    capacity: u8,
    chunk_layout: Layout,
    backing: A,
    config: ChunkConfig,
    counters: Counters,
}

// SAFETY: The allocator exclusively owns every chunk buffer. Moving it to
// another thread is sound as long as the backing allocator can move too.
unsafe impl<A: Allocator + Send> Send for ChunkAllocator<A> {}

impl ChunkAllocator<SystemAllocator> {
    /// Creates an allocator for `block_size`-byte blocks, `capacity` per chunk
    ///
    /// # Errors
    /// [`MemoryError::InvalidConfig`] if `block_size` is zero or `capacity`
    /// is outside `1..=255`.
    pub fn new(block_size: usize, capacity: usize) -> MemoryResult<Self> {
        Self::with_config(block_size, ChunkConfig::default().with_capacity(capacity))
    }

    /// Creates an allocator with custom configuration
    pub fn with_config(block_size: usize, config: ChunkConfig) -> MemoryResult<Self> {
        Self::with_backing(block_size, config, SystemAllocator)
    }

    /// Creates an allocator sized and aligned for `T`, 255 blocks per chunk
    pub fn for_type<T>() -> MemoryResult<Self> {
        Self::for_type_with_capacity::<T>(ChunkConfig::default().blocks_per_chunk)
    }

    /// Creates an allocator sized and aligned for `T`
    pub fn for_type_with_capacity<T>(capacity: usize) -> MemoryResult<Self> {
        let layout = Layout::new::<T>();
        Self::with_config(
            layout.size().max(1),
            ChunkConfig::default()
                .with_capacity(capacity)
                .with_align(layout.align()),
        )
    }
}

impl<A: Allocator> ChunkAllocator<A> {
    /// Creates an allocator drawing chunk buffers from `backing`
    ///
    /// The block size is rounded up to the block alignment. No chunk is
    /// allocated until the first [`allocate`](Self::allocate).
    pub fn with_backing(block_size: usize, config: ChunkConfig, backing: A) -> MemoryResult<Self> {
        config.validate()?;
        if block_size == 0 {
            return Err(MemoryError::invalid_config("block_size must be non-zero"));
        }

        let block_align = config
            .block_align
            .unwrap_or_else(|| natural_align(block_size, MAX_NATURAL_ALIGN));
        let block_size = checked_align_up(block_size, block_align)
            .ok_or_else(|| MemoryError::size_overflow("block size alignment"))?;
        let capacity = u8::try_from(config.blocks_per_chunk)
            .map_err(|_| MemoryError::invalid_config("blocks_per_chunk exceeds 255"))?;
        let chunk_bytes = block_size
            .checked_mul(usize::from(capacity))
            .ok_or_else(|| MemoryError::size_overflow("chunk size"))?;
        let chunk_layout = Layout::from_size_align(chunk_bytes, block_align)
            .map_err(|_| MemoryError::invalid_layout("chunk size exceeds isize::MAX"))?;

        Ok(Self {
            chunks: Vec::new(),
            alloc_chunk: None,
            dealloc_chunk: None,
            block_size,
            block_align,
            capacity,
            chunk_layout,
            backing,
            config,
            counters: Counters::default(),
        })
    }

    /// Allocates one block
    ///
    /// Tries the last chunk allocated from, then the first chunk with a free
    /// block, then appends a new chunk.
    ///
    /// # Errors
    /// The backing allocator's error if a new chunk buffer is needed and
    /// cannot be obtained. Nothing is inserted in that case.
    pub fn allocate(&mut self) -> MemoryResult<NonNull<u8>> {
        let index = match self.alloc_chunk {
            Some(i) if self.chunks.get(i).is_some_and(|c| c.available() > 0) => i,
            _ => match self.chunks.iter().position(|c| c.available() > 0) {
                Some(i) => i,
                None => self.push_chunk()?,
            },
        };
        self.alloc_chunk = Some(index);

        let block = self.chunks[index]
            .allocate(self.block_size)
            .ok_or_else(|| MemoryError::corruption("chunk", "selected chunk has no free block"))?;

        if self.config.track_stats {
            self.counters.total_allocs += 1;
        }
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: block is a whole block now owned by the caller.
            unsafe { ptr::write_bytes(block.as_ptr(), pattern, self.block_size) };
        }

        Ok(block)
    }

    /// Returns a block and compacts if its chunk became empty
    ///
    /// A pointer that no chunk owns trips a debug assertion; release builds
    /// log it and leave the allocator untouched.
    ///
    /// # Safety
    /// `ptr` must come from [`allocate`](Self::allocate) on this allocator
    /// and must not be used afterwards.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let owner = self.find_owning_chunk(ptr.as_ptr());
        debug_assert!(owner.is_some(), "pointer {ptr:p} is not owned by this allocator");
        let Some(index) = owner else {
            #[cfg(feature = "logging")]
            tracing::warn!(ptr = ?ptr, block_size = self.block_size, "ignoring deallocation of foreign pointer");
            return;
        };
        self.dealloc_chunk = Some(index);

        debug_assert!(
            !self.chunks[index].is_unused(self.capacity),
            "double free into an empty chunk"
        );

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: ptr is a whole block of this allocator (caller contract).
            unsafe { ptr::write_bytes(ptr.as_ptr(), pattern, self.block_size) };
        }

        // SAFETY: ptr is a live block inside chunk `index`.
        unsafe { self.chunks[index].deallocate(ptr, self.block_size) };

        if self.config.track_stats {
            self.counters.total_deallocs += 1;
        }

        if self.chunks[index].is_unused(self.capacity) {
            self.compact(index);
        }
    }

    /// Index of the chunk whose buffer contains `ptr`
    ///
    /// Searches outward from the last deallocation chunk in both directions,
    /// so frees near earlier frees are found quickly. Finds the owner for
    /// every owned pointer whatever the hint.
    pub fn find_owning_chunk(&self, ptr: *const u8) -> Option<usize> {
        let len = self.chunks.len();
        if len == 0 {
            return None;
        }

        let addr = ptr.addr();
        let chunk_bytes = self.chunk_layout.size();
        let start = self.dealloc_chunk.filter(|&i| i < len).unwrap_or(0);

        let mut lo = Some(start);
        let mut hi = (start + 1 < len).then_some(start + 1);

        while lo.is_some() || hi.is_some() {
            if let Some(i) = lo {
                if self.chunks[i].contains(addr, chunk_bytes) {
                    return Some(i);
                }
                lo = i.checked_sub(1);
            }
            if let Some(i) = hi {
                if self.chunks[i].contains(addr, chunk_bytes) {
                    return Some(i);
                }
                hi = (i + 1 < len).then_some(i + 1);
            }
        }
        None
    }

    /// Checks if a pointer lies inside one of this allocator's chunks
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.find_owning_chunk(ptr).is_some()
    }

    fn push_chunk(&mut self) -> MemoryResult<usize> {
        self.chunks
            .try_reserve(1)
            .map_err(|_| MemoryError::allocation_failed(self.chunk_layout.size(), self.block_align))?;

        let chunk = Chunk::new(&self.backing, self.chunk_layout, self.block_size, self.capacity)?;
        self.chunks.push(chunk);

        if self.dealloc_chunk.is_none() {
            self.dealloc_chunk = Some(0);
        }
        if self.config.track_stats {
            self.counters.chunks_created += 1;
        }

        #[cfg(feature = "logging")]
        tracing::trace!(
            block_size = self.block_size,
            chunks = self.chunks.len(),
            "chunk created"
        );

        Ok(self.chunks.len() - 1)
    }

    /// Applies the compaction policy after chunk `freed` became empty
    fn compact(&mut self, freed: usize) {
        let last = self.chunks.len() - 1;

        if freed == last {
            if last > 0 && self.chunks[last - 1].is_unused(self.capacity) {
                self.release_last();
                self.alloc_chunk = Some(0);
                self.dealloc_chunk = Some(0);
            }
            return;
        }

        if self.chunks[last].is_unused(self.capacity) {
            self.release_last();
            self.alloc_chunk = Some(freed);
        } else {
            self.chunks.swap(freed, last);
            self.alloc_chunk = Some(last);

            if self.config.track_stats {
                self.counters.relocations += 1;
            }

            #[cfg(feature = "logging")]
            tracing::trace!(from = freed, to = last, "empty chunk moved to tail");
        }
    }

    fn release_last(&mut self) {
        if let Some(chunk) = self.chunks.pop() {
            // SAFETY: chunk was created with this backing and chunk_layout.
            unsafe { chunk.release(&self.backing, self.chunk_layout) };

            if self.config.track_stats {
                self.counters.chunks_released += 1;
            }

            #[cfg(feature = "logging")]
            tracing::trace!(
                block_size = self.block_size,
                chunks = self.chunks.len(),
                "chunk released"
            );
        }
    }

    /// Size of each block (after alignment)
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_align(&self) -> usize {
        self.block_align
    }

    pub fn blocks_per_chunk(&self) -> usize {
        usize::from(self.capacity)
    }

    /// Chunks currently held
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Blocks handed out and not yet returned
    pub fn live_blocks(&self) -> usize {
        self.chunks.len() * usize::from(self.capacity) - self.free_blocks()
    }

    /// Free blocks across all chunks
    pub fn free_blocks(&self) -> usize {
        self.chunks.iter().map(|c| usize::from(c.available())).sum()
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// The allocator chunk buffers are drawn from
    pub fn backing(&self) -> &A {
        &self.backing
    }

    /// Snapshot of the allocator's state
    pub fn stats(&self) -> ChunkStats {
        ChunkStats {
            block_size: self.block_size,
            blocks_per_chunk: usize::from(self.capacity),
            chunk_count: self.chunks.len(),
            live_blocks: self.live_blocks(),
            free_blocks: self.free_blocks(),
            total_allocs: self.counters.total_allocs,
            total_deallocs: self.counters.total_deallocs,
            chunks_created: self.counters.chunks_created,
            chunks_released: self.counters.chunks_released,
            relocations: self.counters.relocations,
        }
    }
}

impl<A: Allocator> MemoryUsage for ChunkAllocator<A> {
    fn used_memory(&self) -> usize {
        self.live_blocks() * self.block_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.free_blocks() * self.block_size)
    }
}

// SAFETY: Every block is block_size bytes and aligned to block_align;
// requests above block_size are refused.
unsafe impl<A: Allocator> RawStorage for ChunkAllocator<A> {
    fn allocate_raw(&mut self, size: usize) -> MemoryResult<NonNull<u8>> {
        if size > self.block_size {
            return Err(MemoryError::exceeds_max_size(size, self.block_size));
        }
        self.allocate()
    }

    unsafe fn deallocate_raw(&mut self, ptr: NonNull<u8>, _size: usize) {
        unsafe { self.deallocate(ptr) }
    }

    fn max_align(&self) -> usize {
        self.block_align
    }

    fn max_size(&self) -> Option<usize> {
        Some(self.block_size)
    }
}

impl<A: Allocator> Drop for ChunkAllocator<A> {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        {
            let live = self.live_blocks();
            if live > 0 {
                tracing::warn!(
                    live_blocks = live,
                    block_size = self.block_size,
                    "chunk allocator dropped with live blocks"
                );
            }
        }

        for chunk in self.chunks.drain(..) {
            // SAFETY: each chunk was created with this backing and
            // chunk_layout and is released exactly once here.
            unsafe { chunk.release(&self.backing, self.chunk_layout) };
        }
    }
}

impl<A: Allocator> core::fmt::Debug for ChunkAllocator<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChunkAllocator")
            .field("block_size", &self.block_size)
            .field("block_align", &self.block_align)
            .field("blocks_per_chunk", &self.capacity)
            .field("chunks", &self.chunks.len())
            .field("alloc_chunk", &self.alloc_chunk)
            .field("dealloc_chunk", &self.dealloc_chunk)
            .finish_non_exhaustive()
    }
}
