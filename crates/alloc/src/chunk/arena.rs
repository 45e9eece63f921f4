//! A single fixed-capacity block arena
//!
//! Free blocks form a singly-linked list threaded through their first byte:
//! each free block stores the index of the next free block, rooted at
//! `first_available`. A fresh chunk links block `i` to `i + 1`; the last
//! block holds `capacity`, which is never a valid index.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::allocator::Allocator;
use crate::error::MemoryResult;

/// Largest number of blocks a chunk can index with a one-byte link
pub const MAX_BLOCKS_PER_CHUNK: usize = u8::MAX as usize;

/// Fixed-capacity arena of equally sized blocks
///
/// A chunk does not know its own block size or capacity; the owning
/// allocator passes them in. It also does not free its buffer on drop:
/// the owner calls [`Chunk::release`] with the backing allocator.
#[derive(Debug)]
pub(crate) struct Chunk {
    data: NonNull<u8>,
    first_available: u8,
    available: u8,
}

impl Chunk {
    /// Allocates a buffer and links all `capacity` blocks
    pub(crate) fn new<A: Allocator>(
        backing: &A,
        layout: Layout,
        block_size: usize,
        capacity: u8,
    ) -> MemoryResult<Self> {
        debug_assert_eq!(layout.size(), block_size * usize::from(capacity));

        // SAFETY: layout is non-zero (block_size >= 1, capacity >= 1).
        let data = unsafe { backing.allocate(layout)? }.cast::<u8>();

        let mut chunk = Self {
            data,
            first_available: 0,
            available: capacity,
        };
        // SAFETY: data is valid for block_size * capacity bytes.
        unsafe { chunk.reset(block_size, capacity) };
        Ok(chunk)
    }

    /// Marks every block free again
    ///
    /// # Safety
    /// `block_size` and `capacity` must match the buffer's layout.
    unsafe fn reset(&mut self, block_size: usize, capacity: u8) {
        self.first_available = 0;
        self.available = capacity;
        for i in 0..capacity {
            // SAFETY: block i starts inside the buffer.
            unsafe { self.data.add(usize::from(i) * block_size).write(i + 1) };
        }
    }

    /// Pops the first free block
    #[inline]
    pub(crate) fn allocate(&mut self, block_size: usize) -> Option<NonNull<u8>> {
        if self.available == 0 {
            return None;
        }

        // SAFETY: first_available indexes a free block while available > 0.
        let block = unsafe { self.data.add(usize::from(self.first_available) * block_size) };
        // SAFETY: a free block's first byte holds the next free index.
        self.first_available = unsafe { block.read() };
        self.available -= 1;
        Some(block)
    }

    /// Pushes `block` back onto the free list
    ///
    /// # Safety
    /// `block` must be a block-aligned pointer into this chunk that is
    /// currently allocated.
    #[inline]
    pub(crate) unsafe fn deallocate(&mut self, block: NonNull<u8>, block_size: usize) {
        let offset = block.addr().get() - self.data.addr().get();
        debug_assert!(offset.is_multiple_of(block_size), "pointer is not block-aligned");

        // SAFETY: block is a live block of this chunk (caller contract).
        unsafe { block.write(self.first_available) };
        self.first_available = (offset / block_size) as u8;
        self.available += 1;
    }

    /// Checks if `addr` lies inside this chunk's buffer of `len` bytes
    #[inline]
    pub(crate) fn contains(&self, addr: usize, len: usize) -> bool {
        let start = self.data.addr().get();
        addr >= start && addr - start < len
    }

    #[inline]
    pub(crate) fn available(&self) -> u8 {
        self.available
    }

    /// Every block is free
    #[inline]
    pub(crate) fn is_unused(&self, capacity: u8) -> bool {
        self.available == capacity
    }

    /// Returns the buffer to the backing allocator
    ///
    /// # Safety
    /// `backing` and `layout` must be the ones the chunk was created with.
    pub(crate) unsafe fn release<A: Allocator>(self, backing: &A, layout: Layout) {
        // SAFETY: data came from backing.allocate(layout) (caller contract).
        unsafe { backing.deallocate(self.data, layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;

    fn chunk(block_size: usize, capacity: u8) -> (Chunk, Layout) {
        let layout = Layout::from_size_align(block_size * usize::from(capacity), 8).unwrap();
        let chunk = Chunk::new(&SystemAllocator, layout, block_size, capacity).unwrap();
        (chunk, layout)
    }

    #[test]
    fn test_fresh_chunk_hands_out_blocks_in_order() {
        let (mut chunk, layout) = chunk(16, 4);
        let base = chunk.data.addr().get();

        for i in 0..4 {
            let block = chunk.allocate(16).unwrap();
            assert_eq!(block.addr().get(), base + i * 16);
        }
        assert!(chunk.allocate(16).is_none());
        assert_eq!(chunk.available(), 0);

        unsafe { chunk.release(&SystemAllocator, layout) };
    }

    #[test]
    fn test_deallocate_is_lifo() {
        let (mut chunk, layout) = chunk(8, 3);
        let a = chunk.allocate(8).unwrap();
        let b = chunk.allocate(8).unwrap();

        unsafe {
            chunk.deallocate(a, 8);
            chunk.deallocate(b, 8);
        }
        assert!(chunk.is_unused(3));
        assert_eq!(chunk.allocate(8), Some(b));
        assert_eq!(chunk.allocate(8), Some(a));

        unsafe { chunk.release(&SystemAllocator, layout) };
    }

    #[test]
    fn test_full_capacity_terminal_marker() {
        let capacity = u8::MAX;
        let (mut chunk, layout) = chunk(1, capacity);
        let mut seen = Vec::new();
        while let Some(block) = chunk.allocate(1) {
            seen.push(block.addr().get());
        }
        assert_eq!(seen.len(), MAX_BLOCKS_PER_CHUNK);
        seen.dedup();
        assert_eq!(seen.len(), MAX_BLOCKS_PER_CHUNK);

        unsafe { chunk.release(&SystemAllocator, layout) };
    }

    #[test]
    fn test_contains() {
        let (chunk, layout) = chunk(16, 2);
        let base = chunk.data.addr().get();
        assert!(chunk.contains(base, 32));
        assert!(chunk.contains(base + 31, 32));
        assert!(!chunk.contains(base + 32, 32));
        assert!(!chunk.contains(base.wrapping_sub(1), 32));

        unsafe { chunk.release(&SystemAllocator, layout) };
    }
}
