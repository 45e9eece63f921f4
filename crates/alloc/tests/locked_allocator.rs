//! Sharing an engine across threads behind a mutex

use std::alloc::Layout;
use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::Arc;
use std::thread;

use nebula_alloc::allocator::{Allocator, LockedAllocator, ThreadSafeAllocator};
use nebula_alloc::chunk::{ChunkAllocator, ChunkConfig};
use nebula_alloc::pool::{PoolAllocator, PoolConfig};

const THREADS: usize = 4;
const PER_THREAD: usize = 500;

fn assert_thread_safe<A: ThreadSafeAllocator>(_: &A) {}

/// Allocates from `shared` on several threads, stamping each block with
/// its thread id, and returns every address handed out
fn hammer<A: Allocator + Send + Sync + 'static>(shared: &Arc<A>, layout: Layout) -> Vec<usize> {
    let handles: Vec<_> = (0..THREADS)
        .map(|id| {
            let shared = Arc::clone(shared);
            thread::spawn(move || {
                let mut addrs = Vec::with_capacity(PER_THREAD);
                for _ in 0..PER_THREAD {
                    let block = unsafe { shared.allocate(layout).unwrap() }.cast::<u8>();
                    unsafe { std::ptr::write_bytes(block.as_ptr(), id as u8, layout.size()) };
                    addrs.push(block.addr().get());
                }
                // stamps survive other threads' allocations
                for &addr in &addrs {
                    let byte = unsafe { *(addr as *const u8) };
                    assert_eq!(byte, id as u8);
                }
                addrs
            })
        })
        .collect();

    handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect()
}

#[test]
fn test_locked_pool_serves_threads() {
    let pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();
    let shared = Arc::new(LockedAllocator::new(pool));
    assert_thread_safe(&*shared);

    let layout = Layout::from_size_align(40, 8).unwrap();
    let addrs = hammer(&shared, layout);

    let distinct: HashSet<_> = addrs.iter().copied().collect();
    assert_eq!(distinct.len(), THREADS * PER_THREAD);

    for addr in addrs {
        let ptr = NonNull::new(addr as *mut u8).unwrap();
        unsafe { shared.deallocate(ptr, layout) };
    }
    let free = shared.with(|pool| pool.stats().total_free_blocks());
    assert!(free >= THREADS * PER_THREAD);
}

#[test]
fn test_locked_chunks_serve_threads() {
    let chunks = ChunkAllocator::with_config(16, ChunkConfig::production().with_capacity(64)).unwrap();
    let shared = Arc::new(LockedAllocator::new(chunks));

    let layout = Layout::new::<[u64; 2]>();
    let addrs = hammer(&shared, layout);

    let distinct: HashSet<_> = addrs.iter().copied().collect();
    assert_eq!(distinct.len(), THREADS * PER_THREAD);
    assert_eq!(shared.lock().live_blocks(), THREADS * PER_THREAD);

    for addr in addrs {
        let ptr = NonNull::new(addr as *mut u8).unwrap();
        unsafe { shared.deallocate(ptr, layout) };
    }

    let engine = Arc::try_unwrap(shared).unwrap().into_inner();
    assert_eq!(engine.live_blocks(), 0);
    assert!(engine.chunk_count() <= (THREADS * PER_THREAD).div_ceil(64));
}

#[test]
fn test_locked_rejects_oversized_layouts() {
    let chunks = ChunkAllocator::with_config(16, ChunkConfig::production()).unwrap();
    let shared = LockedAllocator::new(chunks);

    let too_big = Layout::from_size_align(32, 8).unwrap();
    assert!(unsafe { shared.allocate(too_big) }.is_err());
}
