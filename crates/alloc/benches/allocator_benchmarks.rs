//! Allocator benchmarks
//!
//! Pool and chunk engines against the system allocator for small node churn

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nebula_alloc::chunk::ChunkAllocator;
use nebula_alloc::pool::PoolAllocator;
use std::alloc::Layout;
use std::hint::black_box;

const NODE_SIZES: [usize; 2] = [16, 24];

/// Single allocate/free cycle
fn bench_single_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_allocation");

    for size in NODE_SIZES {
        group.bench_with_input(BenchmarkId::new("pool", size), &size, |b, &size| {
            let mut pool = PoolAllocator::production();
            b.iter(|| unsafe {
                let ptr = pool.allocate(size).unwrap();
                pool.deallocate(ptr, size);
                black_box(ptr);
            });
        });

        group.bench_with_input(BenchmarkId::new("chunk", size), &size, |b, &size| {
            let mut chunks = ChunkAllocator::new(size, 255).unwrap();
            b.iter(|| unsafe {
                let ptr = chunks.allocate().unwrap();
                chunks.deallocate(ptr);
                black_box(ptr);
            });
        });

        // Baseline
        group.bench_with_input(BenchmarkId::new("system", size), &size, |b, &size| {
            let layout = Layout::from_size_align(size, 8).unwrap();
            b.iter(|| unsafe {
                let ptr = std::alloc::alloc(layout);
                std::alloc::dealloc(ptr, layout);
                black_box(ptr);
            });
        });
    }

    group.finish();
}

/// Build a batch of nodes, then free them all
fn bench_batch_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_churn");

    for count in [100usize, 1000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("pool_24b", count), &count, |b, &count| {
            let mut pool = PoolAllocator::production();
            let mut ptrs = Vec::with_capacity(count);
            b.iter(|| unsafe {
                for _ in 0..count {
                    ptrs.push(pool.allocate(24).unwrap());
                }
                for ptr in ptrs.drain(..) {
                    pool.deallocate(black_box(ptr), 24);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("chunk_24b", count), &count, |b, &count| {
            let mut chunks = ChunkAllocator::new(24, 255).unwrap();
            let mut ptrs = Vec::with_capacity(count);
            b.iter(|| unsafe {
                for _ in 0..count {
                    ptrs.push(chunks.allocate().unwrap());
                }
                for ptr in ptrs.drain(..).rev() {
                    chunks.deallocate(black_box(ptr));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("system_24b", count), &count, |b, &count| {
            let layout = Layout::from_size_align(24, 8).unwrap();
            let mut ptrs = Vec::with_capacity(count);
            b.iter(|| unsafe {
                for _ in 0..count {
                    ptrs.push(std::alloc::alloc(layout));
                }
                for ptr in ptrs.drain(..) {
                    std::alloc::dealloc(black_box(ptr), layout);
                }
            });
        });
    }

    group.finish();
}

/// Interleaved frees keep the chunk hints moving
fn bench_interleaved(c: &mut Criterion) {
    let mut group = c.benchmark_group("interleaved");

    group.bench_function("pool_16b", |b| {
        let mut pool = PoolAllocator::production();
        let mut live = Vec::with_capacity(512);
        b.iter(|| unsafe {
            for i in 0..1024usize {
                if i % 3 == 2 && !live.is_empty() {
                    let ptr = live.swap_remove(i % live.len());
                    pool.deallocate(ptr, 16);
                } else {
                    live.push(pool.allocate(16).unwrap());
                }
            }
            for ptr in live.drain(..) {
                pool.deallocate(ptr, 16);
            }
        });
    });

    group.bench_function("chunk_16b", |b| {
        let mut chunks = ChunkAllocator::new(16, 64).unwrap();
        let mut live = Vec::with_capacity(512);
        b.iter(|| unsafe {
            for i in 0..1024usize {
                if i % 3 == 2 && !live.is_empty() {
                    let ptr = live.swap_remove(i % live.len());
                    chunks.deallocate(ptr);
                } else {
                    live.push(chunks.allocate().unwrap());
                }
            }
            for ptr in live.drain(..) {
                chunks.deallocate(ptr);
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_allocation,
    bench_batch_churn,
    bench_interleaved
);
criterion_main!(benches);
