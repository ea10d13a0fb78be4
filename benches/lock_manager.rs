//! Criterion micro-benchmarks for the lock manager and the page cache.
//!
//! Benchmarks:
//! - Uncontended shared / exclusive acquire + release_all
//! - Cache hit through `BufferPool::get_page`

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pagelockdb::common::config::BufferPoolConfig;
use pagelockdb::concurrency::{LockManager, Permissions};
use pagelockdb::recovery::NullLogManager;
use pagelockdb::storage::{HeapFile, TableRegistry};
use pagelockdb::{BufferPool, PageId, TableId, TransactionId};

fn page(n: u32) -> PageId {
    PageId::new(TableId::new(1), n)
}

fn bench_uncontended_locks(c: &mut Criterion) {
    let lm = LockManager::new(Duration::from_millis(1));
    let mut group = c.benchmark_group("lock_manager");

    for pages in [1u32, 16, 256] {
        group.throughput(Throughput::Elements(pages as u64));
        for perm in [Permissions::Shared, Permissions::Exclusive] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", perm), pages),
                &pages,
                |b, &pages| {
                    b.iter(|| {
                        let tid = TransactionId::new();
                        for n in 0..pages {
                            lm.acquire_lock(tid, page(n), perm).unwrap();
                        }
                        black_box(lm.release_all(tid));
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let file = Arc::new(HeapFile::create(dir.path().join("bench.tbl"), TableId::new(1), 16).unwrap());
    for _ in 0..8 {
        file.allocate_page().unwrap();
    }
    let registry = Arc::new(TableRegistry::new());
    registry.register(file);
    let pool = BufferPool::new(BufferPoolConfig::new(8), registry, Arc::new(NullLogManager));

    // Warm the cache
    let warm = TransactionId::new();
    for n in 0..8 {
        pool.get_page(warm, page(n), Permissions::Shared).unwrap();
    }
    pool.transaction_complete(warm, true).unwrap();

    c.bench_function("buffer_pool/get_page_hit", |b| {
        b.iter(|| {
            let tid = TransactionId::new();
            for n in 0..8 {
                black_box(pool.get_page(tid, page(n), Permissions::Shared).unwrap());
            }
            pool.release_all_locks(tid, true).unwrap();
        });
    });
}

criterion_group!(benches, bench_uncontended_locks, bench_cache_hit);
criterion_main!(benches);
