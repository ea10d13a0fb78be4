//! Transactions through the buffer pool: commit, abort, eviction policy
//! and deadlock handling.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{image_slot0, pid, slot0, tuple, write_slot0, Event, Fixture, TABLE, TUPLE_SIZE};
use pagelockdb::common::config::{BufferPoolConfig, EvictionPolicy};
use pagelockdb::concurrency::Permissions;
use pagelockdb::{Error, RecordId, TransactionId};

fn no_steal(capacity: usize) -> BufferPoolConfig {
    BufferPoolConfig::new(capacity)
}

fn steal(capacity: usize) -> BufferPoolConfig {
    BufferPoolConfig::new(capacity).with_eviction_policy(EvictionPolicy::Steal)
}

// ============================================================================
// Abort and commit
// ============================================================================

#[test]
fn test_abort_restores_content_and_is_idempotent() {
    let fx = Fixture::new(no_steal(4), 2);
    let tid = TransactionId::new();

    write_slot0(&fx.pool, tid, pid(1), 0xDEAD).unwrap();
    let page = fx.pool.get_page(tid, pid(1), Permissions::Shared).unwrap();
    assert_eq!(slot0(&page.read()), 0xDEAD);
    assert_eq!(page.read().is_dirty(), Some(tid));

    fx.pool.transaction_complete(tid, false).unwrap();
    fx.pool.transaction_complete(tid, false).unwrap();

    assert_eq!(slot0(&page.read()), 1);
    assert!(page.read().is_dirty().is_none());
    assert!(!fx.pool.holds_lock(tid, pid(1)));
    assert_eq!(fx.on_disk(pid(1)), 1);
    assert_eq!(fx.events.all(), vec![Event::Abort(tid)]);
}

#[test]
fn test_commit_writes_pages_and_advances_before_image() {
    let fx = Fixture::new(no_steal(4), 2);
    let tid = TransactionId::new();

    write_slot0(&fx.pool, tid, pid(0), 42).unwrap();
    fx.pool.transaction_complete(tid, true).unwrap();

    assert_eq!(fx.on_disk(pid(0)), 42);
    let reader = TransactionId::new();
    let page = fx.pool.get_page(reader, pid(0), Permissions::Shared).unwrap();
    assert_eq!(image_slot0(page.read().before_image()), 42);

    // Log record, force, data, then the commit record and its force
    assert_eq!(
        fx.events.all(),
        vec![
            Event::LogWrite(tid, pid(0)),
            Event::Force,
            Event::PageWrite(pid(0)),
            Event::Commit(tid),
            Event::Force,
        ]
    );
}

#[test]
fn test_commit_then_later_abort_keeps_committed_value() {
    let fx = Fixture::new(no_steal(4), 1);

    let t1 = TransactionId::new();
    write_slot0(&fx.pool, t1, pid(0), 10).unwrap();
    fx.pool.transaction_complete(t1, true).unwrap();

    let t2 = TransactionId::new();
    write_slot0(&fx.pool, t2, pid(0), 20).unwrap();
    fx.pool.transaction_complete(t2, false).unwrap();

    let t3 = TransactionId::new();
    let page = fx.pool.get_page(t3, pid(0), Permissions::Shared).unwrap();
    assert_eq!(slot0(&page.read()), 10);
}

#[test]
fn test_inserted_tuples_visible_after_commit_gone_after_abort() {
    let fx = Fixture::new(no_steal(8), 1);

    let t1 = TransactionId::new();
    for v in 100..105 {
        fx.pool.insert_tuple(t1, TABLE, &tuple(v)).unwrap();
    }
    fx.pool.transaction_complete(t1, true).unwrap();
    assert_eq!(fx.scan().len(), 6);

    let t2 = TransactionId::new();
    fx.pool.insert_tuple(t2, TABLE, &tuple(999)).unwrap();
    fx.pool.delete_tuple(t2, RecordId::new(pid(0), 0)).unwrap();
    fx.pool.transaction_complete(t2, false).unwrap();

    let values: Vec<Vec<u8>> = fx.scan().into_iter().map(|(_, t)| t).collect();
    assert_eq!(values.len(), 6);
    assert!(values.contains(&tuple(0).to_vec()));
    assert!(!values.contains(&tuple(999).to_vec()));
}

#[test]
fn test_insert_appends_page_when_table_full() {
    let fx = Fixture::new(no_steal(8), 0);
    let tid = TransactionId::new();
    let per_page = fx.file.slots_per_page() as u64;

    for v in 0..per_page + 1 {
        fx.pool.insert_tuple(tid, TABLE, &tuple(v)).unwrap();
    }
    fx.pool.transaction_complete(tid, true).unwrap();

    assert_eq!(fx.file.file_size(), 2 * pagelockdb::PAGE_SIZE as u64);
    let tuples = fx.scan();
    assert_eq!(tuples.len() as u64, per_page + 1);
    assert_eq!(tuples.last().unwrap().0, RecordId::new(pid(1), 0));
}

#[test]
fn test_update_missing_record_fails() {
    let fx = Fixture::new(no_steal(4), 1);
    let tid = TransactionId::new();

    let result = fx.pool.update_tuple(tid, RecordId::new(pid(0), 3), &tuple(1));
    assert!(matches!(result, Err(Error::RecordNotFound(_))));
    let result = fx.pool.update_tuple(tid, RecordId::new(pid(0), 0), b"short");
    assert!(matches!(result, Err(Error::TupleSizeMismatch { .. })));
}

// ============================================================================
// Eviction policy
// ============================================================================

#[test]
fn test_no_steal_exhausted_when_all_pages_dirty() {
    let fx = Fixture::new(no_steal(1), 2);
    let tid = TransactionId::new();
    write_slot0(&fx.pool, tid, pid(0), 7).unwrap();

    let result = fx.pool.get_page(tid, pid(1), Permissions::Shared);
    assert!(matches!(result, Err(Error::BufferPoolExhausted)));
    assert_eq!(
        result.unwrap_err().to_string(),
        "all buffer pool slots contain dirty pages; COMMIT or ROLLBACK to continue"
    );

    // Nothing uncommitted reached the store
    assert_eq!(fx.on_disk(pid(0)), 0);
    assert!(!fx.events.all().contains(&Event::PageWrite(pid(0))));
}

#[test]
fn test_no_steal_evicts_clean_page() {
    let fx = Fixture::new(no_steal(2), 3);
    let tid = TransactionId::new();
    write_slot0(&fx.pool, tid, pid(0), 7).unwrap();

    fx.pool.get_page(tid, pid(1), Permissions::Shared).unwrap();
    fx.pool.get_page(tid, pid(2), Permissions::Shared).unwrap();

    assert!(fx.pool.is_resident(pid(0)));
    assert!(!fx.pool.is_resident(pid(1)));
    assert_eq!(fx.pool.resident_count(), 2);
}

#[test]
fn test_steal_flushes_with_log_first() {
    let fx = Fixture::new(steal(1), 2);
    let tid = TransactionId::new();
    write_slot0(&fx.pool, tid, pid(0), 55).unwrap();

    fx.pool.get_page(tid, pid(1), Permissions::Shared).unwrap();

    assert!(!fx.pool.is_resident(pid(0)));
    assert_eq!(fx.on_disk(pid(0)), 55);
    fx.events.assert_log_before_data();
}

#[test]
fn test_steal_abort_restores_stolen_page_on_disk() {
    let fx = Fixture::new(steal(1), 2);
    let tid = TransactionId::new();
    write_slot0(&fx.pool, tid, pid(0), 55).unwrap();
    fx.pool.get_page(tid, pid(1), Permissions::Shared).unwrap();
    assert_eq!(fx.on_disk(pid(0)), 55);

    fx.pool.transaction_complete(tid, false).unwrap();
    assert_eq!(fx.on_disk(pid(0)), 0);

    let reader = TransactionId::new();
    let page = fx.pool.get_page(reader, pid(0), Permissions::Shared).unwrap();
    assert_eq!(slot0(&page.read()), 0);
}

#[test]
fn test_steal_abort_after_stolen_page_reloaded() {
    let fx = Fixture::new(steal(1), 2);
    let tid = TransactionId::new();
    write_slot0(&fx.pool, tid, pid(0), 55).unwrap();
    fx.pool.get_page(tid, pid(1), Permissions::Shared).unwrap();

    // Reloaded copy carries the uncommitted value and a matching before-image
    write_slot0(&fx.pool, tid, pid(0), 56).unwrap();
    fx.pool.transaction_complete(tid, false).unwrap();

    assert_eq!(fx.on_disk(pid(0)), 0);
    let reader = TransactionId::new();
    let page = fx.pool.get_page(reader, pid(0), Permissions::Shared).unwrap();
    assert_eq!(slot0(&page.read()), 0);
}

#[test]
fn test_steal_commit_logs_without_writing_pages() {
    let fx = Fixture::new(steal(4), 1);
    let tid = TransactionId::new();
    write_slot0(&fx.pool, tid, pid(0), 77).unwrap();
    fx.pool.transaction_complete(tid, true).unwrap();

    assert_eq!(
        fx.events.all(),
        vec![
            Event::LogWrite(tid, pid(0)),
            Event::Force,
            Event::Commit(tid),
            Event::Force,
        ]
    );
    assert_eq!(fx.on_disk(pid(0)), 0);

    fx.pool.flush_all_pages().unwrap();
    assert_eq!(fx.on_disk(pid(0)), 77);
    fx.events.assert_log_before_data();
}

#[test]
fn test_steal_abort_keeps_unflushed_commit() {
    let fx = Fixture::new(steal(1), 2);
    let committed = TransactionId::new();
    write_slot0(&fx.pool, committed, pid(0), 80).unwrap();
    fx.pool.transaction_complete(committed, true).unwrap();

    let aborted = TransactionId::new();
    write_slot0(&fx.pool, aborted, pid(0), 81).unwrap();
    fx.pool.transaction_complete(aborted, false).unwrap();

    // Evicting page 0 must still write the committed value
    let reader = TransactionId::new();
    fx.pool.get_page(reader, pid(1), Permissions::Shared).unwrap();
    assert!(!fx.pool.is_resident(pid(0)));
    assert_eq!(fx.on_disk(pid(0)), 80);
    fx.events.assert_log_before_data();
}

#[test]
fn test_steal_never_writes_bytes_changed_through_handle() {
    let fx = Fixture::new(steal(1), 2);
    let tid = TransactionId::new();
    let page = fx.pool.get_page(tid, pid(0), Permissions::Exclusive).unwrap();
    page.write().as_mut_slice()[1..=TUPLE_SIZE].copy_from_slice(&tuple(999));
    drop(page);

    // Loading page 1 evicts page 0, which was never marked dirty
    fx.pool.get_page(tid, pid(1), Permissions::Shared).unwrap();
    assert_eq!(fx.on_disk(pid(0)), 0);

    fx.pool.transaction_complete(tid, false).unwrap();
    assert_eq!(fx.on_disk(pid(0)), 0);
    assert!(!fx
        .events
        .all()
        .iter()
        .any(|e| matches!(e, Event::PageWrite(_))));
}

#[test]
fn test_abort_rolls_back_bytes_changed_through_handle() {
    let fx = Fixture::new(steal(2), 1);
    let tid = TransactionId::new();
    let page = fx.pool.get_page(tid, pid(0), Permissions::Exclusive).unwrap();
    page.write().as_mut_slice()[1..=TUPLE_SIZE].copy_from_slice(&tuple(999));

    fx.pool.transaction_complete(tid, false).unwrap();
    assert_eq!(slot0(&page.read()), 0);
    assert!(page.read().is_dirty().is_none());
    assert_eq!(fx.on_disk(pid(0)), 0);
}

#[test]
fn test_flush_pages_only_touches_own_pages() {
    let fx = Fixture::new(no_steal(4), 2);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());
    write_slot0(&fx.pool, t1, pid(0), 1000).unwrap();
    write_slot0(&fx.pool, t2, pid(1), 2000).unwrap();

    fx.pool.flush_pages(t1).unwrap();
    assert_eq!(fx.on_disk(pid(0)), 1000);
    assert_eq!(fx.on_disk(pid(1)), 1);
    fx.events.assert_log_before_data();
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_deadlock_through_pool_aborts_exactly_one() {
    let fx = Fixture::new(no_steal(4), 2);
    let barrier = Arc::new(Barrier::new(2));

    let plans = [(pid(0), pid(1), 100u64), (pid(1), pid(0), 200u64)];
    let handles: Vec<_> = plans
        .into_iter()
        .map(|(first, second, base)| {
            let pool = Arc::clone(&fx.pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let tid = TransactionId::new();
                write_slot0(&pool, tid, first, base).unwrap();
                barrier.wait();
                match write_slot0(&pool, tid, second, base + 1) {
                    Ok(()) => {
                        pool.transaction_complete(tid, true).unwrap();
                        Some(base)
                    }
                    Err(err) => {
                        assert!(matches!(err, Error::TransactionAborted(t) if t == tid));
                        // Already rolled back; completing again is harmless
                        pool.transaction_complete(tid, false).unwrap();
                        None
                    }
                }
            })
        })
        .collect();

    let outcomes: Vec<Option<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<u64> = outcomes.iter().flatten().copied().collect();
    assert_eq!(winners.len(), 1, "outcomes: {:?}", outcomes);

    let (first, second) = if winners[0] == 100 {
        (pid(0), pid(1))
    } else {
        (pid(1), pid(0))
    };
    assert_eq!(fx.on_disk(first), winners[0]);
    assert_eq!(fx.on_disk(second), winners[0] + 1);
    assert_eq!(fx.pool.stats().snapshot().aborts, 1);
    assert_eq!(fx.pool.lock_manager().stats().snapshot().deadlocks, 1);
}

#[test]
fn test_capacity_bound_under_concurrent_readers() {
    let fx = Fixture::new(no_steal(4), 16);

    let handles: Vec<_> = (0..8u32)
        .map(|seed| {
            let pool = Arc::clone(&fx.pool);
            thread::spawn(move || {
                let tid = TransactionId::new();
                for k in 0..40u32 {
                    let page_id = pid((seed * 7 + k * 3) % 16);
                    let page = pool.get_page(tid, page_id, Permissions::Shared).unwrap();
                    assert_eq!(slot0(&page.read()), page_id.page_no as u64);
                    assert!(pool.resident_count() <= 4);
                }
                pool.transaction_complete(tid, true).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(fx.pool.resident_count() <= 4);
    assert!(fx.pool.stats().snapshot().evictions > 0);
}

#[test]
fn test_concurrent_writers_on_distinct_pages() {
    let fx = Fixture::new(no_steal(8), 4);

    let handles: Vec<_> = (0..4u32)
        .map(|n| {
            let pool = Arc::clone(&fx.pool);
            thread::spawn(move || {
                for round in 0..10u64 {
                    let tid = TransactionId::new();
                    write_slot0(&pool, tid, pid(n), round * 10 + n as u64).unwrap();
                    pool.transaction_complete(tid, round % 2 == 0).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    // Round 8 is the last committed one
    for n in 0..4u32 {
        assert_eq!(fx.on_disk(pid(n)), 80 + n as u64);
    }
    fx.events.assert_log_before_data();
}

#[test]
fn test_exclusive_writer_blocks_reader_until_commit() {
    let fx = Fixture::new(no_steal(4), 1);
    let writer = TransactionId::new();
    write_slot0(&fx.pool, writer, pid(0), 5).unwrap();

    let pool = Arc::clone(&fx.pool);
    let reader = thread::spawn(move || {
        let tid = TransactionId::new();
        let page = pool.get_page(tid, pid(0), Permissions::Shared).unwrap();
        let value = slot0(&page.read());
        pool.transaction_complete(tid, true).unwrap();
        value
    });

    common::wait_for_waiters(&fx.pool, 1);
    assert!(!reader.is_finished());
    fx.pool.transaction_complete(writer, true).unwrap();
    assert_eq!(reader.join().unwrap(), 5);
}
