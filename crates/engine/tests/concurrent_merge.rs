//! Concurrent/multi-threaded tests for lodestone-engine
//!
//! These tests verify correct behavior under actual concurrent execution:
//!
//! 1. **Mutual exclusion** - concurrent increments on one key never lose an
//!    update
//! 2. **No duplicate-insert races** - concurrent merges on absent keys
//!    create exactly one row and surface zero errors
//! 3. **Lock release on failure** - a failed transform never wedges its key
//! 4. **Contention across a small key set** - heavy racing on a few keys
//!    stays correct
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrent_merge
//! ```

use std::sync::{Arc, Barrier};
use std::thread;

use lodestone_core::{Ident, Record};
use lodestone_engine::Engine;
use lodestone_storage::MemoryStore;
use serde::{Deserialize, Serialize};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ledger {
    id: u64,
    balance: i64,
}

impl Record for Ledger {
    const TYPE: &'static str = "Ledger";
    type Id = u64;

    fn id(&self) -> &u64 {
        &self.id
    }

    fn new_with_id(id: u64) -> Self {
        Ledger { id, balance: 0 }
    }
}

fn shared_engine() -> Arc<Engine<MemoryStore>> {
    Arc::new(Engine::new(MemoryStore::new("contention_db")))
}

/// Run `per_thread` merges on each of `threads` threads, all released
/// through one barrier so they actually race.
fn race<F>(threads: usize, engine: &Arc<Engine<MemoryStore>>, body: F)
where
    F: Fn(&Engine<MemoryStore>, usize) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|thread_idx| {
            let engine = Arc::clone(engine);
            let barrier = Arc::clone(&barrier);
            let body = Arc::clone(&body);
            thread::spawn(move || {
                barrier.wait();
                body(&engine, thread_idx);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

// ============================================================================
// SECTION 1: Mutual Exclusion
// ============================================================================

/// N concurrent increments of 1 on a zero-initialized ledger must sum to N:
/// the per-key lock serializes the whole read-modify-write.
#[test]
fn test_concurrent_increments_lose_no_updates() {
    const THREADS: usize = 8;
    const INCREMENTS_PER_THREAD: usize = 1_250;

    let engine = shared_engine();
    let key = Ident::<Ledger>::new(1);

    race(THREADS, &engine, |engine, _| {
        for _ in 0..INCREMENTS_PER_THREAD {
            engine
                .find_apply_and_merge(&Ident::<Ledger>::new(1), |mut r: Ledger| {
                    r.balance += 1;
                    Ok(r)
                })
                .unwrap();
        }
    });

    let final_row = engine.get(&key).unwrap().unwrap();
    assert_eq!(final_row.balance, (THREADS * INCREMENTS_PER_THREAD) as i64);
}

/// Increments on distinct keys proceed independently and each key ends at
/// its own thread's total.
#[test]
fn test_concurrent_increments_different_keys_independent() {
    const THREADS: usize = 8;
    const INCREMENTS_PER_THREAD: usize = 500;

    let engine = shared_engine();

    race(THREADS, &engine, |engine, thread_idx| {
        let id = thread_idx as u64;
        for _ in 0..INCREMENTS_PER_THREAD {
            engine
                .find_apply_and_merge(&Ident::<Ledger>::new(id), |mut r: Ledger| {
                    r.balance += 1;
                    Ok(r)
                })
                .unwrap();
        }
    });

    for id in 0..THREADS as u64 {
        let row = engine.get(&Ident::<Ledger>::new(id)).unwrap().unwrap();
        assert_eq!(row.balance, INCREMENTS_PER_THREAD as i64);
    }
}

// ============================================================================
// SECTION 2: No Duplicate-Insert Races
// ============================================================================

/// Concurrent merges on a key that does not exist yet must produce exactly
/// one created row and zero errors surfaced to any caller.
#[test]
fn test_concurrent_merges_on_absent_key_create_one_row() {
    const THREADS: usize = 16;

    let engine = shared_engine();

    race(THREADS, &engine, |engine, _| {
        engine
            .find_apply_and_merge(&Ident::<Ledger>::new(77), |mut r: Ledger| {
                r.balance += 1;
                Ok(r)
            })
            .unwrap();
    });

    assert_eq!(engine.store().row_count::<Ledger>(), 1);
    let row = engine.get(&Ident::<Ledger>::new(77)).unwrap().unwrap();
    assert_eq!(row.balance, THREADS as i64);
}

/// Heavy racing with ids drawn from a small fixed set, so most calls
/// contend on the same few keys (and stripes). Zero errors, exact totals.
#[test]
fn test_contention_on_small_key_set() {
    const THREADS: usize = 8;
    const MERGES_PER_THREAD: usize = 1_250;
    const KEYS: u64 = 5;

    let engine = shared_engine();

    race(THREADS, &engine, |engine, thread_idx| {
        for i in 0..MERGES_PER_THREAD {
            let id = ((thread_idx + i) as u64) % KEYS;
            engine
                .find_apply_and_merge(&Ident::<Ledger>::new(id), |mut r: Ledger| {
                    r.balance += 1;
                    Ok(r)
                })
                .unwrap();
        }
    });

    assert_eq!(engine.store().row_count::<Ledger>(), KEYS as usize);
    let total: i64 = (0..KEYS)
        .map(|id| engine.get(&Ident::<Ledger>::new(id)).unwrap().unwrap().balance)
        .sum();
    assert_eq!(total, (THREADS * MERGES_PER_THREAD) as i64);
}

/// Concurrent get_or_create on one absent key: every caller sees the same
/// default record and only one row is ever persisted.
#[test]
fn test_concurrent_get_or_create_single_row() {
    const THREADS: usize = 16;

    let engine = shared_engine();

    race(THREADS, &engine, |engine, _| {
        let row = engine.get_or_create(&Ident::<Ledger>::new(5)).unwrap();
        assert_eq!(row.id, 5);
        assert_eq!(row.balance, 0);
    });

    assert_eq!(engine.store().row_count::<Ledger>(), 1);
}

// ============================================================================
// SECTION 3: Lock Release on Failure
// ============================================================================

/// Threads alternating failing and succeeding transforms on the same key:
/// failures never wedge the key, and the successful increments all land.
#[test]
fn test_failing_transforms_never_wedge_the_key() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let engine = shared_engine();

    race(THREADS, &engine, |engine, thread_idx| {
        for round in 0..ROUNDS {
            let key = Ident::<Ledger>::new(13);
            if (thread_idx + round) % 2 == 0 {
                let err = engine
                    .find_apply_and_merge(&key, |_r: Ledger| Err("injected".into()))
                    .unwrap_err();
                assert!(err.to_string().contains("injected"));
            } else {
                engine
                    .find_apply_and_merge(&key, |mut r: Ledger| {
                        r.balance += 1;
                        Ok(r)
                    })
                    .unwrap();
            }
        }
    });

    let row = engine.get(&Ident::<Ledger>::new(13)).unwrap().unwrap();
    assert_eq!(row.balance, (THREADS * ROUNDS / 2) as i64);
}

// ============================================================================
// SECTION 4: Mixed Merge and Delete
// ============================================================================

/// Merges racing deletes on one key must never error and must leave the
/// store consistent: either the row is absent or it carries a value some
/// merge wrote after the last delete.
#[test]
fn test_merges_racing_deletes_stay_consistent() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 300;

    let engine = shared_engine();

    race(THREADS, &engine, |engine, thread_idx| {
        let key = Ident::<Ledger>::new(21);
        for _ in 0..ROUNDS {
            if thread_idx % 4 == 0 {
                engine.delete_by_id(&key).unwrap();
            } else {
                engine
                    .find_apply_and_merge(&key, |mut r: Ledger| {
                        r.balance += 1;
                        Ok(r)
                    })
                    .unwrap();
            }
        }
    });

    // Consistency, not a specific value: at most one row, and if present
    // its balance reflects whole increments since the last delete.
    assert!(engine.store().row_count::<Ledger>() <= 1);
    if let Some(row) = engine.get(&Ident::<Ledger>::new(21)).unwrap() {
        assert!(row.balance >= 1);
        assert!(row.balance <= (THREADS * ROUNDS) as i64);
    }
}
