// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The accumulator cache: per-file buffers of pending update tokens.
//!
//! One mutex protects the whole map and every entry in it. An entry
//! buffers update tokens in arrival order (which insertion enforces to be
//! timestamp order), tracks the age of its oldest buffered token, and
//! carries a queued flag that mirrors the file's presence in the dispatch
//! queue.
//!
//! Entry life cycle:
//!
//! ```text
//! (empty, unqueued)   --insert-->        (buffered, unqueued)
//! (buffered, unqueued) --age crossing--> (buffered, queued)
//! (buffered, queued)  --writer steal-->  (empty, unqueued)
//! (empty, unqueued)   --sweep, aged-->   removed
//! ```
//!
//! Lock order: whenever both the cache mutex and the queue mutex are
//! held, the cache mutex is acquired first. Every enqueue in this module
//! happens while the cache mutex is held.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

use rrdsink_core::error::{CacheError, CacheResult};

use crate::queue::{DispatchQueue, InsertPosition};
use crate::stats::SinkStatsInner;

// =============================================================================
// Cache Entry
// =============================================================================

/// Pending state for one target file.
#[derive(Debug, Default)]
struct CacheEntry {
    /// Buffered update tokens, oldest first.
    values: Vec<String>,

    /// Timestamp of `values[0]`; stale while `values` is empty.
    first_value: i64,

    /// Newest accepted timestamp; zero before any insertion. Survives a
    /// steal so monotonicity holds across batches.
    last_value: i64,

    /// Mirrors the file's presence in the dispatch queue.
    queued: bool,
}

/// Outcome of the append step, resolved after the entry borrow ends.
enum AppendOutcome {
    Appended,
    OutOfOrder { last_value: i64 },
    NoMemory,
}

#[derive(Debug)]
struct CacheState {
    entries: BTreeMap<String, CacheEntry>,

    /// When the in-line sweep last ran, in unix seconds.
    flush_last: i64,
}

/// Hands a file to the dispatch queue and flags its entry, in that order.
///
/// Every queue insertion driven by cache state goes through here, with
/// the cache mutex held; the queue mutex is taken (and released) inside
/// the enqueue. This is the only place the flag is set.
fn mark_queued(
    entry: &mut CacheEntry,
    queue: &DispatchQueue,
    filename: &str,
    position: InsertPosition,
) {
    queue.enqueue(filename, position);
    entry.queued = true;
}

// =============================================================================
// Accumulator Cache
// =============================================================================

/// The write-coalescing cache.
///
/// Holds the per-file buffers behind a single mutex and decides, on every
/// insertion, whether the target file must be handed to the dispatch
/// queue. Destroyed by the writer thread on shutdown; a destroyed cache
/// rejects insertions and treats flushes as successful no-ops.
#[derive(Debug)]
pub struct AccumulatorCache {
    state: Mutex<Option<CacheState>>,

    /// Age at which a buffered entry is enqueued, in seconds. Zero means
    /// coalescing is disabled and every insertion enqueues immediately.
    cache_timeout: i64,

    /// Period of the in-line sweep, in seconds. Zero disables it.
    cache_flush_timeout: i64,
}

impl AccumulatorCache {
    /// Creates an empty cache with the given (already normalized)
    /// timeouts; `now` seeds the sweep clock.
    pub fn new(cache_timeout: u64, cache_flush_timeout: u64, now: i64) -> Self {
        Self {
            state: Mutex::new(Some(CacheState {
                entries: BTreeMap::new(),
                flush_last: now,
            })),
            cache_timeout: cache_timeout as i64,
            cache_flush_timeout: cache_flush_timeout as i64,
        }
    }

    /// Buffers one update token for `filename`.
    ///
    /// Rejects the sample if `time` does not strictly exceed the entry's
    /// newest accepted timestamp. When the buffered span reaches the
    /// cache timeout and the file is not already queued, the filename is
    /// enqueued at the back of the dispatch queue. May run the in-line
    /// sweep before releasing the cache mutex.
    pub fn insert(
        &self,
        queue: &DispatchQueue,
        filename: &str,
        token: String,
        time: i64,
        now: i64,
        stats: &SinkStatsInner,
    ) -> CacheResult<()> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(CacheError::Unavailable)?;

        let new_entry = !state.entries.contains_key(filename);

        let outcome = {
            let entry = state.entries.entry(filename.to_string()).or_default();

            if entry.last_value >= time {
                AppendOutcome::OutOfOrder {
                    last_value: entry.last_value,
                }
            } else if entry.values.try_reserve(1).is_err() {
                AppendOutcome::NoMemory
            } else {
                entry.values.push(token);
                if entry.values.len() == 1 {
                    entry.first_value = time;
                }
                entry.last_value = time;

                let age = entry.last_value - entry.first_value;
                debug!(filename, pending = entry.values.len(), age, "Buffered update token");

                if age >= self.cache_timeout && !entry.queued {
                    mark_queued(entry, queue, filename, InsertPosition::Back);
                }
                AppendOutcome::Appended
            }
        };

        match outcome {
            AppendOutcome::Appended => {
                stats.record_insert(new_entry);

                if self.cache_timeout > 0 && (now - state.flush_last) > self.cache_flush_timeout {
                    self.sweep_locked(state, queue, self.cache_flush_timeout, now, stats);
                }
                Ok(())
            }
            AppendOutcome::OutOfOrder { last_value } => {
                if new_entry {
                    state.entries.remove(filename);
                }
                stats.record_rejected();
                warn!(
                    filename,
                    last_value,
                    sample_time = time,
                    "Dropping out-of-order sample"
                );
                Err(CacheError::out_of_order(filename, last_value, time))
            }
            AppendOutcome::NoMemory => {
                state.entries.remove(filename);
                error!(filename, "Failed to reserve memory for update token; entry dropped");
                Err(CacheError::alloc_failed(filename))
            }
        }
    }

    /// Sweeps the cache: enqueues every unqueued entry at least
    /// `age_threshold` seconds old and removes aged-out empty entries.
    ///
    /// An `age_threshold` of `-1` queues every non-empty unqueued entry
    /// regardless of age (the shutdown drain). A destroyed cache is a
    /// successful no-op.
    pub fn sweep(
        &self,
        queue: &DispatchQueue,
        age_threshold: i64,
        now: i64,
        stats: &SinkStatsInner,
    ) {
        let mut guard = self.state.lock();
        if let Some(state) = guard.as_mut() {
            self.sweep_locked(state, queue, age_threshold, now, stats);
        }
    }

    /// Sweep body; assumes the cache mutex is held.
    fn sweep_locked(
        &self,
        state: &mut CacheState,
        queue: &DispatchQueue,
        age_threshold: i64,
        now: i64,
        stats: &SinkStatsInner,
    ) {
        debug!(age_threshold, entries = state.entries.len(), "Sweeping accumulator cache");

        let mut dead: Vec<String> = Vec::new();
        for (filename, entry) in state.entries.iter_mut() {
            if entry.queued {
                continue;
            }
            if (now - entry.first_value) < age_threshold {
                continue;
            }
            if !entry.values.is_empty() {
                mark_queued(entry, queue, filename, InsertPosition::Back);
            } else {
                // Ancient and empty: a silent file wasting memory.
                dead.push(filename.clone());
            }
        }

        if !dead.is_empty() {
            for filename in &dead {
                state.entries.remove(filename);
                debug!(filename = filename.as_str(), "Removed idle cache entry");
            }
            stats.record_evicted(dead.len() as u64);
        }

        state.flush_last = now;
    }

    /// Targeted flush of one file by its full cache key.
    ///
    /// An already-queued file is promoted to the queue head; an entry
    /// younger than `age_threshold` is left alone; anything else with
    /// buffered tokens is enqueued at the front. A destroyed cache is a
    /// successful no-op; an unknown key is an error.
    pub fn flush_identifier(
        &self,
        queue: &DispatchQueue,
        age_threshold: i64,
        key: &str,
        now: i64,
    ) -> CacheResult<()> {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return Ok(());
        };

        let Some(entry) = state.entries.get_mut(key) else {
            warn!(key, "Targeted flush for a file the cache has never seen");
            return Err(CacheError::not_found(key));
        };

        if entry.queued {
            queue.promote(key);
        } else if (now - entry.first_value) < age_threshold {
            // Young enough to keep coalescing.
        } else if !entry.values.is_empty() {
            mark_queued(entry, queue, key, InsertPosition::Front);
        }
        Ok(())
    }

    /// Atomically takes ownership of a file's buffered tokens and clears
    /// its queued flag. The entry itself is retained so `last_value`
    /// keeps enforcing monotonicity across batches.
    ///
    /// Called only by the writer. Returns `None` if the cache is
    /// destroyed or the entry is missing.
    pub fn steal(&self, filename: &str) -> Option<Vec<String>> {
        let mut guard = self.state.lock();
        let state = guard.as_mut()?;
        let entry = state.entries.get_mut(filename)?;
        entry.queued = false;
        Some(std::mem::take(&mut entry.values))
    }

    /// Drops the whole cache. Called by the writer on exit; afterwards
    /// insertions fail and flushes succeed vacuously. Returns the number
    /// of entries discarded.
    pub fn destroy(&self) -> usize {
        let mut guard = self.state.lock();
        match guard.take() {
            Some(state) => state.entries.len(),
            None => 0,
        }
    }

    /// Returns `true` once [`AccumulatorCache::destroy`] has run.
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().is_none()
    }

    /// Number of live entries; zero after destruction.
    pub fn entry_count(&self) -> usize {
        self.state
            .lock()
            .as_ref()
            .map_or(0, |state| state.entries.len())
    }

    /// Number of buffered tokens for `filename`, if present.
    pub fn pending(&self, filename: &str) -> Option<usize> {
        self.state
            .lock()
            .as_ref()
            .and_then(|state| state.entries.get(filename).map(|e| e.values.len()))
    }

    /// Whether `filename` is currently flagged as queued, if present.
    pub fn is_queued(&self, filename: &str) -> Option<bool> {
        self.state
            .lock()
            .as_ref()
            .and_then(|state| state.entries.get(filename).map(|e| e.queued))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn harness(cache_timeout: u64, cache_flush: u64) -> (AccumulatorCache, DispatchQueue, SinkStatsInner) {
        (
            AccumulatorCache::new(cache_timeout, cache_flush, 100),
            DispatchQueue::new(),
            SinkStatsInner::new(),
        )
    }

    fn token(t: i64, v: u64) -> String {
        format!("{}:{}", t, v)
    }

    #[test]
    fn test_insert_creates_entry() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "a.rrd", token(100, 1), 100, 100, &stats)
            .unwrap();

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.pending("a.rrd"), Some(1));
        assert_eq!(cache.is_queued("a.rrd"), Some(false));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_insert_rejects_out_of_order() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "a.rrd", token(100, 1), 100, 100, &stats)
            .unwrap();

        let err = cache
            .insert(&queue, "a.rrd", token(99, 2), 99, 100, &stats)
            .unwrap_err();
        assert!(matches!(err, CacheError::OutOfOrder { .. }));

        // Equal timestamps are rejected too.
        let err = cache
            .insert(&queue, "a.rrd", token(100, 3), 100, 100, &stats)
            .unwrap_err();
        assert!(matches!(err, CacheError::OutOfOrder { .. }));

        // Cache unchanged by the rejections.
        assert_eq!(cache.pending("a.rrd"), Some(1));
        assert_eq!(stats.snapshot().samples_rejected, 2);
    }

    #[test]
    fn test_out_of_order_on_fresh_entry_leaves_no_entry() {
        let (cache, queue, stats) = harness(300, 3000);

        // A fresh entry starts with last_value = 0, so a non-positive
        // timestamp is rejected and the placeholder entry is dropped.
        let err = cache
            .insert(&queue, "a.rrd", token(0, 1), 0, 100, &stats)
            .unwrap_err();
        assert!(matches!(err, CacheError::OutOfOrder { .. }));
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_age_crossing_enqueues_once() {
        let (cache, queue, stats) = harness(10, 100);

        for t in 100..110 {
            cache
                .insert(&queue, "a.rrd", token(t, 0), t, t, &stats)
                .unwrap();
            assert!(queue.is_empty(), "enqueued early at t={}", t);
        }

        // Age reaches the timeout exactly here.
        cache
            .insert(&queue, "a.rrd", token(110, 0), 110, 110, &stats)
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(cache.is_queued("a.rrd"), Some(true));

        // Further inserts keep appending without double-queueing.
        cache
            .insert(&queue, "a.rrd", token(111, 0), 111, 111, &stats)
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(cache.pending("a.rrd"), Some(12));
    }

    #[test]
    fn test_zero_timeout_enqueues_first_insert() {
        let (cache, queue, stats) = harness(0, 0);

        cache
            .insert(&queue, "a.rrd", token(100, 1), 100, 100, &stats)
            .unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(cache.is_queued("a.rrd"), Some(true));
    }

    #[test]
    fn test_steal_takes_all_accumulated_tokens() {
        let (cache, queue, stats) = harness(2, 20);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        cache
            .insert(&queue, "a.rrd", token(102, 1), 102, 102, &stats)
            .unwrap();
        assert_eq!(cache.is_queued("a.rrd"), Some(true));

        // Tokens inserted after the enqueue but before the steal ride
        // along in the same batch.
        cache
            .insert(&queue, "a.rrd", token(103, 2), 103, 103, &stats)
            .unwrap();

        let stolen = cache.steal("a.rrd").unwrap();
        assert_eq!(stolen, vec!["100:0", "102:1", "103:2"]);

        // Entry retained, empty and unqueued.
        assert_eq!(cache.pending("a.rrd"), Some(0));
        assert_eq!(cache.is_queued("a.rrd"), Some(false));
    }

    #[test]
    fn test_monotonicity_survives_steal() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        cache.steal("a.rrd").unwrap();

        // last_value = 100 still guards the emptied entry.
        let err = cache
            .insert(&queue, "a.rrd", token(100, 1), 100, 100, &stats)
            .unwrap_err();
        assert!(matches!(err, CacheError::OutOfOrder { .. }));

        cache
            .insert(&queue, "a.rrd", token(101, 1), 101, 101, &stats)
            .unwrap();
        assert_eq!(cache.pending("a.rrd"), Some(1));
    }

    #[test]
    fn test_sweep_enqueues_aged_entries() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "old.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        cache
            .insert(&queue, "new.rrd", token(190, 0), 190, 190, &stats)
            .unwrap();

        cache.sweep(&queue, 50, 200, &stats);

        // old.rrd is 100s old, new.rrd only 10s.
        assert_eq!(queue.snapshot(), vec!["old.rrd"]);
        assert_eq!(cache.is_queued("old.rrd"), Some(true));
        assert_eq!(cache.is_queued("new.rrd"), Some(false));
    }

    #[test]
    fn test_sweep_skips_queued_entries() {
        let (cache, queue, stats) = harness(0, 0);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        assert_eq!(queue.len(), 1);

        cache.sweep(&queue, -1, 200, &stats);
        assert_eq!(queue.len(), 1, "queued entry must not be re-queued");
    }

    #[test]
    fn test_sweep_removes_aged_empty_entries() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        cache.steal("a.rrd").unwrap();
        assert_eq!(cache.entry_count(), 1);

        cache.sweep(&queue, 50, 200, &stats);

        assert_eq!(cache.entry_count(), 0);
        assert!(queue.is_empty());
        assert_eq!(stats.snapshot().entries_evicted, 1);
    }

    #[test]
    fn test_sweep_force_drains_everything() {
        let (cache, queue, stats) = harness(300, 3000);

        for name in ["a.rrd", "b.rrd", "c.rrd"] {
            cache
                .insert(&queue, name, token(100, 0), 100, 100, &stats)
                .unwrap();
        }

        // Entries are brand new, but -1 queues them all anyway.
        cache.sweep(&queue, -1, 100, &stats);

        assert_eq!(queue.len(), 3);
        for name in ["a.rrd", "b.rrd", "c.rrd"] {
            assert_eq!(cache.is_queued(name), Some(true));
        }
    }

    #[test]
    fn test_inline_sweep_runs_on_insert() {
        let (cache, queue, stats) = harness(10, 100);

        // Leave an emptied entry behind, as the writer would.
        cache
            .insert(&queue, "idle.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        cache.steal("idle.rrd").unwrap();

        // More than cache_flush seconds later, an unrelated insert
        // triggers the in-line sweep and collects the idle entry.
        cache
            .insert(&queue, "busy.rrd", token(250, 0), 250, 250, &stats)
            .unwrap();

        assert_eq!(cache.pending("idle.rrd"), None);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_flush_identifier_not_found() {
        let (cache, queue, _stats) = harness(300, 3000);
        let err = cache
            .flush_identifier(&queue, 0, "missing.rrd", 100)
            .unwrap_err();
        assert!(matches!(err, CacheError::NotFound { .. }));
    }

    #[test]
    fn test_flush_identifier_promotes_queued_file() {
        let (cache, queue, stats) = harness(0, 0);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        cache
            .insert(&queue, "b.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        assert_eq!(queue.snapshot(), vec!["a.rrd", "b.rrd"]);

        cache.flush_identifier(&queue, 0, "b.rrd", 100).unwrap();

        assert_eq!(queue.snapshot(), vec!["b.rrd", "a.rrd"]);
    }

    #[test]
    fn test_flush_identifier_front_inserts_unqueued_file() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        cache
            .insert(&queue, "b.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();

        cache.flush_identifier(&queue, 0, "a.rrd", 200).unwrap();
        // b.rrd was flushed later but jumps the line via front insert.
        cache.flush_identifier(&queue, 0, "b.rrd", 200).unwrap();

        assert_eq!(queue.snapshot(), vec!["b.rrd", "a.rrd"]);
        assert_eq!(cache.is_queued("b.rrd"), Some(true));
    }

    #[test]
    fn test_flush_identifier_respects_age_threshold() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();

        // 10 seconds old, threshold 60: left alone, still a success.
        cache.flush_identifier(&queue, 60, "a.rrd", 110).unwrap();
        assert!(queue.is_empty());
        assert_eq!(cache.is_queued("a.rrd"), Some(false));

        // Threshold 0 flushes it.
        cache.flush_identifier(&queue, 0, "a.rrd", 110).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_destroyed_cache_behavior() {
        let (cache, queue, stats) = harness(300, 3000);

        cache
            .insert(&queue, "a.rrd", token(100, 0), 100, 100, &stats)
            .unwrap();
        assert_eq!(cache.destroy(), 1);
        assert!(cache.is_destroyed());

        let err = cache
            .insert(&queue, "a.rrd", token(200, 0), 200, 200, &stats)
            .unwrap_err();
        assert!(matches!(err, CacheError::Unavailable));

        // Flushes against a destroyed cache succeed vacuously.
        cache.sweep(&queue, -1, 200, &stats);
        cache.flush_identifier(&queue, 0, "a.rrd", 200).unwrap();

        // Destroy is idempotent.
        assert_eq!(cache.destroy(), 0);
    }
}
