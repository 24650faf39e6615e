// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Lock-free statistics for the sink.
//!
//! All counters are atomics updated with `Relaxed` ordering; reading them
//! never touches the cache or queue locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

// =============================================================================
// Live Counters
// =============================================================================

/// Lock-free sink statistics.
#[derive(Debug, Default)]
pub struct SinkStatsInner {
    /// Samples accepted into the cache (cumulative).
    pub samples_inserted: AtomicU64,
    /// Samples rejected as out-of-order (cumulative).
    pub samples_rejected: AtomicU64,
    /// Update tokens delivered to the RRD backend (cumulative).
    pub tokens_written: AtomicU64,
    /// Batches delivered to the RRD backend (cumulative).
    pub batches_written: AtomicU64,
    /// Batches dropped because the backend rejected them (cumulative).
    pub write_errors: AtomicU64,
    /// Cache entries created (cumulative).
    pub entries_created: AtomicU64,
    /// Empty entries removed by the sweep (cumulative).
    pub entries_evicted: AtomicU64,
    /// Files materialized by the create collaborator (cumulative).
    pub files_created: AtomicU64,
    /// Last successful backend write (unix nanos; 0 = never).
    pub last_write_timestamp: AtomicI64,
}

impl SinkStatsInner {
    /// Creates statistics with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an accepted insert.
    #[inline]
    pub fn record_insert(&self, new_entry: bool) {
        self.samples_inserted.fetch_add(1, Ordering::Relaxed);
        if new_entry {
            self.entries_created.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records an out-of-order rejection.
    #[inline]
    pub fn record_rejected(&self) {
        self.samples_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful backend write of `tokens` update tokens.
    #[inline]
    pub fn record_batch(&self, tokens: u64) {
        self.tokens_written.fetch_add(tokens, Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.last_write_timestamp
            .store(Utc::now().timestamp_nanos_opt().unwrap_or(0), Ordering::Relaxed);
    }

    /// Records a dropped batch.
    #[inline]
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records empty entries removed by the sweep.
    #[inline]
    pub fn record_evicted(&self, count: u64) {
        self.entries_evicted.fetch_add(count, Ordering::Relaxed);
    }

    /// Records a file creation.
    #[inline]
    pub fn record_file_created(&self) {
        self.files_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Creates an immutable snapshot.
    pub fn snapshot(&self) -> SinkStats {
        let last_write_nanos = self.last_write_timestamp.load(Ordering::Relaxed);
        SinkStats {
            samples_inserted: self.samples_inserted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            tokens_written: self.tokens_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            entries_created: self.entries_created.load(Ordering::Relaxed),
            entries_evicted: self.entries_evicted.load(Ordering::Relaxed),
            files_created: self.files_created.load(Ordering::Relaxed),
            last_write_timestamp: if last_write_nanos > 0 {
                Some(DateTime::from_timestamp_nanos(last_write_nanos))
            } else {
                None
            },
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Immutable snapshot of sink statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkStats {
    /// Samples accepted into the cache.
    pub samples_inserted: u64,
    /// Samples rejected as out-of-order.
    pub samples_rejected: u64,
    /// Update tokens delivered to the backend.
    pub tokens_written: u64,
    /// Batches delivered to the backend.
    pub batches_written: u64,
    /// Batches dropped on backend rejection.
    pub write_errors: u64,
    /// Cache entries created.
    pub entries_created: u64,
    /// Empty entries removed by the sweep.
    pub entries_evicted: u64,
    /// Files materialized on first sight.
    pub files_created: u64,
    /// Last successful backend write.
    pub last_write_timestamp: Option<DateTime<Utc>>,
}

impl SinkStats {
    /// Tokens still buffered: accepted minus delivered.
    ///
    /// An approximation while the writer is mid-batch; exact once the
    /// queue is idle.
    pub fn tokens_pending(&self) -> u64 {
        self.samples_inserted.saturating_sub(self.tokens_written)
    }
}

// =============================================================================
// Tests
// =============================================================================
