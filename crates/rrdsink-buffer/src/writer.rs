// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The writer loop: the single thread that drains the dispatch queue.
//!
//! Each iteration pops one filename, steals that file's buffered tokens
//! from the cache (under the cache mutex, atomically with clearing the
//! queued flag), and pushes the batch at the RRD backend. The writer
//! never holds the cache and queue mutexes at the same time, which keeps
//! it trivially inside the cache-before-queue lock order.
//!
//! A failed update drops its batch with a warning: RRD rejections are
//! almost always structural (bad file, bad schema) and retrying them
//! would stall every other file behind the bad one.
//!
//! When the queue reports shutdown (flag set and queue drained), the
//! writer destroys the cache and exits.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::AccumulatorCache;
use crate::queue::DispatchQueue;
use crate::rrd::RrdBackend;
use crate::stats::SinkStatsInner;

/// Everything the writer thread needs, bundled for the spawn call.
pub(crate) struct WriterContext {
    pub cache: Arc<AccumulatorCache>,
    pub queue: Arc<DispatchQueue>,
    pub backend: Arc<dyn RrdBackend>,
    pub stats: Arc<SinkStatsInner>,
}

/// Body of the writer thread.
pub(crate) fn run(ctx: WriterContext) {
    loop {
        // Blocks while idle; None means shutdown with a drained queue.
        let Some(filename) = ctx.queue.dequeue_blocking() else {
            break;
        };

        // A queued filename always has a cache entry while the queued
        // flag discipline holds.
        let Some(tokens) = ctx.cache.steal(&filename) else {
            warn!(filename, "Dequeued file has no cache entry; skipping");
            continue;
        };

        if tokens.is_empty() {
            continue;
        }

        match ctx.backend.update(&filename, &tokens) {
            Ok(()) => {
                debug!(filename, tokens = tokens.len(), "Wrote batch");
                ctx.stats.record_batch(tokens.len() as u64);
            }
            Err(e) => {
                // The batch is dropped, never re-enqueued.
                warn!(filename, error = %e, dropped = tokens.len(), "RRD update failed; dropping batch");
                ctx.stats.record_write_error();
            }
        }
    }

    let dropped = ctx.cache.destroy();
    debug!(entries_dropped = dropped, "Writer thread exiting");
}

// =============================================================================
// Tests
// =============================================================================
