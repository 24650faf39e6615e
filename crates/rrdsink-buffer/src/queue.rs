// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The dispatch queue: filenames awaiting a write, in FIFO order.
//!
//! The queue is the handoff point between the accumulator cache and the
//! writer thread. Producers append at the back when an entry ages out;
//! targeted flushes insert at the front or promote an already-queued
//! filename to the head. The writer blocks on the queue's condition
//! variable until a filename (or shutdown) arrives.
//!
//! Each queued element owns its own copy of the filename, decoupling
//! queue lifetime from cache lifetime.
//!
//! Lock order: the cache mutex, when held, is always acquired before the
//! queue mutex. The queue itself never takes any other lock.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use tracing::debug;

// =============================================================================
// Insert Position
// =============================================================================

/// Where to splice a filename into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Ahead of everything already queued (priority flush).
    Front,
    /// Behind everything already queued (normal aging).
    Back,
}

// =============================================================================
// Dispatch Queue
// =============================================================================

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<String>,
    shutdown: bool,
}

/// A FIFO of filenames awaiting write, with front-insert and
/// promote-to-front, paired with a condition variable for the writer.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl DispatchQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splices a fresh copy of `filename` at the requested end and wakes
    /// the writer.
    pub fn enqueue(&self, filename: &str, position: InsertPosition) {
        let mut state = self.state.lock();
        match position {
            InsertPosition::Front => state.items.push_front(filename.to_string()),
            InsertPosition::Back => state.items.push_back(filename.to_string()),
        }
        debug!(filename, ?position, depth = state.items.len(), "Queued file for update");
        self.available.notify_one();
    }

    /// Relinks `filename` at the head if it is queued behind other
    /// entries. Returns whether a move occurred; already at the head (or
    /// absent) is a no-op.
    pub fn promote(&self, filename: &str) -> bool {
        let mut state = self.state.lock();
        match state.items.iter().position(|f| f == filename) {
            Some(pos) if pos > 0 => {
                let item = state.items.remove(pos).expect("position was just found");
                state.items.push_front(item);
                debug!(filename, from = pos, "Promoted file to queue head");
                true
            }
            _ => false,
        }
    }

    /// Blocks until a filename is available or shutdown has begun.
    ///
    /// Returns `None` only when shutdown has begun *and* the queue has
    /// drained; filenames still queued at shutdown are handed out first.
    pub fn dequeue_blocking(&self) -> Option<String> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.shutdown {
            self.available.wait(&mut state);
        }
        state.items.pop_front()
    }

    /// Begins the shutdown phase: wakes the writer so it can drain the
    /// remaining entries and observe the flag.
    pub fn begin_shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.available.notify_all();
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the queued filenames front-to-back, for inspection.
    pub fn snapshot(&self) -> Vec<String> {
        self.state.lock().items.iter().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
