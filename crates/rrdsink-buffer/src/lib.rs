// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rrdsink-buffer
//!
//! The write-coalescing pipeline of rrdsink: an accumulator cache that
//! batches update tokens per target file, a FIFO dispatch queue, and the
//! single writer thread that pushes batches at the RRD backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          RrdSink                               │
//! │                                                                │
//! │  write(sample) ──▶ ┌──────────────────┐   age   ┌───────────┐  │
//! │                    │ AccumulatorCache │ ──────▶ │ Dispatch  │  │
//! │  flush(id)     ──▶ │ (per-file batch) │ promote │ Queue     │  │
//! │                    └──────────────────┘         └─────┬─────┘  │
//! │                             ▲ steal                   │        │
//! │                             │                         ▼        │
//! │                    ┌────────┴─────────┐         ┌───────────┐  │
//! │                    │  Writer thread   │ ◀────── │  condvar  │  │
//! │                    │ (one per sink)   │         └───────────┘  │
//! │                    └────────┬─────────┘                        │
//! │                             ▼                                  │
//! │                    ┌──────────────────┐                        │
//! │                    │    RrdBackend    │  (rrdtool / mock)      │
//! │                    └──────────────────┘                        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking discipline
//!
//! The cache mutex is always acquired before the queue mutex when both
//! are needed; the writer holds only one of them at any time. Per-file
//! update serialization is structural: only the writer thread ever calls
//! the backend's update.
//!
//! ## Module Overview
//!
//! - [`cache`]: per-file accumulator cache with age tracking and sweep
//! - [`queue`]: FIFO dispatch queue with front-insert and promote
//! - [`writer`]: the writer thread body
//! - [`rrd`]: backend trait, `rrdtool` implementation, and test mock
//! - [`sink`]: the host-facing facade
//! - [`stats`]: lock-free statistics

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cache;
pub mod queue;
pub mod rrd;
pub mod sink;
pub mod stats;

mod writer;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::AccumulatorCache;
pub use queue::{DispatchQueue, InsertPosition};
pub use rrd::{MockRrdBackend, RrdBackend, RrdCall, RrdToolBackend};
pub use sink::RrdSink;
pub use stats::{SinkStats, SinkStatsInner};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Prelude
// =============================================================================

/// Re-exports of the types most hosts need.
pub mod prelude {
    pub use crate::rrd::{RrdBackend, RrdToolBackend};
    pub use crate::sink::RrdSink;
    pub use crate::stats::SinkStats;
    pub use rrdsink_config::SinkConfig;
    pub use rrdsink_core::types::{Sample, TypeSchema, Value, ValueKind};
}

// =============================================================================
// Tests
// =============================================================================
