// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rrdsink-core
//!
//! Core types, errors, and sample encoding for rrdsink, a write-coalescing
//! cache in front of round-robin-database (RRD) files.
//!
//! This crate provides the foundation shared by all rrdsink components:
//!
//! - **Types**: [`types::Sample`], [`types::Value`], [`types::TypeSchema`]
//! - **Error**: the unified [`error::SinkError`] hierarchy
//! - **Encode**: pure derivation of canonical filenames and update tokens
//!
//! ## Example
//!
//! ```
//! use rrdsink_core::encode::{sample_filename, update_token};
//! use rrdsink_core::types::{Sample, TypeSchema, Value, ValueKind};
//!
//! let schema = TypeSchema::single("load", ValueKind::Gauge);
//! let sample = Sample::new("web01", "load", "load", 1700000000, vec![Value::Gauge(0.42)]);
//!
//! let filename = sample_filename(Some("/var/lib/rrd"), &sample).unwrap();
//! let token = update_token(&schema, &sample).unwrap();
//!
//! assert_eq!(filename, "/var/lib/rrd/web01/load/load.rrd");
//! assert_eq!(token, "1700000000:0.42");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod encode;
pub mod error;
pub mod types;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{CacheError, EncodeError, RrdError, SinkError};
pub use error::{CacheResult, EncodeResult, RrdResult, SinkResult};
pub use types::{DataSource, Sample, TypeSchema, Value, ValueKind};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
