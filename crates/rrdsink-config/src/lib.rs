// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rrdsink-config
//!
//! Configuration schema, validation, and loading for rrdsink.
//!
//! The schema distinguishes the *parsed* form (what a host reads from a
//! file) from the *normalized* form (what the sink runs with): trailing
//! slashes stripped from the data directory, sub-threshold cache timeouts
//! zeroed, and the sweep period coupled to the cache timeout. See
//! [`schema::SinkConfig::normalized`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{parse_timespan_list, ConfigLoader};
pub use schema::{CreateConfig, SinkConfig};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
