// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema for rrdsink.
//!
//! # Schema Structure
//!
//! ```text
//! SinkConfig
//! ├── data_dir: Option<String>
//! ├── cache_timeout: u64
//! ├── cache_flush: u64
//! └── create: CreateConfig
//!     ├── step_size / heartbeat
//!     ├── rra_rows / rra_timespans
//!     └── xff
//! ```
//!
//! The raw schema is what a host parses from its config file;
//! [`SinkConfig::normalized`] derives the runtime form the sink actually
//! uses (stripped data dir, coupled timeouts, defaulted heartbeat).

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Cache timeouts below this value disable time-based coalescing.
pub const MIN_EFFECTIVE_CACHE_TIMEOUT: u64 = 2;

/// Sweep period multiplier applied when `cache_flush` is left below
/// `cache_timeout`.
pub const CACHE_FLUSH_MULTIPLIER: u64 = 10;

/// Default number of rows per consolidation archive.
pub const DEFAULT_RRA_ROWS: u32 = 1200;

/// Default consolidation x-files factor.
pub const DEFAULT_XFF: f64 = 0.1;

/// Default archive timespans in seconds: hour, day, week, month, year.
pub const DEFAULT_RRA_TIMESPANS: &[u32] = &[3600, 86_400, 604_800, 2_678_400, 31_622_400];

// =============================================================================
// Sink Configuration
// =============================================================================

/// The root configuration for an rrdsink instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Root directory prepended to every filename. `None` resolves
    /// filenames relative to the host's working directory.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Maximum age in seconds a sample may sit in the cache before its
    /// file is enqueued. Values below 2 disable coalescing entirely.
    #[serde(default)]
    pub cache_timeout: u64,

    /// Period of the in-line background sweep, in seconds.
    #[serde(default)]
    pub cache_flush: u64,

    /// Parameters handed to file creation.
    #[serde(default)]
    pub create: CreateConfig,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cache_timeout: 0,
            cache_flush: 0,
            create: CreateConfig::default(),
        }
    }
}

impl SinkConfig {
    /// Validates the configuration as parsed.
    pub fn validate(&self) -> ConfigResult<()> {
        self.create.validate()
    }

    /// Derives the runtime configuration:
    ///
    /// - trailing slashes are stripped from `data_dir`; an all-slash or
    ///   empty value becomes `None`
    /// - `cache_timeout < 2` zeroes both timeouts (coalescing disabled)
    /// - otherwise a `cache_flush` below `cache_timeout` is raised to
    ///   `10 × cache_timeout`
    /// - a zero `heartbeat` with a nonzero `step_size` becomes
    ///   `2 × step_size`
    /// - archive timespans are sorted ascending and deduplicated
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();

        cfg.data_dir = cfg.data_dir.and_then(|dir| {
            let trimmed = dir.trim_end_matches('/');
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });

        if cfg.cache_timeout < MIN_EFFECTIVE_CACHE_TIMEOUT {
            cfg.cache_timeout = 0;
            cfg.cache_flush = 0;
        } else if cfg.cache_flush < cfg.cache_timeout {
            cfg.cache_flush = CACHE_FLUSH_MULTIPLIER * cfg.cache_timeout;
        }

        if cfg.create.heartbeat == 0 && cfg.create.step_size > 0 {
            cfg.create.heartbeat = 2 * cfg.create.step_size;
        }

        cfg.create.rra_timespans.sort_unstable();
        cfg.create.rra_timespans.dedup();

        cfg
    }
}

// =============================================================================
// Create Configuration
// =============================================================================

/// Parameters for materializing a new RRD file on first sight.
///
/// Zero `step_size`/`heartbeat` mean "derive from the sample interval at
/// creation time".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConfig {
    /// Base step of new files, in seconds (0 = sample interval).
    #[serde(default)]
    pub step_size: u64,

    /// Data-source heartbeat, in seconds (0 = twice the step).
    #[serde(default)]
    pub heartbeat: u64,

    /// Rows per consolidation archive.
    #[serde(default = "default_rra_rows")]
    pub rra_rows: u32,

    /// Archive timespans in seconds; empty uses the built-in set.
    #[serde(default)]
    pub rra_timespans: Vec<u32>,

    /// X-files factor for consolidation, in `[0, 1)`.
    #[serde(default = "default_xff")]
    pub xff: f64,
}

fn default_rra_rows() -> u32 {
    DEFAULT_RRA_ROWS
}

fn default_xff() -> f64 {
    DEFAULT_XFF
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self {
            step_size: 0,
            heartbeat: 0,
            rra_rows: DEFAULT_RRA_ROWS,
            rra_timespans: Vec::new(),
            xff: DEFAULT_XFF,
        }
    }
}

impl CreateConfig {
    /// Validates the creation parameters.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rra_rows == 0 {
            return Err(ConfigError::validation(
                "create.rra_rows",
                "must be greater than 0",
            ));
        }
        if !(0.0..1.0).contains(&self.xff) {
            return Err(ConfigError::validation(
                "create.xff",
                "must be in the range 0 to 1 (exclusive)",
            ));
        }
        if self.rra_timespans.iter().any(|&ts| ts == 0) {
            return Err(ConfigError::validation(
                "create.rra_timespans",
                "timespans must be nonzero",
            ));
        }
        Ok(())
    }

    /// Returns the configured timespans, or the built-in defaults when
    /// none are set.
    pub fn timespans(&self) -> &[u32] {
        if self.rra_timespans.is_empty() {
            DEFAULT_RRA_TIMESPANS
        } else {
            &self.rra_timespans
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
