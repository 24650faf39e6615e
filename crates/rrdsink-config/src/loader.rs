// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading for rrdsink.
//!
//! Loads a [`SinkConfig`] from a TOML or YAML file (chosen by extension)
//! and validates it. Normalization is left to the sink so that loaded
//! configurations round-trip unchanged.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::SinkConfig;
use std::fs;
use std::path::Path;
use tracing::debug;

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use rrdsink_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("rrdsink.toml").unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Creates a new loader.
    pub fn new() -> Self {
        Self
    }

    /// Loads and validates a configuration file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<SinkConfig> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<SinkConfig>(&contents)
                .map_err(|e| ConfigError::parse(path, e.to_string()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str::<SinkConfig>(&contents)
                .map_err(|e| ConfigError::parse(path, e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat { path: path.into() }),
        };

        config.validate()?;
        debug!(path = %path.display(), "Loaded sink configuration");
        Ok(config)
    }
}

// =============================================================================
// Timespan List Parsing
// =============================================================================

/// Parses a comma/space separated timespan list, e.g. `"3600, 86400 604800"`.
///
/// Hosts that carry their configuration as flat key/value strings use
/// this to map a timespan option onto `create.rra_timespans`. Zero
/// entries are rejected; the result is sorted ascending and deduplicated.
pub fn parse_timespan_list(value: &str) -> ConfigResult<Vec<u32>> {
    let mut spans = Vec::new();
    for part in value.split([',', ' ', '\t']).filter(|p| !p.is_empty()) {
        let span: u32 = part.parse().map_err(|_| {
            ConfigError::validation(
                "create.rra_timespans",
                format!("'{}' is not a valid timespan", part),
            )
        })?;
        if span == 0 {
            return Err(ConfigError::validation(
                "create.rra_timespans",
                "timespans must be nonzero",
            ));
        }
        spans.push(span);
    }
    spans.sort_unstable();
    spans.dedup();
    Ok(spans)
}

// =============================================================================
// Tests
// =============================================================================
