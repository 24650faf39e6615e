// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration-related errors.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// A configuration value failed validation.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not name a supported format.
    #[error("Unsupported config format for '{path}' (expected .toml, .yaml, or .yml)")]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A Result type with [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message() {
        let err = ConfigError::validation("create.xff", "must be in [0, 1)");
        assert!(err.to_string().contains("create.xff"));
        assert!(err.to_string().contains("must be in [0, 1)"));
    }

    #[test]
    fn test_parse_error_message() {
        let err = ConfigError::parse("/etc/rrdsink.toml", "expected table");
        assert!(err.to_string().contains("/etc/rrdsink.toml"));
    }
}
