// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for rrdsink.
//!
//! # Error Hierarchy
//!
//! ```text
//! SinkError (root)
//! ├── EncodeError  - Filename/update-token encoding
//! ├── CacheError   - Accumulator cache operations
//! └── RrdError     - RRD backend (update/create) and file inspection
//! ```
//!
//! Every error carries enough context to be logged without the caller
//! reconstructing it, and exposes an `error_type()` discriminant for
//! structured log fields. No error in this hierarchy is retried: failed
//! writes drop their batch by design.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::ValueKind;

// =============================================================================
// SinkError - Root Error Type
// =============================================================================

/// The root error type for rrdsink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sample encoding failed.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Accumulator cache rejected the operation.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// RRD backend or target-file inspection failed.
    #[error("RRD error: {0}")]
    Rrd(#[from] RrdError),

    /// The writer thread could not be spawned.
    #[error("Failed to start writer thread: {source}")]
    Init {
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },
}

impl SinkError {
    /// Creates an init error from a thread-spawn failure.
    pub fn init(source: io::Error) -> Self {
        Self::Init { source }
    }

    /// Returns the error type as a string for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            SinkError::Encode(e) => e.error_type(),
            SinkError::Cache(e) => e.error_type(),
            SinkError::Rrd(e) => e.error_type(),
            SinkError::Init { .. } => "init",
        }
    }
}

// =============================================================================
// EncodeError
// =============================================================================

/// Errors produced while deriving a filename or update token from a
/// sample.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoded string would exceed its bounded buffer.
    #[error("{what} would exceed {limit} bytes ({len} required)")]
    Overflow {
        /// What was being encoded (`"filename"` or `"update token"`).
        what: &'static str,
        /// Length the encoding would require.
        len: usize,
        /// The bound that was exceeded.
        limit: usize,
    },

    /// A data source kind the encoder cannot render.
    #[error("Data source '{source_name}' has unsupported kind {kind}")]
    UnsupportedType {
        /// The offending source name.
        source_name: String,
        /// Its kind.
        kind: ValueKind,
    },

    /// Sample and schema disagree.
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the disagreement.
        message: String,
    },
}

impl EncodeError {
    /// Creates an overflow error.
    pub fn overflow(what: &'static str, len: usize, limit: usize) -> Self {
        Self::Overflow { what, len, limit }
    }

    /// Creates an unsupported-type error.
    pub fn unsupported_type(source: impl Into<String>, kind: ValueKind) -> Self {
        Self::UnsupportedType {
            source_name: source.into(),
            kind,
        }
    }

    /// Creates a schema-mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            EncodeError::Overflow { .. } => "encode_overflow",
            EncodeError::UnsupportedType { .. } => "unsupported_type",
            EncodeError::SchemaMismatch { .. } => "schema_mismatch",
        }
    }
}

// =============================================================================
// CacheError
// =============================================================================

/// Errors produced by the accumulator cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An insertion arrived at or before the entry's newest accepted
    /// timestamp. The sample is dropped, the entry is unchanged.
    #[error("Out-of-order sample for '{filename}': last accepted {last_value}, got {sample_time}")]
    OutOfOrder {
        /// The target file.
        filename: String,
        /// Newest accepted timestamp for that file.
        last_value: i64,
        /// The rejected sample time.
        sample_time: i64,
    },

    /// Memory could not be reserved during an append; the entry was
    /// removed from the cache to preserve the queue invariants.
    #[error("Allocation failed while buffering '{filename}'; entry dropped")]
    AllocFailed {
        /// The target file whose entry was dropped.
        filename: String,
    },

    /// A targeted flush named a file the cache has never seen.
    #[error("No cache entry for identifier '{identifier}'")]
    NotFound {
        /// The unmatched identifier.
        identifier: String,
    },

    /// The cache has been destroyed (writer exited) or never created.
    #[error("Cache is not available")]
    Unavailable,
}

impl CacheError {
    /// Creates an out-of-order error.
    pub fn out_of_order(filename: impl Into<String>, last_value: i64, sample_time: i64) -> Self {
        Self::OutOfOrder {
            filename: filename.into(),
            last_value,
            sample_time,
        }
    }

    /// Creates an allocation-failure error.
    pub fn alloc_failed(filename: impl Into<String>) -> Self {
        Self::AllocFailed {
            filename: filename.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            CacheError::OutOfOrder { .. } => "out_of_order",
            CacheError::AllocFailed { .. } => "alloc_failed",
            CacheError::NotFound { .. } => "not_found",
            CacheError::Unavailable => "unavailable",
        }
    }
}

// =============================================================================
// RrdError
// =============================================================================

/// Errors produced by the RRD backend or target-file inspection.
#[derive(Debug, Error)]
pub enum RrdError {
    /// The backend rejected an update; the batch is dropped.
    #[error("RRD update of '{filename}' failed: {message}")]
    UpdateFailed {
        /// The target file.
        filename: String,
        /// Backend diagnostic.
        message: String,
    },

    /// The backend could not create a new file.
    #[error("RRD create of '{filename}' failed: {message}")]
    CreateFailed {
        /// The target file.
        filename: String,
        /// Backend diagnostic.
        message: String,
    },

    /// The target path exists but is not a regular file.
    #[error("'{path}' exists but is not a regular file")]
    NotRegularFile {
        /// The offending path.
        path: PathBuf,
    },

    /// An I/O error while inspecting or invoking the backend.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl RrdError {
    /// Creates an update-failed error.
    pub fn update_failed(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpdateFailed {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Creates a create-failed error.
    pub fn create_failed(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CreateFailed {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Creates a not-a-regular-file error.
    pub fn not_regular_file(path: impl Into<PathBuf>) -> Self {
        Self::NotRegularFile { path: path.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            RrdError::UpdateFailed { .. } => "write_failed",
            RrdError::CreateFailed { .. } => "create_failed",
            RrdError::NotRegularFile { .. } => "not_regular_file",
            RrdError::Io { .. } => "io",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with [`SinkError`].
pub type SinkResult<T> = Result<T, SinkError>;

/// A Result type with [`EncodeError`].
pub type EncodeResult<T> = Result<T, EncodeError>;

/// A Result type with [`CacheError`].
pub type CacheResult<T> = Result<T, CacheError>;

/// A Result type with [`RrdError`].
pub type RrdResult<T> = Result<T, RrdError>;

// =============================================================================
// Tests
// =============================================================================
