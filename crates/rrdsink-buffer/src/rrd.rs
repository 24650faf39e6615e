// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! RRD backend abstraction.
//!
//! The sink consumes the round-robin-database library through the
//! [`RrdBackend`] trait: one call to push a batch of update tokens at a
//! file, one call to materialize a file on first sight.
//!
//! [`RrdToolBackend`] drives the `rrdtool` command-line binary. The
//! update argv is the filename-prefixed form (`update <file> <tokens…>`),
//! and calls are serialized through a dedicated mutex; combined with the
//! single writer thread this keeps every file's updates strictly serial.
//!
//! [`MockRrdBackend`] records calls and injects failures for tests.

use parking_lot::Mutex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

use rrdsink_config::CreateConfig;
use rrdsink_core::error::{RrdError, RrdResult};
use rrdsink_core::types::{Sample, TypeSchema};

/// Step used when neither the config nor the sample provides one.
const FALLBACK_STEP_SECS: u64 = 10;

// =============================================================================
// Backend Trait
// =============================================================================

/// Interface to the RRD library.
///
/// Implementations must be shareable across threads; rrdsink guarantees
/// that `update` is only ever invoked from its single writer thread.
pub trait RrdBackend: Send + Sync + fmt::Debug {
    /// Pushes a batch of update tokens at `filename`.
    fn update(&self, filename: &str, tokens: &[String]) -> RrdResult<()>;

    /// Materializes a new RRD file from the sample's schema.
    fn create(
        &self,
        filename: &str,
        schema: &TypeSchema,
        sample: &Sample,
        config: &CreateConfig,
    ) -> RrdResult<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// =============================================================================
// Argument Construction
// =============================================================================

/// Builds the update argv: `update <filename> <token>…`.
fn update_args(filename: &str, tokens: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(2 + tokens.len());
    args.push("update".to_string());
    args.push(filename.to_string());
    args.extend(tokens.iter().cloned());
    args
}

/// Builds the create argv from the schema and creation parameters.
///
/// Emits one `DS` definition per schema source and `AVERAGE`/`MIN`/`MAX`
/// archives for every configured timespan, sized so each archive holds
/// about `rra_rows` rows.
fn create_args(
    filename: &str,
    schema: &TypeSchema,
    sample: &Sample,
    config: &CreateConfig,
) -> Vec<String> {
    let step = if config.step_size > 0 {
        config.step_size
    } else if sample.interval > 0 {
        sample.interval
    } else {
        FALLBACK_STEP_SECS
    };
    let heartbeat = if config.heartbeat > 0 {
        config.heartbeat
    } else {
        2 * step
    };

    let mut args = vec![
        "create".to_string(),
        filename.to_string(),
        "--step".to_string(),
        step.to_string(),
        "--start".to_string(),
        (sample.time - 10).to_string(),
    ];

    for source in &schema.sources {
        let min = source.min.map_or_else(|| "U".to_string(), |m| m.to_string());
        let max = source.max.map_or_else(|| "U".to_string(), |m| m.to_string());
        args.push(format!(
            "DS:{}:{}:{}:{}:{}",
            source.name,
            source.kind.as_str(),
            heartbeat,
            min,
            max
        ));
    }

    for &span in config.timespans() {
        let span = span as u64;
        let steps_per_row = ((span / step) / config.rra_rows as u64).max(1);
        let rows = (span / (steps_per_row * step)).max(1);
        for cf in ["AVERAGE", "MIN", "MAX"] {
            args.push(format!("RRA:{}:{}:{}:{}", cf, config.xff, steps_per_row, rows));
        }
    }

    args
}

// =============================================================================
// rrdtool Backend
// =============================================================================

/// Backend that shells out to the `rrdtool` binary.
#[derive(Debug)]
pub struct RrdToolBackend {
    binary: PathBuf,

    /// Serializes library invocations, mirroring the locking required by
    /// the non-reentrant native library.
    lock: Mutex<()>,
}

impl Default for RrdToolBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RrdToolBackend {
    /// Creates a backend using `rrdtool` from `PATH`.
    pub fn new() -> Self {
        Self::with_binary("rrdtool")
    }

    /// Creates a backend using an explicit binary path.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            lock: Mutex::new(()),
        }
    }

    fn run(&self, args: &[String]) -> RrdResult<std::process::Output> {
        let _guard = self.lock.lock();
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| RrdError::io(&self.binary, e))
    }
}

impl RrdBackend for RrdToolBackend {
    fn update(&self, filename: &str, tokens: &[String]) -> RrdResult<()> {
        let args = update_args(filename, tokens);
        let output = self.run(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RrdError::update_failed(filename, stderr.trim()));
        }
        debug!(filename, tokens = tokens.len(), "rrdtool update succeeded");
        Ok(())
    }

    fn create(
        &self,
        filename: &str,
        schema: &TypeSchema,
        sample: &Sample,
        config: &CreateConfig,
    ) -> RrdResult<()> {
        if let Some(parent) = Path::new(filename).parent() {
            fs::create_dir_all(parent).map_err(|e| RrdError::io(parent, e))?;
        }

        let args = create_args(filename, schema, sample, config);
        let output = self.run(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(filename, stderr = %stderr.trim(), "rrdtool create failed");
            return Err(RrdError::create_failed(filename, stderr.trim()));
        }
        debug!(filename, sources = schema.sources.len(), "Created RRD file");
        Ok(())
    }

    fn name(&self) -> &str {
        "rrdtool"
    }
}

// =============================================================================
// Mock Backend
// =============================================================================

/// A recorded backend invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RrdCall {
    /// An update batch.
    Update {
        /// Target file.
        filename: String,
        /// The tokens delivered, in order.
        tokens: Vec<String>,
    },
    /// A file creation.
    Create {
        /// Target file.
        filename: String,
    },
}

/// Recording backend for tests.
///
/// Creations touch an empty file on disk (so the write path's stat check
/// behaves as with a real backend); updates only record. Failure
/// injection covers the drop-batch-on-error path.
#[derive(Debug, Default)]
pub struct MockRrdBackend {
    calls: Mutex<Vec<RrdCall>>,
    fail_updates: AtomicBool,
    fail_next_update: AtomicBool,
}

impl MockRrdBackend {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent update fail.
    pub fn fail_all_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Makes only the next update fail.
    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<RrdCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded update batches.
    pub fn update_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, RrdCall::Update { .. }))
            .count()
    }

    /// The token batches recorded for one file, in delivery order.
    pub fn updates_for(&self, filename: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RrdCall::Update { filename: f, tokens } if f == filename => Some(tokens.clone()),
                _ => None,
            })
            .collect()
    }

    /// Filenames passed to `create`, in order.
    pub fn created_files(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RrdCall::Create { filename } => Some(filename.clone()),
                _ => None,
            })
            .collect()
    }

    /// Filenames updated, in delivery order (duplicates preserved).
    pub fn updated_files(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RrdCall::Update { filename, .. } => Some(filename.clone()),
                _ => None,
            })
            .collect()
    }
}

impl RrdBackend for MockRrdBackend {
    fn update(&self, filename: &str, tokens: &[String]) -> RrdResult<()> {
        if self.fail_updates.load(Ordering::SeqCst)
            || self.fail_next_update.swap(false, Ordering::SeqCst)
        {
            return Err(RrdError::update_failed(filename, "injected failure"));
        }
        self.calls.lock().push(RrdCall::Update {
            filename: filename.to_string(),
            tokens: tokens.to_vec(),
        });
        Ok(())
    }

    fn create(
        &self,
        filename: &str,
        _schema: &TypeSchema,
        _sample: &Sample,
        _config: &CreateConfig,
    ) -> RrdResult<()> {
        if let Some(parent) = Path::new(filename).parent() {
            fs::create_dir_all(parent).map_err(|e| RrdError::io(parent, e))?;
        }
        fs::File::create(filename).map_err(|e| RrdError::io(filename, e))?;
        self.calls.lock().push(RrdCall::Create {
            filename: filename.to_string(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rrdsink_core::types::{DataSource, Value, ValueKind};

    fn sample() -> Sample {
        let mut s = Sample::new("h", "cpu", "cpu", 1_700_000_000, vec![Value::Counter(0)]);
        s.interval = 10;
        s
    }

    #[test]
    fn test_update_args_prepend() {
        let tokens = vec!["100:1".to_string(), "110:2".to_string()];
        let args = update_args("/d/h/cpu/cpu.rrd", &tokens);
        assert_eq!(args[0], "update");
        assert_eq!(args[1], "/d/h/cpu/cpu.rrd");
        assert_eq!(&args[2..], ["100:1", "110:2"]);
    }

    #[test]
    fn test_create_args_ds_lines() {
        let schema = TypeSchema::new(
            "if_octets",
            vec![
                DataSource::bounded("rx", ValueKind::Counter, Some(0.0), None),
                DataSource::new("tx", ValueKind::Counter),
            ],
        );
        let config = CreateConfig {
            step_size: 10,
            heartbeat: 25,
            ..Default::default()
        };
        let args = create_args("a.rrd", &schema, &sample(), &config);

        assert!(args.contains(&"DS:rx:COUNTER:25:0:U".to_string()));
        assert!(args.contains(&"DS:tx:COUNTER:25:U:U".to_string()));
    }

    #[test]
    fn test_create_args_step_defaults_to_interval() {
        let schema = TypeSchema::single("cpu", ValueKind::Counter);
        let config = CreateConfig::default();
        let args = create_args("a.rrd", &schema, &sample(), &config);

        let step_pos = args.iter().position(|a| a == "--step").unwrap();
        assert_eq!(args[step_pos + 1], "10");
        // Heartbeat defaults to twice the step.
        assert!(args.iter().any(|a| a.starts_with("DS:value:COUNTER:20:")));
    }

    #[test]
    fn test_create_args_rra_per_timespan() {
        let schema = TypeSchema::single("cpu", ValueKind::Gauge);
        let config = CreateConfig {
            step_size: 10,
            rra_timespans: vec![3600, 86_400],
            ..Default::default()
        };
        let args = create_args("a.rrd", &schema, &sample(), &config);

        let rra_count = args.iter().filter(|a| a.starts_with("RRA:")).count();
        assert_eq!(rra_count, 6); // AVERAGE/MIN/MAX for each timespan

        // An hour at a 10s step fits in 1200 rows unconsolidated.
        assert!(args.contains(&"RRA:AVERAGE:0.1:1:360".to_string()));
    }

    #[test]
    fn test_mock_records_updates_in_order() {
        let mock = MockRrdBackend::new();
        mock.update("a.rrd", &["1:1".to_string()]).unwrap();
        mock.update("b.rrd", &["2:2".to_string()]).unwrap();
        mock.update("a.rrd", &["3:3".to_string()]).unwrap();

        assert_eq!(mock.update_count(), 3);
        assert_eq!(mock.updated_files(), vec!["a.rrd", "b.rrd", "a.rrd"]);
        assert_eq!(
            mock.updates_for("a.rrd"),
            vec![vec!["1:1".to_string()], vec!["3:3".to_string()]]
        );
    }

    #[test]
    fn test_mock_failure_injection() {
        let mock = MockRrdBackend::new();

        mock.fail_next_update();
        assert!(mock.update("a.rrd", &[]).is_err());
        assert!(mock.update("a.rrd", &[]).is_ok());

        mock.fail_all_updates(true);
        assert!(mock.update("a.rrd", &[]).is_err());
        assert!(mock.update("a.rrd", &[]).is_err());
        mock.fail_all_updates(false);
        assert!(mock.update("a.rrd", &[]).is_ok());
    }

    #[test]
    fn test_mock_create_touches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h/cpu/cpu.rrd");
        let filename = path.to_str().unwrap();

        let mock = MockRrdBackend::new();
        let schema = TypeSchema::single("cpu", ValueKind::Counter);
        mock.create(filename, &schema, &sample(), &CreateConfig::default())
            .unwrap();

        assert!(path.is_file());
        assert_eq!(mock.created_files(), vec![filename.to_string()]);
    }
}
