// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The host-facing sink: one owned context tying the pipeline together.
//!
//! [`RrdSink`] owns the accumulator cache, the dispatch queue, the RRD
//! backend, and the writer thread. The host calls [`RrdSink::write`] for
//! every sample, [`RrdSink::flush`] to force data out early, and
//! [`RrdSink::shutdown`] to drain everything before exit.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rrdsink_buffer::{RrdSink, RrdToolBackend};
//! use rrdsink_config::SinkConfig;
//! use rrdsink_core::types::{Sample, TypeSchema, Value, ValueKind};
//!
//! let config = SinkConfig {
//!     data_dir: Some("/var/lib/rrd".to_string()),
//!     cache_timeout: 300,
//!     ..Default::default()
//! };
//! let sink = RrdSink::spawn(config, Arc::new(RrdToolBackend::new())).unwrap();
//!
//! let schema = TypeSchema::single("load", ValueKind::Gauge);
//! let sample = Sample::new("web01", "load", "load", 1_700_000_000, vec![Value::Gauge(0.42)]);
//! sink.write(&schema, &sample).unwrap();
//!
//! sink.shutdown().unwrap();
//! ```

use chrono::Utc;
use std::fs;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use rrdsink_config::SinkConfig;
use rrdsink_core::encode::{identifier_filename, sample_filename, update_token};
use rrdsink_core::error::{EncodeError, RrdError, SinkError, SinkResult};
use rrdsink_core::types::{Sample, TypeSchema};

use crate::cache::AccumulatorCache;
use crate::queue::DispatchQueue;
use crate::rrd::RrdBackend;
use crate::stats::{SinkStats, SinkStatsInner};
use crate::writer::{self, WriterContext};

// =============================================================================
// RrdSink
// =============================================================================

/// The write-coalescing RRD sink.
///
/// One instance per process is the expected deployment; the sink is the
/// single owned context behind the host's write/flush/shutdown hooks.
#[derive(Debug)]
pub struct RrdSink {
    cache: Arc<AccumulatorCache>,
    queue: Arc<DispatchQueue>,
    backend: Arc<dyn RrdBackend>,
    stats: Arc<SinkStatsInner>,
    config: SinkConfig,
    writer: Option<JoinHandle<()>>,
}

impl RrdSink {
    /// Normalizes the configuration, creates the cache, and spawns the
    /// writer thread.
    pub fn spawn(config: SinkConfig, backend: Arc<dyn RrdBackend>) -> SinkResult<Self> {
        let config = config.normalized();
        let now = Utc::now().timestamp();

        let cache = Arc::new(AccumulatorCache::new(
            config.cache_timeout,
            config.cache_flush,
            now,
        ));
        let queue = Arc::new(DispatchQueue::new());
        let stats = Arc::new(SinkStatsInner::new());

        let ctx = WriterContext {
            cache: cache.clone(),
            queue: queue.clone(),
            backend: backend.clone(),
            stats: stats.clone(),
        };
        let writer = thread::Builder::new()
            .name("rrdsink-writer".to_string())
            .spawn(move || writer::run(ctx))
            .map_err(SinkError::init)?;

        info!(
            cache_timeout = config.cache_timeout,
            cache_flush = config.cache_flush,
            data_dir = config.data_dir.as_deref().unwrap_or("."),
            backend = backend.name(),
            "rrdsink started"
        );

        Ok(Self {
            cache,
            queue,
            backend,
            stats,
            config,
            writer: Some(writer),
        })
    }

    /// Accepts one sample: checks it against its schema, materializes the
    /// target file if this is its first sight, and buffers the encoded
    /// update token.
    pub fn write(&self, schema: &TypeSchema, sample: &Sample) -> SinkResult<()> {
        if schema.name != sample.type_name {
            return Err(EncodeError::schema_mismatch(format!(
                "sample type '{}' does not match schema '{}'",
                sample.type_name, schema.name
            ))
            .into());
        }

        let filename = sample_filename(self.config.data_dir.as_deref(), sample)?;
        let token = update_token(schema, sample)?;

        match fs::metadata(&filename) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(RrdError::not_regular_file(&filename).into()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.warn_interval_conflicts(sample);
                self.backend
                    .create(&filename, schema, sample, &self.config.create)?;
                self.stats.record_file_created();
            }
            Err(e) => return Err(RrdError::io(&filename, e).into()),
        }

        let now = Utc::now().timestamp();
        self.cache
            .insert(&self.queue, &filename, token, sample.time, now, &self.stats)?;
        Ok(())
    }

    /// Forces buffered data toward disk.
    ///
    /// Without an identifier, sweeps the whole cache: every unqueued
    /// entry at least `age_threshold` seconds old is queued. With an
    /// identifier (the relative `host/plugin[-pi]/type[-ti]` path), the
    /// named file is promoted to the head of the queue or front-inserted.
    /// Flushing after shutdown is a successful no-op.
    pub fn flush(&self, age_threshold: i64, identifier: Option<&str>) -> SinkResult<()> {
        let now = Utc::now().timestamp();
        match identifier {
            None => {
                self.cache.sweep(&self.queue, age_threshold, now, &self.stats);
                Ok(())
            }
            Some(id) => {
                let key = identifier_filename(self.config.data_dir.as_deref(), id);
                self.cache
                    .flush_identifier(&self.queue, age_threshold, &key, now)
                    .map_err(SinkError::from)
            }
        }
    }

    /// Two-phase drain: forces every buffered entry into the queue, then
    /// signals shutdown and waits for the writer to finish writing. No
    /// timeout; returns once everything queued has been pushed at the
    /// backend.
    pub fn shutdown(mut self) -> SinkResult<()> {
        info!("Draining rrdsink");
        let now = Utc::now().timestamp();
        self.cache.sweep(&self.queue, -1, now, &self.stats);
        self.queue.begin_shutdown();

        if let Some(handle) = self.writer.take() {
            if handle.join().is_err() {
                warn!("Writer thread panicked during drain");
            }
        }
        info!("rrdsink drained");
        Ok(())
    }

    /// Snapshot of the sink statistics.
    pub fn stats(&self) -> SinkStats {
        self.stats.snapshot()
    }

    /// The normalized configuration the sink runs with.
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Live cache entries.
    pub fn cache_entries(&self) -> usize {
        self.cache.entry_count()
    }

    /// Files currently awaiting the writer.
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    fn warn_interval_conflicts(&self, sample: &Sample) {
        if sample.interval == 0 {
            return;
        }
        let create = &self.config.create;
        if create.heartbeat > 0 && create.heartbeat < sample.interval {
            warn!(
                heartbeat = create.heartbeat,
                interval = sample.interval,
                "Configured heartbeat is smaller than the sample interval; gaps will be recorded as unknown"
            );
        } else if create.step_size > 0 && create.step_size < sample.interval {
            warn!(
                step_size = create.step_size,
                interval = sample.interval,
                "Configured step is smaller than the sample interval; files will be needlessly large"
            );
        }
    }
}

impl Drop for RrdSink {
    /// Drains what is already queued and stops the writer. Unlike
    /// [`RrdSink::shutdown`], buffered entries that never aged out are
    /// discarded.
    fn drop(&mut self) {
        if let Some(handle) = self.writer.take() {
            self.queue.begin_shutdown();
            let _ = handle.join();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrd::MockRrdBackend;
    use rrdsink_core::error::CacheError;
    use rrdsink_core::types::{Value, ValueKind};
    use std::time::{Duration, Instant};

    fn test_config(dir: &tempfile::TempDir, cache_timeout: u64) -> SinkConfig {
        SinkConfig {
            data_dir: Some(dir.path().to_str().unwrap().to_string()),
            cache_timeout,
            ..Default::default()
        }
    }

    fn gauge_sample(t: i64, v: f64) -> Sample {
        Sample::new("h", "load", "load", t, vec![Value::Gauge(v)])
    }

    fn load_schema() -> TypeSchema {
        TypeSchema::single("load", ValueKind::Gauge)
    }

    fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_write_creates_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockRrdBackend::new());
        let sink = RrdSink::spawn(test_config(&dir, 300), backend.clone()).unwrap();

        sink.write(&load_schema(), &gauge_sample(100, 0.1)).unwrap();
        sink.write(&load_schema(), &gauge_sample(101, 0.2)).unwrap();

        assert_eq!(backend.created_files().len(), 1);
        assert_eq!(sink.stats().files_created, 1);
        assert_eq!(sink.stats().samples_inserted, 2);
        assert_eq!(sink.cache_entries(), 1);
    }

    #[test]
    fn test_write_rejects_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let sink =
            RrdSink::spawn(test_config(&dir, 300), Arc::new(MockRrdBackend::new())).unwrap();

        let schema = TypeSchema::single("cpu", ValueKind::Gauge);
        let err = sink.write(&schema, &gauge_sample(100, 0.1)).unwrap_err();
        assert_eq!(err.error_type(), "schema_mismatch");
    }

    #[test]
    fn test_write_rejects_non_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink =
            RrdSink::spawn(test_config(&dir, 300), Arc::new(MockRrdBackend::new())).unwrap();

        // Occupy the target path with a directory.
        fs::create_dir_all(dir.path().join("h/load/load.rrd")).unwrap();

        let err = sink.write(&load_schema(), &gauge_sample(100, 0.1)).unwrap_err();
        assert_eq!(err.error_type(), "not_regular_file");
    }

    #[test]
    fn test_write_rejects_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink =
            RrdSink::spawn(test_config(&dir, 300), Arc::new(MockRrdBackend::new())).unwrap();

        sink.write(&load_schema(), &gauge_sample(100, 0.1)).unwrap();
        let err = sink.write(&load_schema(), &gauge_sample(99, 0.2)).unwrap_err();
        assert_eq!(err.error_type(), "out_of_order");
        assert_eq!(sink.stats().samples_rejected, 1);
    }

    #[test]
    fn test_zero_timeout_writes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockRrdBackend::new());
        let sink = RrdSink::spawn(test_config(&dir, 0), backend.clone()).unwrap();

        sink.write(&load_schema(), &gauge_sample(100, 0.1)).unwrap();

        assert!(
            wait_until(Duration::from_secs(2), || backend.update_count() == 1),
            "writer never delivered the batch"
        );
        let expected = dir
            .path()
            .join("h/load/load.rrd")
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(backend.updates_for(&expected), vec![vec!["100:0.1".to_string()]]);
    }

    #[test]
    fn test_flush_unknown_identifier_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink =
            RrdSink::spawn(test_config(&dir, 300), Arc::new(MockRrdBackend::new())).unwrap();

        let err = sink.flush(0, Some("h/cpu/cpu")).unwrap_err();
        assert!(matches!(
            err,
            SinkError::Cache(CacheError::NotFound { .. })
        ));
    }

    #[test]
    fn test_flush_identifier_rebuilds_key_under_datadir() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockRrdBackend::new());
        let sink = RrdSink::spawn(test_config(&dir, 300), backend.clone()).unwrap();

        sink.write(&load_schema(), &gauge_sample(100, 0.1)).unwrap();

        // The identifier is relative; the sink restores the datadir prefix.
        sink.flush(0, Some("h/load/load")).unwrap();

        assert!(
            wait_until(Duration::from_secs(2), || backend.update_count() == 1),
            "flushed batch never delivered"
        );
    }

    #[test]
    fn test_shutdown_drains_buffered_entries() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockRrdBackend::new());
        let sink = RrdSink::spawn(test_config(&dir, 300), backend.clone()).unwrap();

        let schema = load_schema();
        for (plugin, v) in [("a", 0.1), ("b", 0.2), ("c", 0.3)] {
            let mut sample = gauge_sample(100, v);
            sample.plugin = plugin.to_string();
            sink.write(&schema, &sample).unwrap();
        }
        // Nothing aged out yet; everything still buffered.
        assert_eq!(backend.update_count(), 0);

        sink.shutdown().unwrap();

        // All three batches written before shutdown returned.
        assert_eq!(backend.update_count(), 3);
    }

    #[test]
    fn test_shutdown_with_empty_cache_returns_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockRrdBackend::new());
        let sink = RrdSink::spawn(test_config(&dir, 300), backend.clone()).unwrap();

        sink.shutdown().unwrap();
        assert_eq!(backend.update_count(), 0);
    }
}
