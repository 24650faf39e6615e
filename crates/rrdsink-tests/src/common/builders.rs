// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builder patterns for constructing samples and schemas with sensible
//! defaults and chainable methods.

use rrdsink_core::types::{DataSource, Sample, TypeSchema, Value, ValueKind};

// =============================================================================
// Sample Builder
// =============================================================================

/// Builder for [`Sample`] instances.
#[derive(Debug, Clone, Default)]
pub struct SampleBuilder {
    host: Option<String>,
    plugin: Option<String>,
    plugin_instance: String,
    type_name: Option<String>,
    type_instance: String,
    time: Option<i64>,
    interval: u64,
    values: Vec<Value>,
}

impl SampleBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the plugin.
    pub fn plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Set the plugin instance.
    pub fn plugin_instance(mut self, instance: impl Into<String>) -> Self {
        self.plugin_instance = instance.into();
        self
    }

    /// Set the type name.
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Set the type instance.
    pub fn type_instance(mut self, instance: impl Into<String>) -> Self {
        self.type_instance = instance.into();
        self
    }

    /// Set the observation time (unix seconds).
    pub fn time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// Set the collection interval.
    pub fn interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Append a gauge value.
    pub fn gauge(mut self, v: f64) -> Self {
        self.values.push(Value::Gauge(v));
        self
    }

    /// Append a counter value.
    pub fn counter(mut self, v: u64) -> Self {
        self.values.push(Value::Counter(v));
        self
    }

    /// Append an arbitrary value.
    pub fn value(mut self, v: Value) -> Self {
        self.values.push(v);
        self
    }

    /// Build the sample.
    ///
    /// # Panics
    /// Panics if host, plugin, type_name, or time are not set.
    pub fn build(self) -> Sample {
        Sample {
            host: self.host.expect("host is required"),
            plugin: self.plugin.expect("plugin is required"),
            plugin_instance: self.plugin_instance,
            type_name: self.type_name.expect("type_name is required"),
            type_instance: self.type_instance,
            time: self.time.expect("time is required"),
            interval: self.interval,
            values: self.values,
        }
    }
}

// =============================================================================
// Schema Builder
// =============================================================================

/// Builder for [`TypeSchema`] instances.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    name: Option<String>,
    sources: Vec<DataSource>,
}

impl SchemaBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the type name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a gauge source.
    pub fn gauge_source(mut self, name: impl Into<String>) -> Self {
        self.sources.push(DataSource::new(name, ValueKind::Gauge));
        self
    }

    /// Append a counter source.
    pub fn counter_source(mut self, name: impl Into<String>) -> Self {
        self.sources.push(DataSource::new(name, ValueKind::Counter));
        self
    }

    /// Append an arbitrary source.
    pub fn source(mut self, source: DataSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Build the schema.
    ///
    /// # Panics
    /// Panics if the name is not set.
    pub fn build(self) -> TypeSchema {
        TypeSchema::new(self.name.expect("name is required"), self.sources)
    }
}

// =============================================================================
// Tests
// =============================================================================
