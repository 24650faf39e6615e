// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for rrdsink.
//!
//! This module provides the metric-agnostic types that flow through the
//! write path: typed sample values, the data-source schema that names each
//! value slot, and the sample itself.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Value Kinds
// =============================================================================

/// The kind of a data source.
///
/// Only [`ValueKind::Counter`] and [`ValueKind::Gauge`] can be rendered
/// into an RRD update token; the remaining kinds exist in the metric type
/// system and are refused by the encoder.
///
/// # Examples
///
/// ```
/// use rrdsink_core::types::ValueKind;
///
/// assert!(ValueKind::Gauge.is_encodable());
/// assert!(!ValueKind::Derive.is_encodable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Monotonically increasing unsigned counter.
    Counter,

    /// Free-floating measurement.
    Gauge,

    /// Signed rate-of-change source.
    Derive,

    /// Counter that resets on every read.
    Absolute,
}

impl ValueKind {
    /// Returns the canonical uppercase name used in RRD data-source
    /// definitions.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Counter => "COUNTER",
            ValueKind::Gauge => "GAUGE",
            ValueKind::Derive => "DERIVE",
            ValueKind::Absolute => "ABSOLUTE",
        }
    }

    /// Returns `true` if the update-token encoder can render this kind.
    #[inline]
    pub fn is_encodable(&self) -> bool {
        matches!(self, ValueKind::Counter | ValueKind::Gauge)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Values
// =============================================================================

/// A single typed sample value.
///
/// # Examples
///
/// ```
/// use rrdsink_core::types::{Value, ValueKind};
///
/// let v = Value::Gauge(0.25);
/// assert_eq!(v.kind(), ValueKind::Gauge);
/// assert_eq!(v.as_gauge(), Some(0.25));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// Unsigned 64-bit counter reading.
    Counter(u64),

    /// IEEE-754 double gauge reading.
    Gauge(f64),

    /// Signed 64-bit derive reading.
    Derive(i64),

    /// Unsigned 64-bit absolute reading.
    Absolute(u64),
}

impl Value {
    /// Returns the kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Counter(_) => ValueKind::Counter,
            Value::Gauge(_) => ValueKind::Gauge,
            Value::Derive(_) => ValueKind::Derive,
            Value::Absolute(_) => ValueKind::Absolute,
        }
    }

    /// Returns the counter reading, if this is a counter.
    #[inline]
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            Value::Counter(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns the gauge reading, if this is a gauge.
    #[inline]
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            Value::Gauge(g) => Some(*g),
            _ => None,
        }
    }
}

// =============================================================================
// Type Schemas
// =============================================================================

/// A named value slot within a metric type.
///
/// The optional `min`/`max` bounds are consumed by file creation and are
/// rendered as `U` (unknown) when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    /// Slot name, e.g. `"value"` or `"rx"`.
    pub name: String,

    /// Slot kind.
    pub kind: ValueKind,

    /// Lower bound accepted by the data source.
    #[serde(default)]
    pub min: Option<f64>,

    /// Upper bound accepted by the data source.
    #[serde(default)]
    pub max: Option<f64>,
}

impl DataSource {
    /// Creates an unbounded data source.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            min: None,
            max: None,
        }
    }

    /// Creates a data source with explicit bounds.
    pub fn bounded(
        name: impl Into<String>,
        kind: ValueKind,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            min,
            max,
        }
    }
}

/// The schema of a metric type: its name and the ordered list of value
/// slots every sample of that type must carry.
///
/// # Examples
///
/// ```
/// use rrdsink_core::types::{TypeSchema, ValueKind};
///
/// let schema = TypeSchema::single("cpu", ValueKind::Counter);
/// assert_eq!(schema.sources.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Type name, e.g. `"cpu"` or `"if_octets"`.
    pub name: String,

    /// Ordered value slots.
    pub sources: Vec<DataSource>,
}

impl TypeSchema {
    /// Creates a schema from its parts.
    pub fn new(name: impl Into<String>, sources: Vec<DataSource>) -> Self {
        Self {
            name: name.into(),
            sources,
        }
    }

    /// Creates a single-slot schema whose only source is named `"value"`.
    pub fn single(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            sources: vec![DataSource::new("value", kind)],
        }
    }
}

// =============================================================================
// Samples
// =============================================================================

/// One timestamped observation for a metric instance.
///
/// `plugin_instance` and `type_instance` use the empty string to mean
/// "absent"; an absent instance suppresses the `-instance` suffix in the
/// derived filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Originating host.
    pub host: String,

    /// Plugin that produced the sample.
    pub plugin: String,

    /// Plugin instance; empty when the plugin has a single instance.
    #[serde(default)]
    pub plugin_instance: String,

    /// Metric type name; must agree with the schema on the write path.
    pub type_name: String,

    /// Type instance; empty when the type has a single instance.
    #[serde(default)]
    pub type_instance: String,

    /// Observation time in unix seconds.
    pub time: i64,

    /// Collection interval in seconds; consumed by file creation for
    /// step and heartbeat defaulting.
    #[serde(default)]
    pub interval: u64,

    /// Ordered values, one per schema slot.
    pub values: Vec<Value>,
}

impl Sample {
    /// Creates a sample with no instances and a zero interval.
    pub fn new(
        host: impl Into<String>,
        plugin: impl Into<String>,
        type_name: impl Into<String>,
        time: i64,
        values: Vec<Value>,
    ) -> Self {
        Self {
            host: host.into(),
            plugin: plugin.into(),
            plugin_instance: String::new(),
            type_name: type_name.into(),
            type_instance: String::new(),
            time,
            interval: 0,
            values,
        }
    }

    /// Returns the relative identifier `host/plugin[-pi]/type[-ti]` used
    /// by targeted flushes.
    pub fn identifier(&self) -> String {
        let mut id = String::with_capacity(64);
        id.push_str(&self.host);
        id.push('/');
        id.push_str(&self.plugin);
        if !self.plugin_instance.is_empty() {
            id.push('-');
            id.push_str(&self.plugin_instance);
        }
        id.push('/');
        id.push_str(&self.type_name);
        if !self.type_instance.is_empty() {
            id.push('-');
            id.push_str(&self.type_instance);
        }
        id
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identifier(), self.time)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind_names() {
        assert_eq!(ValueKind::Counter.as_str(), "COUNTER");
        assert_eq!(ValueKind::Gauge.as_str(), "GAUGE");
        assert_eq!(ValueKind::Derive.as_str(), "DERIVE");
        assert_eq!(ValueKind::Absolute.as_str(), "ABSOLUTE");
    }

    #[test]
    fn test_value_kind_encodable() {
        assert!(ValueKind::Counter.is_encodable());
        assert!(ValueKind::Gauge.is_encodable());
        assert!(!ValueKind::Derive.is_encodable());
        assert!(!ValueKind::Absolute.is_encodable());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Counter(42).as_counter(), Some(42));
        assert_eq!(Value::Counter(42).as_gauge(), None);
        assert_eq!(Value::Gauge(1.5).as_gauge(), Some(1.5));
        assert_eq!(Value::Gauge(1.5).kind(), ValueKind::Gauge);
        assert_eq!(Value::Derive(-3).kind(), ValueKind::Derive);
    }

    #[test]
    fn test_schema_single() {
        let schema = TypeSchema::single("load", ValueKind::Gauge);
        assert_eq!(schema.name, "load");
        assert_eq!(schema.sources.len(), 1);
        assert_eq!(schema.sources[0].name, "value");
    }

    #[test]
    fn test_sample_identifier_without_instances() {
        let s = Sample::new("h", "cpu", "cpu", 100, vec![Value::Gauge(1.0)]);
        assert_eq!(s.identifier(), "h/cpu/cpu");
    }

    #[test]
    fn test_sample_identifier_with_instances() {
        let mut s = Sample::new("web01", "cpu", "cpu", 100, vec![Value::Counter(5)]);
        s.plugin_instance = "0".to_string();
        s.type_instance = "idle".to_string();
        assert_eq!(s.identifier(), "web01/cpu-0/cpu-idle");
    }

    #[test]
    fn test_sample_display() {
        let s = Sample::new("h", "load", "load", 1234, vec![Value::Gauge(0.1)]);
        assert_eq!(s.to_string(), "h/load/load@1234");
    }

    #[test]
    fn test_data_source_bounds() {
        let ds = DataSource::bounded("rx", ValueKind::Counter, Some(0.0), None);
        assert_eq!(ds.min, Some(0.0));
        assert_eq!(ds.max, None);
    }
}
