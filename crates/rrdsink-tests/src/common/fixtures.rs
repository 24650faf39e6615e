// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Canonical schemas and sample streams shared by the integration tests.

use rrdsink_core::types::{DataSource, Sample, TypeSchema, ValueKind};

use super::builders::SampleBuilder;

/// The single-counter `cpu` type.
pub fn cpu_schema() -> TypeSchema {
    TypeSchema::single("cpu", ValueKind::Counter)
}

/// The three-gauge `load` type.
pub fn load_schema() -> TypeSchema {
    TypeSchema::new(
        "load",
        vec![
            DataSource::new("shortterm", ValueKind::Gauge),
            DataSource::new("midterm", ValueKind::Gauge),
            DataSource::new("longterm", ValueKind::Gauge),
        ],
    )
}

/// The two-counter `if_octets` type with zero lower bounds.
pub fn if_octets_schema() -> TypeSchema {
    TypeSchema::new(
        "if_octets",
        vec![
            DataSource::bounded("rx", ValueKind::Counter, Some(0.0), None),
            DataSource::bounded("tx", ValueKind::Counter, Some(0.0), None),
        ],
    )
}

/// A stream of `count` single-gauge `cpu`-plugin samples for `host`,
/// one per second starting at `start`, with the gauge tracking the
/// sample index.
pub fn gauge_series(host: &str, type_instance: &str, start: i64, count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            SampleBuilder::new()
                .host(host)
                .plugin("cpu")
                .type_name("cpu_usage")
                .type_instance(type_instance)
                .time(start + i as i64)
                .interval(1)
                .gauge(i as f64)
                .build()
        })
        .collect()
}

/// The single-gauge schema matching [`gauge_series`].
pub fn gauge_series_schema() -> TypeSchema {
    TypeSchema::single("cpu_usage", ValueKind::Gauge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_series_is_monotonic() {
        let series = gauge_series("h", "0", 100, 5);
        assert_eq!(series.len(), 5);
        for window in series.windows(2) {
            assert!(window[0].time < window[1].time);
        }
        assert_eq!(series[0].identifier(), "h/cpu/cpu_usage-0");
    }

    #[test]
    fn test_schemas_match_their_names() {
        assert_eq!(cpu_schema().name, "cpu");
        assert_eq!(load_schema().sources.len(), 3);
        assert_eq!(if_octets_schema().sources[0].min, Some(0.0));
    }
}
