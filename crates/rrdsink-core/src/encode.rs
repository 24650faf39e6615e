// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Sample encoding: canonical filenames and RRD update tokens.
//!
//! Two pure functions derive the on-disk identity and the wire form of a
//! sample:
//!
//! - [`sample_filename`] builds `{datadir/}host/plugin[-pi]/type[-ti].rrd`
//! - [`update_token`] builds `{time}:{v0}:{v1}:…`
//!
//! Both outputs are bounded at 512 bytes; an encoding that would exceed
//! the bound fails with [`EncodeError::Overflow`] instead of truncating.
//! Empty plugin/type instances suppress the `-instance` suffix entirely.

use crate::error::{EncodeError, EncodeResult};
use crate::types::{Sample, TypeSchema, Value};
use std::fmt::Write;

/// Upper bound on an encoded filename, in bytes.
pub const FILENAME_BUFFER_LEN: usize = 512;

/// Upper bound on an encoded update token, in bytes.
pub const UPDATE_BUFFER_LEN: usize = 512;

// =============================================================================
// Filename Encoding
// =============================================================================

/// Derives the canonical RRD filename for a sample.
///
/// The layout is `{datadir/}host/plugin[-plugin_instance]/type[-type_instance].rrd`.
/// Equal samples always produce byte-equal filenames; this string is the
/// identity of a file across the cache and the dispatch queue.
///
/// # Examples
///
/// ```
/// use rrdsink_core::encode::sample_filename;
/// use rrdsink_core::types::{Sample, Value};
///
/// let mut sample = Sample::new("h", "cpu", "cpu", 100, vec![Value::Counter(0)]);
/// sample.type_instance = "0".to_string();
/// let name = sample_filename(Some("/var/lib/rrd"), &sample).unwrap();
/// assert_eq!(name, "/var/lib/rrd/h/cpu/cpu-0.rrd");
/// ```
pub fn sample_filename(data_dir: Option<&str>, sample: &Sample) -> EncodeResult<String> {
    let mut out = String::with_capacity(128);

    if let Some(dir) = data_dir {
        out.push_str(dir);
        out.push('/');
    }

    out.push_str(&sample.host);
    out.push('/');

    out.push_str(&sample.plugin);
    if !sample.plugin_instance.is_empty() {
        out.push('-');
        out.push_str(&sample.plugin_instance);
    }
    out.push('/');

    out.push_str(&sample.type_name);
    if !sample.type_instance.is_empty() {
        out.push('-');
        out.push_str(&sample.type_instance);
    }
    out.push_str(".rrd");

    if out.len() > FILENAME_BUFFER_LEN {
        return Err(EncodeError::overflow(
            "filename",
            out.len(),
            FILENAME_BUFFER_LEN,
        ));
    }
    Ok(out)
}

/// Reconstructs the full cache key for a flush identifier.
///
/// Targeted flushes name files by the relative identifier
/// `host/plugin[-pi]/type[-ti]`; the cache key is that identifier under
/// the data directory with the `.rrd` suffix restored.
pub fn identifier_filename(data_dir: Option<&str>, identifier: &str) -> String {
    match data_dir {
        Some(dir) => format!("{}/{}.rrd", dir, identifier),
        None => format!("{}.rrd", identifier),
    }
}

// =============================================================================
// Update Token Encoding
// =============================================================================

/// Renders a sample into the colon-separated update token consumed by
/// the RRD library: `{unix_seconds}:{v0}:{v1}:…`.
///
/// Counters render as unsigned decimal, gauges in default floating-point
/// form. Every value is checked against its schema slot: a slot kind the
/// encoder cannot render fails with [`EncodeError::UnsupportedType`], and
/// a value whose kind disagrees with its slot (or a value-count mismatch)
/// fails with [`EncodeError::SchemaMismatch`].
///
/// # Examples
///
/// ```
/// use rrdsink_core::encode::update_token;
/// use rrdsink_core::types::{Sample, TypeSchema, Value, ValueKind};
///
/// let schema = TypeSchema::single("cpu", ValueKind::Counter);
/// let sample = Sample::new("h", "cpu", "cpu", 100, vec![Value::Counter(42)]);
/// assert_eq!(update_token(&schema, &sample).unwrap(), "100:42");
/// ```
pub fn update_token(schema: &TypeSchema, sample: &Sample) -> EncodeResult<String> {
    if schema.sources.len() != sample.values.len() {
        return Err(EncodeError::schema_mismatch(format!(
            "schema '{}' has {} sources but sample carries {} values",
            schema.name,
            schema.sources.len(),
            sample.values.len()
        )));
    }

    let mut out = String::with_capacity(32);
    write!(out, "{}", sample.time).expect("writing to a String cannot fail");

    for (source, value) in schema.sources.iter().zip(sample.values.iter()) {
        if !source.kind.is_encodable() {
            return Err(EncodeError::unsupported_type(&source.name, source.kind));
        }
        if value.kind() != source.kind {
            return Err(EncodeError::schema_mismatch(format!(
                "source '{}' is {} but value is {}",
                source.name,
                source.kind,
                value.kind()
            )));
        }
        match value {
            Value::Counter(c) => write!(out, ":{}", c),
            Value::Gauge(g) => write!(out, ":{}", g),
            // Unreachable past the kind checks above, but keeps the match
            // total if new kinds become encodable.
            Value::Derive(d) => write!(out, ":{}", d),
            Value::Absolute(a) => write!(out, ":{}", a),
        }
        .expect("writing to a String cannot fail");
    }

    if out.len() > UPDATE_BUFFER_LEN {
        return Err(EncodeError::overflow(
            "update token",
            out.len(),
            UPDATE_BUFFER_LEN,
        ));
    }
    Ok(out)
}

// =============================================================================
// Tests
// =============================================================================
