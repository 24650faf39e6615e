// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Common test utilities.

pub mod builders;
pub mod fixtures;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Opt-in tracing output for debugging a failing test.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_logging() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
