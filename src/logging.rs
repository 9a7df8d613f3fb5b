//! Logging setup helpers.
//!
//! Thin wrappers around `tracing-subscriber` so hosts and tests can enable
//! structured logging in one call. Library code itself only emits `tracing`
//! events and never installs a subscriber.

use tracing_subscriber::EnvFilter;

/// Initializes a global tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    init_with_filter("info");
}

/// Initializes a global tracing subscriber with an explicit default filter.
///
/// `RUST_LOG` still overrides the default when set. Safe to call more than
/// once; subsequent calls are no-ops.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
