//! Tracing subscriber setup (§4.10).
//!
//! One call at process start; every worker task logs through the global
//! subscriber installed here rather than constructing its own.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber` with an `EnvFilter` seeded from
/// `default_level` (typically the config file's `logLevel`), overridable by
/// `RUST_LOG` at runtime.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
