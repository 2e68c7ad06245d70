//! Development-time tracing for tests and demos.
//!
//! The library only emits `tracing` events; applications embedding it
//! install their own subscriber. This helper wires a stderr subscriber
//! for test runs, honoring `RUST_LOG` (default `warn`).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize a stderr tracing subscriber.
///
/// Safe to call from multiple tests: later calls keep the first
/// subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=store=debug cargo test -p store
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
