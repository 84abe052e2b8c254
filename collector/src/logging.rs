//! Diagnostics tracing for the collector binary.
//!
//! Reads `RUST_LOG`; defaults to `warn`, which is where the reporter logs
//! swallowed transport faults. Output goes to stderr in compact form.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=collector=debug collector replay events.jsonl
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
