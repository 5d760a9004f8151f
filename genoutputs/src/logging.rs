//! Diagnostic tracing for the campaign runner.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. It is separate
//! from the output log (`io/output_log`), which is the product artifact and
//! is always written in full regardless of the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info` so seed-corpus decisions and
/// campaign milestones are visible. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=genoutputs=debug genoutputs -L gen3.jsonl < modules.txt
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
