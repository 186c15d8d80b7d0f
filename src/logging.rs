//! Helpers for installing a `tracing` subscriber.
//!
//! The library only emits events; binaries and tests decide whether to
//! print them.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging at `info`, overridable through `RUST_LOG`.
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `level` - Log level (trace, debug, info, warn, error)
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Verbose subscriber routed through the test harness's captured output.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
