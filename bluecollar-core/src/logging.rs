//! Tracing setup, shared by every BlueCollar binary.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber.
///
/// Respects `RUST_LOG` when set. Otherwise falls back to `info`, or `debug`
/// when the `DEBUG` env var is truthy — mirroring the original source's
/// `logging.basicConfig(level=logging.DEBUG if os.environ.get('DEBUG') ...)`.
///
/// Call once, at the top of `main`, before any `tracing` macro fires.
pub fn init_tracing() {
    let default_filter = if crate::config::debug_enabled() {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.parse().unwrap()),
        )
        .init();
}
