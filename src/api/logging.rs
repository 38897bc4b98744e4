// Process-wide tracing subscriber setup for embedders that have none of their own.
use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Call it once at startup from a binary or test harness that embeds the scan
/// engine and has no subscriber of its own; the `scan_unit` spans and the
/// skip/close warnings are only visible with one installed. Does nothing if a
/// global subscriber is already installed.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
