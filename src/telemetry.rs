//! Tracing subscriber setup for hosts.
//!
//! - `LOG_LEVEL` controls the filter (e.g. `"debug"` or
//!   `"info,lesson_pipeline=debug,reqwest=warn"`).
//! - `LOG_FORMAT` selects `"pretty"` (default) or `"json"` structured logs.
//!
//! The library itself only emits events; call [`init_tracing`] once from a
//! binary to see them.

use tracing_subscriber::EnvFilter;

/// Filter used when `LOG_LEVEL` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info,lesson_pipeline=debug";

/// Install the global fmt subscriber. Logs go to stderr so stdout stays
/// reserved for rendered output.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().try_init(),
        _ => builder.try_init(),
    }
}
