//! Diagnostic logging to stderr; stdout carries command output only.

use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `AP_LOADER_LOG=debug` or `AP_LOADER_LOG=aploader=trace`
pub const LOG_ENV: &str = "AP_LOADER_LOG";

const DEFAULT_FILTER: &str = "warn";

pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
