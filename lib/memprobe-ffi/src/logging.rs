//! Logging.

use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filtering directives.
pub const LOG_LEVEL_ENV: &str = "MEMPROBE_LOG_LEVEL";

/// Initializes the logging subsystem for `tracing`.
///
/// Log filtering directives are read from `MEMPROBE_LOG_LEVEL`, defaulting to `WARN` when unset or invalid. Logs are
/// written to standard error in a compact, uncolored format, since the host program may well be redirecting it to a
/// file.
///
/// If a global subscriber has already been installed, such as when embedded in a Rust program that set up its own
/// logging, that subscriber is left in place.
pub fn initialize_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_LEVEL_ENV)
        .from_env_lossy();

    let result = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init();

    if result.is_err() {
        debug!("Global subscriber already installed. Leaving it in place.");
    }
}
