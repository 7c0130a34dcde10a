//! C ABI for sampling the memory usage of the current process.
//!
//! This is the boundary used by timing libraries written in C or Fortran. The first call, to either
//! [`memprobe_initialize`] or [`memprobe_get_memusage`], initializes logging and loads the probe configuration:
//!
//! - `MEMPROBE_CONFIG_FILE`: optional path to a YAML configuration file
//! - `MEMPROBE_*`: environment overrides, such as `MEMPROBE_STAT_SOURCE=accounting`
//! - `MEMPROBE_LOG_LEVEL`: log filtering directives (default: `warn`)
//!
//! Every function returns `0` on success and `-1` on failure. Failures are logged.

use std::{ffi::c_int, sync::OnceLock};

use memprobe_config::ConfigurationLoader;
use memprobe_error::{ErrorContext as _, GenericError};
use process_memory::{ProbeConfiguration, Querier};
use tracing::{debug, error, warn};

pub mod logging;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "MEMPROBE";

/// Environment variable holding the path to an optional YAML configuration file.
pub const CONFIG_FILE_ENV: &str = "MEMPROBE_CONFIG_FILE";

const SUCCESS: c_int = 0;
const FAILURE: c_int = -1;

static QUERIER: OnceLock<Option<Querier>> = OnceLock::new();

fn global_querier() -> Option<&'static Querier> {
    QUERIER
        .get_or_init(|| {
            logging::initialize_logging();

            match load_configuration() {
                Ok(config) => {
                    debug!(?config, "Loaded memory probe configuration.");
                    Some(Querier::from_configuration(&config))
                }
                Err(e) => {
                    error!(error = ?e, "Failed to load memory probe configuration. Memory usage will not be sampled.");
                    None
                }
            }
        })
        .as_ref()
}

fn load_configuration() -> Result<ProbeConfiguration, GenericError> {
    let mut loader = ConfigurationLoader::default();
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        loader = loader
            .from_yaml(&path)
            .with_error_context(|| format!("Failed to load configuration file '{}'.", path))?;
    }

    loader
        .from_environment(ENV_PREFIX)
        .error_context("Failed to read configuration from the environment.")?
        .into_typed()
        .error_context("Failed to parse memory probe configuration.")
}

/// Initializes logging and loads the memory probe configuration.
///
/// Calling this is optional, as the first sample does the same, but it surfaces configuration errors up front. Calling
/// it more than once has no further effect.
///
/// Returns `0` if the probe is ready to sample, and `-1` otherwise.
#[no_mangle]
pub extern "C" fn memprobe_initialize() -> c_int {
    match global_querier() {
        Some(_) => SUCCESS,
        None => FAILURE,
    }
}

/// Samples the memory usage of the current process.
///
/// On success, `0` is returned and all five outputs are written. Any value that is unavailable on the current platform
/// is written as `-1`, and values too large for a 32-bit integer are clamped to `i32::MAX`.
///
/// On failure, `-1` is returned and none of the outputs are written.
///
/// # Safety
///
/// Each pointer must either be null, which causes a failure, or be valid for writing a single `int32_t`.
#[no_mangle]
pub unsafe extern "C" fn memprobe_get_memusage(
    size: *mut i32, resident: *mut i32, shared: *mut i32, text: *mut i32, data_stack: *mut i32,
) -> c_int {
    match global_querier() {
        // SAFETY: The caller upholds the pointer requirements, which we pass through unchanged.
        Some(querier) => unsafe { write_sample(querier, [size, resident, shared, text, data_stack]) },
        None => FAILURE,
    }
}

/// Samples memory usage with `querier` and writes the five fields to `outputs`, in order.
///
/// # Safety
///
/// Each pointer must either be null, which causes a failure, or be valid for writing a single `i32`.
unsafe fn write_sample(querier: &Querier, outputs: [*mut i32; 5]) -> c_int {
    if outputs.iter().any(|output| output.is_null()) {
        warn!("Null output pointer passed when sampling memory usage.");
        return FAILURE;
    }

    match querier.sample() {
        Ok(usage) => {
            for (output, (_, value)) in outputs.into_iter().zip(usage.fields()) {
                // SAFETY: The pointer is non-null, and the caller guarantees it's valid for writes.
                unsafe { output.write(saturating_i32(value)) };
            }
            SUCCESS
        }
        Err(e) => {
            warn!(error = %e, "Failed to sample memory usage.");
            FAILURE
        }
    }
}

/// Sample fields are never below `-1`, so only the upper bound needs clamping.
fn saturating_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
