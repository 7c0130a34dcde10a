//! Process memory querying.
//!
//! This crate provides a cross-platform way to sample the memory footprint of the current process: virtual size,
//! resident set size, shared pages, text size, and data/stack size.
//!
//! ## Linux
//!
//! On Linux, [procfs](https://docs.kernel.org/filesystems/proc.html) is used, and `/proc/<pid>/statm` is read. All five
//! values are reported, in units of pages.
//!
//! ## Other Unix platforms
//!
//! On other Unix platforms, `getrusage(2)` is used. Only the maximum resident set size is reported, and every other
//! value is [`UNAVAILABLE`]. The unit of the resident set size depends on the platform: bytes on macOS and iOS,
//! kilobytes everywhere else.
//!
//! ## Windows
//!
//! On Windows, the process memory counters are queried, and the peak working set size is reported as the resident set
//! size, in bytes.

use std::{io, path::PathBuf};

use snafu::{ResultExt as _, Snafu};
use tracing::debug;

mod accounting;
pub use self::accounting::{ResourceAccounting, ResourceUsage, SystemAccounting};

mod config;
pub use self::config::{ProbeConfiguration, StatSourceKind};

mod statm;

#[cfg(target_os = "windows")]
mod windows;

/// Value reported for any field that cannot be determined on the current platform.
pub const UNAVAILABLE: i64 = -1;

/// Default root of the process pseudo-filesystem.
pub const DEFAULT_PROCFS_ROOT: &str = "/proc";

/// Unit of the values in a [`MemoryUsage`] sample.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Unit {
    /// Pages, as sized by the platform.
    Pages,

    /// Kilobytes (1024 bytes).
    Kilobytes,

    /// Bytes.
    Bytes,
}

/// A sample of the memory footprint of a process.
///
/// Every field is either a non-negative value in the given [`Unit`], or [`UNAVAILABLE`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryUsage {
    /// Total virtual memory size.
    pub size: i64,

    /// Resident set size.
    pub resident: i64,

    /// Resident shared pages.
    pub shared: i64,

    /// Text (code) size.
    pub text: i64,

    /// Data plus stack size.
    pub data_stack: i64,

    /// Unit of all of the above values.
    pub unit: Unit,
}

impl MemoryUsage {
    /// Returns the five fields as `(name, value)` pairs, in declaration order.
    pub fn fields(&self) -> [(&'static str, i64); 5] {
        [
            ("size", self.size),
            ("resident", self.resident),
            ("shared", self.shared),
            ("text", self.text),
            ("data_stack", self.data_stack),
        ]
    }
}

/// Memory usage sampling error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum ProbeError {
    /// The statistics file could not be opened.
    #[snafu(display("Failed to open memory statistics file '{}'.", path.display()))]
    OpenFailed {
        /// Path of the statistics file.
        path: PathBuf,

        /// Error source.
        source: io::Error,
    },

    /// The statistics file was opened, but could not be read.
    #[snafu(display("Failed to read memory statistics file '{}'.", path.display()))]
    ReadFailed {
        /// Path of the statistics file.
        path: PathBuf,

        /// Error source.
        source: io::Error,
    },

    /// The statistics file did not have the expected contents.
    #[snafu(display("Malformed memory statistics in '{}': {}", path.display(), reason))]
    MalformedStatistics {
        /// Path of the statistics file.
        path: PathBuf,

        /// What was wrong with the contents.
        reason: String,
    },

    /// The resource usage accounting call failed.
    #[snafu(display("Failed to query resource usage accounting."))]
    AccountingFailed {
        /// Error source.
        source: io::Error,
    },

    /// There is no way to query memory usage on this platform.
    #[snafu(display("Memory usage querying is not supported on this platform."))]
    Unsupported,
}

/// Where memory statistics are read from.
///
/// This is selected once, when building a [`Querier`], and never changes afterwards: a failure to read from the
/// selected source is reported as-is rather than retried against another source.
enum StatSource {
    /// `<root>/<pid>/statm`.
    Statm { root: PathBuf, strict: bool },

    /// The resource usage accounting call.
    Accounting {
        accounting: Box<dyn ResourceAccounting>,
        legacy_data_stack: bool,
    },

    Unsupported,
}

impl StatSource {
    fn detect(config: &ProbeConfiguration) -> Self {
        let kind = match config.stat_source {
            StatSourceKind::Auto => platform_default_source(),
            kind => kind,
        };

        match kind {
            StatSourceKind::Statm => StatSource::Statm {
                root: config.procfs_root.clone(),
                strict: config.strict_parsing,
            },
            StatSourceKind::Accounting => match SystemAccounting::new() {
                Some(accounting) => StatSource::Accounting {
                    accounting: Box::new(accounting),
                    legacy_data_stack: config.legacy_data_stack,
                },
                None => StatSource::Unsupported,
            },
            StatSourceKind::Auto => StatSource::Unsupported,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StatSource::Statm { .. } => "statm",
            StatSource::Accounting { .. } => "accounting",
            StatSource::Unsupported => "unsupported",
        }
    }
}

fn platform_default_source() -> StatSourceKind {
    if cfg!(any(target_os = "linux", target_os = "android")) {
        StatSourceKind::Statm
    } else if cfg!(any(unix, target_os = "windows")) {
        StatSourceKind::Accounting
    } else {
        StatSourceKind::Auto
    }
}

/// A memory usage querier.
///
/// Queriers are cheap to hold onto, and can be shared freely between threads: sampling takes `&self`, and every sample
/// opens (and closes) its own handle to the underlying statistics source.
pub struct Querier {
    source: StatSource,
}

impl Querier {
    /// Creates a new `Querier` based on the given configuration.
    pub fn from_configuration(config: &ProbeConfiguration) -> Self {
        let source = StatSource::detect(config);
        debug!(source = source.name(), "Selected memory statistics source.");

        Self { source }
    }

    /// Creates a new `Querier` that reads `<root>/<pid>/statm`.
    pub fn statm<P>(root: P, strict: bool) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            source: StatSource::Statm {
                root: root.into(),
                strict,
            },
        }
    }

    /// Creates a new `Querier` that uses the given resource usage accounting implementation.
    ///
    /// When `legacy_data_stack` is `true`, the data/stack size is derived from the integral data and stack sizes
    /// reported by the accounting call, rather than being reported as [`UNAVAILABLE`].
    pub fn accounting<A>(accounting: A, legacy_data_stack: bool) -> Self
    where
        A: ResourceAccounting + 'static,
    {
        Self {
            source: StatSource::Accounting {
                accounting: Box::new(accounting),
                legacy_data_stack,
            },
        }
    }

    /// Samples the memory usage of this process.
    ///
    /// # Errors
    ///
    /// If the statistics source cannot be opened, read, or parsed, or if the accounting call fails, an error is
    /// returned. No partial sample is ever returned.
    pub fn sample(&self) -> Result<MemoryUsage, ProbeError> {
        match &self.source {
            StatSource::Statm { root, strict } => {
                let path = statm::path_for_pid(root, std::process::id());
                statm::read_usage(&path, *strict)
            }
            StatSource::Accounting {
                accounting,
                legacy_data_stack,
            } => {
                let usage = accounting.resource_usage().context(AccountingFailed)?;
                Ok(usage.into_memory_usage(*legacy_data_stack))
            }
            StatSource::Unsupported => Err(ProbeError::Unsupported),
        }
    }
}

impl Default for Querier {
    fn default() -> Self {
        Self::from_configuration(&ProbeConfiguration::default())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    struct FixedAccounting(io::Result<ResourceUsage>);

    impl ResourceAccounting for FixedAccounting {
        fn resource_usage(&self) -> io::Result<ResourceUsage> {
            match &self.0 {
                Ok(usage) => Ok(*usage),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn usage_with_max_rss(max_resident_set_size: i64) -> ResourceUsage {
        ResourceUsage {
            max_resident_set_size,
            integral_data_size: 300,
            integral_stack_size: 12,
            unit: Unit::Kilobytes,
        }
    }

    #[test]
    fn accounting_reports_resident_only() {
        let querier = Querier::accounting(FixedAccounting(Ok(usage_with_max_rss(4096))), false);
        let usage = querier.sample().unwrap();

        assert_eq!(usage.resident, 4096);
        assert_eq!(usage.size, UNAVAILABLE);
        assert_eq!(usage.shared, UNAVAILABLE);
        assert_eq!(usage.text, UNAVAILABLE);
        assert_eq!(usage.data_stack, UNAVAILABLE);
        assert_eq!(usage.unit, Unit::Kilobytes);
    }

    #[test]
    fn accounting_legacy_data_stack() {
        let querier = Querier::accounting(FixedAccounting(Ok(usage_with_max_rss(4096))), true);
        let usage = querier.sample().unwrap();

        assert_eq!(usage.resident, 4096);
        assert_eq!(usage.data_stack, 312);
        assert_eq!(usage.size, UNAVAILABLE);
    }

    #[test]
    fn accounting_failure() {
        let failing = FixedAccounting(Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        let querier = Querier::accounting(failing, false);

        assert!(matches!(querier.sample(), Err(ProbeError::AccountingFailed { .. })));
    }

    #[test]
    fn forced_statm_source_uses_configured_root() {
        let config = ProbeConfiguration {
            stat_source: StatSourceKind::Statm,
            procfs_root: PathBuf::from("/nonexistent/procfs"),
            ..Default::default()
        };
        let querier = Querier::from_configuration(&config);

        match querier.sample() {
            Err(ProbeError::OpenFailed { path, .. }) => {
                assert!(path.starts_with("/nonexistent/procfs"));
                assert!(path.ends_with("statm"));
            }
            other => panic!("expected open failure, got {:?}", other),
        }
    }

    #[test]
    fn fields_in_order() {
        let usage = MemoryUsage {
            size: 1,
            resident: 2,
            shared: 3,
            text: 4,
            data_stack: 5,
            unit: Unit::Pages,
        };
        let names = usage.fields().map(|(name, _)| name);
        let values = usage.fields().map(|(_, value)| value);

        assert_eq!(names, ["size", "resident", "shared", "text", "data_stack"]);
        assert_eq!(values, [1, 2, 3, 4, 5]);
    }

    #[cfg(any(unix, target_os = "windows"))]
    #[test]
    fn default_querier_samples_this_process() {
        let usage = Querier::default().sample().unwrap();
        for (name, value) in usage.fields() {
            assert!(value >= 0 || value == UNAVAILABLE, "{} = {}", name, value);
        }
        assert!(usage.resident > 0);
    }
}
