use std::path::PathBuf;

use serde::Deserialize;

use crate::DEFAULT_PROCFS_ROOT;

/// Which statistics source a [`Querier`][crate::Querier] should use.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StatSourceKind {
    /// Pick the best source for the current platform.
    #[default]
    Auto,

    /// Read `<procfs_root>/<pid>/statm`.
    Statm,

    /// Use the resource usage accounting call.
    Accounting,
}

/// Memory usage probe configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ProbeConfiguration {
    /// Statistics source to use.
    ///
    /// Defaults to `auto`.
    pub stat_source: StatSourceKind,

    /// Root of the process pseudo-filesystem.
    ///
    /// Defaults to `/proc`.
    pub procfs_root: PathBuf,

    /// Whether or not a `statm` file with fewer than five integer fields is an error.
    ///
    /// When disabled, any field that could not be read is reported as unavailable instead.
    ///
    /// Defaults to `true`.
    pub strict_parsing: bool,

    /// Whether or not to derive the data/stack size from the integral data and stack sizes reported by the accounting
    /// call.
    ///
    /// Defaults to `false`.
    pub legacy_data_stack: bool,
}

impl Default for ProbeConfiguration {
    fn default() -> Self {
        Self {
            stat_source: StatSourceKind::default(),
            procfs_root: PathBuf::from(DEFAULT_PROCFS_ROOT),
            strict_parsing: true,
            legacy_data_stack: false,
        }
    }
}
