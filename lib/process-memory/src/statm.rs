use std::{
    fs::File,
    io::Read as _,
    path::{Path, PathBuf},
};

use snafu::ResultExt as _;
use tracing::debug;

use crate::{MalformedStatistics, MemoryUsage, OpenFailed, ProbeError, ReadFailed, Unit, UNAVAILABLE};

/// Number of fields in `statm`: size, resident, shared, text, lib, data, dt.
const STATM_FIELDS: usize = 7;

/// Number of leading fields we actually report.
const REPORTED_FIELDS: usize = 5;

pub(crate) fn path_for_pid(root: &Path, pid: u32) -> PathBuf {
    root.join(pid.to_string()).join("statm")
}

/// Reads and parses the `statm` file at `path`.
///
/// In strict mode, fewer than five leading integer fields is an error. Otherwise, any of the five fields that could
/// not be scanned are reported as [`UNAVAILABLE`].
pub(crate) fn read_usage(path: &Path, strict: bool) -> Result<MemoryUsage, ProbeError> {
    // statm is a single line of seven integer fields. Twenty bytes per field, plus separators and the trailing newline,
    // comes to 153 bytes, so 256 bytes is plenty to read it in one go.
    let mut buf = [0; 256];
    let mut file = File::open(path).context(OpenFailed { path })?;
    let n = file.read(&mut buf).context(ReadFailed { path })?;
    if n == 0 {
        return MalformedStatistics {
            path,
            reason: "file is empty",
        }
        .fail();
    }
    if n == buf.len() {
        return MalformedStatistics {
            path,
            reason: format!("contents exceed {} bytes", buf.len()),
        }
        .fail();
    }

    let (values, scanned) = parse_fields(&buf[..n]);
    if scanned < REPORTED_FIELDS {
        if strict {
            return MalformedStatistics {
                path,
                reason: format!("expected at least {} integer fields, found {}", REPORTED_FIELDS, scanned),
            }
            .fail();
        }

        debug!(path = %path.display(), scanned, "Short read of memory statistics. Unscanned fields are unavailable.");
    }

    Ok(MemoryUsage {
        size: values[0],
        resident: values[1],
        shared: values[2],
        text: values[3],
        data_stack: values[4],
        unit: Unit::Pages,
    })
}

/// Scans up to seven whitespace-separated, non-negative integers from the front of `raw`.
///
/// Scanning stops at the first token that isn't a non-negative integer. Unlike a `%d` conversion, a negative token
/// stops the scan as well: no `statm` field can be negative, and `-1` is reserved for unavailable values.
///
/// Returns the scanned values, with every slot past the last scanned value set to [`UNAVAILABLE`], and the number of
/// values scanned.
fn parse_fields(raw: &[u8]) -> ([i64; STATM_FIELDS], usize) {
    let mut values = [UNAVAILABLE; STATM_FIELDS];
    let mut scanned = 0;

    let tokens = raw
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .take(STATM_FIELDS);
    for token in tokens {
        match parse_field(token) {
            Some(value) => {
                values[scanned] = value;
                scanned += 1;
            }
            None => break,
        }
    }

    (values, scanned)
}

fn parse_field(token: &[u8]) -> Option<i64> {
    let value = std::str::from_utf8(token).ok()?.parse::<u64>().ok()?;
    i64::try_from(value).ok()
}
