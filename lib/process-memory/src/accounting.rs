use std::io;

use crate::{MemoryUsage, Unit, UNAVAILABLE};

/// Resource usage, as reported by an accounting call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResourceUsage {
    /// Maximum resident set size.
    pub max_resident_set_size: i64,

    /// Integral unshared data size, or [`UNAVAILABLE`] if the platform doesn't track it.
    pub integral_data_size: i64,

    /// Integral unshared stack size, or [`UNAVAILABLE`] if the platform doesn't track it.
    pub integral_stack_size: i64,

    /// Unit of the sizes above.
    pub unit: Unit,
}

impl ResourceUsage {
    pub(crate) fn into_memory_usage(self, legacy_data_stack: bool) -> MemoryUsage {
        let data_stack = if legacy_data_stack {
            legacy_data_stack_size(self.integral_data_size, self.integral_stack_size)
        } else {
            UNAVAILABLE
        };

        MemoryUsage {
            size: UNAVAILABLE,
            resident: self.max_resident_set_size,
            shared: UNAVAILABLE,
            text: UNAVAILABLE,
            data_stack,
            unit: self.unit,
        }
    }
}

/// Sums the integral data and stack sizes.
///
/// Both must be known for the sum to mean anything, and a sum that overflows is just as ambiguous.
fn legacy_data_stack_size(data: i64, stack: i64) -> i64 {
    if data < 0 || stack < 0 {
        return UNAVAILABLE;
    }

    data.checked_add(stack).unwrap_or(UNAVAILABLE)
}

/// A source of resource usage accounting for the current process.
pub trait ResourceAccounting: Send + Sync {
    /// Queries the resource usage of the current process.
    ///
    /// # Errors
    ///
    /// If the underlying accounting call fails, an error is returned.
    fn resource_usage(&self) -> io::Result<ResourceUsage>;
}

/// Resource usage accounting provided by the operating system.
///
/// On Unix platforms, this is `getrusage(2)`. On Windows, this is `GetProcessMemoryInfo`.
#[derive(Clone, Copy, Debug)]
pub struct SystemAccounting {
    _priv: (),
}

impl SystemAccounting {
    /// Creates a new `SystemAccounting`, if the current platform has a resource usage accounting call.
    pub fn new() -> Option<Self> {
        if cfg!(any(unix, target_os = "windows")) {
            Some(Self { _priv: () })
        } else {
            None
        }
    }
}

#[cfg(unix)]
impl ResourceAccounting for SystemAccounting {
    fn resource_usage(&self) -> io::Result<ResourceUsage> {
        let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();

        // SAFETY: We're passing a valid pointer to storage large enough to hold a `rusage`.
        if unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) } < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: `getrusage` succeeded, so the structure has been populated.
        let usage = unsafe { usage.assume_init() };

        // POSIX leaves the unit of `ru_maxrss` unspecified. Apple platforms report bytes, everyone else kilobytes.
        let unit = if cfg!(any(target_os = "macos", target_os = "ios")) {
            Unit::Bytes
        } else {
            Unit::Kilobytes
        };

        Ok(ResourceUsage {
            max_resident_set_size: usage.ru_maxrss as i64,
            integral_data_size: usage.ru_idrss as i64,
            integral_stack_size: usage.ru_isrss as i64,
            unit,
        })
    }
}

#[cfg(target_os = "windows")]
impl ResourceAccounting for SystemAccounting {
    fn resource_usage(&self) -> io::Result<ResourceUsage> {
        crate::windows::process_memory_counters()
    }
}

#[cfg(not(any(unix, target_os = "windows")))]
impl ResourceAccounting for SystemAccounting {
    fn resource_usage(&self) -> io::Result<ResourceUsage> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "no resource usage accounting on this platform",
        ))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn usage(integral_data_size: i64, integral_stack_size: i64) -> ResourceUsage {
        ResourceUsage {
            max_resident_set_size: 10,
            integral_data_size,
            integral_stack_size,
            unit: Unit::Bytes,
        }
    }

    #[test]
    fn legacy_data_stack_sums_integral_sizes() {
        assert_eq!(usage(7, 5).into_memory_usage(true).data_stack, 12);
        assert_eq!(usage(7, 5).into_memory_usage(false).data_stack, UNAVAILABLE);
    }

    #[test]
    fn legacy_data_stack_overflow_is_unavailable() {
        assert_eq!(usage(i64::MAX, 1).into_memory_usage(true).data_stack, UNAVAILABLE);
        assert_eq!(usage(i64::MAX, 0).into_memory_usage(true).data_stack, i64::MAX);
    }

    #[test]
    fn legacy_data_stack_needs_both_sizes() {
        assert_eq!(usage(UNAVAILABLE, UNAVAILABLE).into_memory_usage(true).data_stack, UNAVAILABLE);
        assert_eq!(usage(UNAVAILABLE, 5).into_memory_usage(true).data_stack, UNAVAILABLE);
        assert_eq!(usage(7, UNAVAILABLE).into_memory_usage(true).data_stack, UNAVAILABLE);
    }
}
