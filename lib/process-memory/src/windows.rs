use std::{io, mem::MaybeUninit};

use windows_sys::Win32::System::{
    ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS},
    Threading::GetCurrentProcess,
};

use crate::{ResourceUsage, Unit, UNAVAILABLE};

/// Queries the process memory counters of the current process.
///
/// The peak working set size is the closest analogue to the maximum resident set size reported by `getrusage(2)`.
/// Windows has no notion of integral data or stack sizes, so those are reported as unavailable.
pub(crate) fn process_memory_counters() -> io::Result<ResourceUsage> {
    // Prepare a holding struct for the process memory counters.
    let mut pmc = MaybeUninit::<PROCESS_MEMORY_COUNTERS>::uninit();
    let pmc_len = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;

    // SAFETY: We're passing a valid pointer, and struct length, for the counters output. The pseudo-handle returned by
    // `GetCurrentProcess` never needs to be closed.
    let result = unsafe { GetProcessMemoryInfo(GetCurrentProcess(), pmc.as_mut_ptr(), pmc_len) };
    match result {
        0 => Err(io::Error::last_os_error()),
        _ => {
            // SAFETY: We know the structure has been populated by `GetProcessMemoryInfo` at this point.
            let pmc = unsafe { pmc.assume_init() };
            Ok(ResourceUsage {
                max_resident_set_size: i64::try_from(pmc.PeakWorkingSetSize).unwrap_or(i64::MAX),
                integral_data_size: UNAVAILABLE,
                integral_stack_size: UNAVAILABLE,
                unit: Unit::Bytes,
            })
        }
    }
}
