//! Windows reclaim: trim every process working set, then flush the
//! modified page list and purge the standby list.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use sysinfo::{PidExt, ProcessExt, System, SystemExt};
use widestring::U16CString;
use winapi::shared::minwindef::{FALSE, ULONG};
use winapi::shared::ntdef::{NTSTATUS, PVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::libloaderapi::{GetModuleHandleW, GetProcAddress};
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::psapi::EmptyWorkingSet;
use winapi::um::winnt::{PROCESS_QUERY_INFORMATION, PROCESS_SET_QUOTA};

use crate::constants::{
    MEMORY_FLUSH_MODIFIED_LIST, MEMORY_PURGE_STANDBY_LIST, SYSTEM_MEMORY_LIST_INFORMATION,
};
use crate::models::{FailureKind, ReclaimOutcome};
use crate::monitor::MemoryProbe;
use crate::privileges;
use crate::reclaim::{measure_reclaim, PlatformReclaimer, ProcessWhitelist, StageFailure};

type NtSetSystemInformationFn =
    unsafe extern "system" fn(info_class: u32, info: PVOID, length: ULONG) -> NTSTATUS;

/// Windows reclaimer implementation
pub struct WindowsReclaimer {
    probe: Arc<dyn MemoryProbe>,
    settle_delay: Duration,
    whitelist: ProcessWhitelist,
    nt_set_system_information: Option<NtSetSystemInformationFn>,
}

impl WindowsReclaimer {
    /// Resolves `NtSetSystemInformation` and enables the token privileges
    /// the purge calls need.
    pub fn new(probe: Arc<dyn MemoryProbe>, settle_delay: Duration) -> Self {
        if let Err(e) = privileges::enable_reclaim_privileges() {
            warn!("Could not adjust token privileges: {}", e);
        }

        let nt_set_system_information = resolve_nt_set_system_information();
        if nt_set_system_information.is_none() {
            warn!("NtSetSystemInformation could not be resolved from ntdll.dll");
        }

        Self {
            probe,
            settle_delay,
            whitelist: ProcessWhitelist::for_current_process(),
            nt_set_system_information,
        }
    }

    /// Empties the working set of every process we are allowed to open.
    ///
    /// Protected or already-exited processes are skipped without error.
    fn trim_working_sets(&self) -> usize {
        let mut system = System::new();
        system.refresh_processes();

        let mut trimmed = 0;
        for (pid, process) in system.processes() {
            let pid = pid.as_u32();
            if self.whitelist.is_protected(process.name(), pid) {
                continue;
            }
            if trim_process(pid) {
                trimmed += 1;
            } else {
                debug!("Skipped {} ({})", process.name(), pid);
            }
        }

        info!("Trimmed working sets of {} processes", trimmed);
        trimmed
    }

    fn memory_list_command(&self, api: NtSetSystemInformationFn, command: u32, label: &str) {
        let mut command = command;
        // SAFETY: `api` was resolved from ntdll.dll with the documented
        // signature. The buffer is a valid u32 and its size is passed along.
        let status = unsafe {
            api(
                SYSTEM_MEMORY_LIST_INFORMATION,
                &mut command as *mut u32 as PVOID,
                mem::size_of::<u32>() as ULONG,
            )
        };

        if status < 0 {
            warn!("{} returned NTSTATUS {:#010x}", label, status as u32);
        } else {
            debug!("{} completed", label);
        }
    }
}

impl PlatformReclaimer for WindowsReclaimer {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn reclaim(&self) -> ReclaimOutcome {
        let Some(api) = self.nt_set_system_information else {
            return ReclaimOutcome::failure(
                FailureKind::PrivilegedApiUnavailable,
                "NtSetSystemInformation is not available in ntdll.dll",
            );
        };

        measure_reclaim(self.probe.as_ref(), self.settle_delay, || {
            self.trim_working_sets();
            self.memory_list_command(api, MEMORY_FLUSH_MODIFIED_LIST, "Modified page list flush");
            self.memory_list_command(api, MEMORY_PURGE_STANDBY_LIST, "Standby list purge");
            Ok::<(), StageFailure>(())
        })
    }
}

fn trim_process(pid: u32) -> bool {
    // SAFETY: OpenProcess has no memory preconditions; a null handle means
    // the process is protected, gone, or access was denied.
    let handle = unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_SET_QUOTA, FALSE, pid) };
    if handle.is_null() {
        return false;
    }

    // SAFETY: handle is a valid process handle opened with PROCESS_SET_QUOTA
    // and is closed exactly once below.
    let emptied = unsafe { EmptyWorkingSet(handle) } != 0;
    // SAFETY: handle came from OpenProcess above and is not used afterwards.
    unsafe { CloseHandle(handle) };
    emptied
}

fn resolve_nt_set_system_information() -> Option<NtSetSystemInformationFn> {
    let module_name = U16CString::from_str("ntdll.dll").ok()?;
    // SAFETY: module_name is nul-terminated. ntdll.dll is mapped into every
    // process, so no LoadLibrary is needed.
    let module = unsafe { GetModuleHandleW(module_name.as_ptr()) };
    if module.is_null() {
        return None;
    }

    // SAFETY: module is a valid module handle and the name is nul-terminated.
    let address = unsafe { GetProcAddress(module, b"NtSetSystemInformation\0".as_ptr() as *const i8) };
    if address.is_null() {
        return None;
    }

    // SAFETY: the exported symbol has the NtSetSystemInformationFn signature.
    Some(unsafe { mem::transmute::<_, NtSetSystemInformationFn>(address) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclaim::test_probe::ScriptedProbe;

    #[test]
    fn test_missing_api_fails_before_measuring() {
        let probe = Arc::new(ScriptedProbe::new(&[8_000, 7_000]));
        let reclaimer = WindowsReclaimer {
            probe: probe.clone(),
            settle_delay: Duration::ZERO,
            whitelist: ProcessWhitelist::for_current_process(),
            nt_set_system_information: None,
        };

        match reclaimer.reclaim() {
            ReclaimOutcome::Failure { kind, .. } => {
                assert_eq!(kind, FailureKind::PrivilegedApiUnavailable)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn test_nt_set_system_information_resolves() {
        assert!(resolve_nt_set_system_information().is_some());
    }

    #[test]
    fn test_own_process_is_never_trimmed() {
        let whitelist = ProcessWhitelist::for_current_process();
        assert!(whitelist.is_protected("memreclaim.exe", std::process::id()));
    }
}
