use std::io;
use std::ptr;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use widestring::U16CString;
use winapi::shared::minwindef::FALSE;
use winapi::shared::winerror::ERROR_NOT_ALL_ASSIGNED;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::CloseHandle;
use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
use winapi::um::securitybaseapi::AdjustTokenPrivileges;
use winapi::um::winbase::LookupPrivilegeValueW;
use winapi::um::winnt::{
    HANDLE, LUID, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
    TOKEN_PRIVILEGES, TOKEN_QUERY,
};

/// Enable the named privileges on the current process token.
///
/// Privileges that cannot be enabled are logged; the purge calls will
/// then fail on their own and report it.
pub fn enable_privileges(privileges: &[&str]) -> Result<()> {
    if !is_admin() {
        warn!("Not running as Administrator, page list purging will likely be denied");
    }

    // SAFETY: GetCurrentProcess() returns a pseudo-handle that is always valid.
    let h_process = unsafe { GetCurrentProcess() };
    let mut h_token: HANDLE = ptr::null_mut();

    // SAFETY: h_process is valid and h_token is a valid out-pointer.
    let opened = unsafe {
        OpenProcessToken(h_process, TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY, &mut h_token)
    };
    if opened == 0 {
        let err = io::Error::last_os_error();
        return Err(anyhow!("Failed to open process token: {}", err));
    }

    let mut enabled = 0;
    for privilege in privileges {
        match enable_privilege(h_token, privilege) {
            Ok(()) => {
                enabled += 1;
                debug!("Enabled privilege: {}", privilege);
            }
            Err(e) => warn!("Failed to enable privilege {}: {}", privilege, e),
        }
    }

    // SAFETY: h_token was opened above and is closed exactly once.
    unsafe { CloseHandle(h_token) };

    info!("Enabled {}/{} reclaim privileges", enabled, privileges.len());
    Ok(())
}

fn enable_privilege(h_token: HANDLE, privilege_name: &str) -> Result<()> {
    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    let wide_name = U16CString::from_str(privilege_name)?;

    // SAFETY: null system name means the local system; wide_name is
    // nul-terminated and luid is a valid out-pointer.
    let found = unsafe { LookupPrivilegeValueW(ptr::null(), wide_name.as_ptr(), &mut luid) };
    if found == 0 {
        let err = io::Error::last_os_error();
        return Err(anyhow!("LookupPrivilegeValue failed: {}", err));
    }

    let mut tp = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };

    // SAFETY: h_token was opened with TOKEN_ADJUST_PRIVILEGES; the previous
    // state out-parameters are optional and passed as null.
    let adjusted = unsafe {
        AdjustTokenPrivileges(h_token, FALSE, &mut tp, 0, ptr::null_mut(), ptr::null_mut())
    };
    if adjusted == 0 {
        let err = io::Error::last_os_error();
        return Err(anyhow!("AdjustTokenPrivileges failed: {}", err));
    }

    // AdjustTokenPrivileges succeeds even when the token lacks the privilege.
    // SAFETY: GetLastError has no preconditions.
    if unsafe { GetLastError() } == ERROR_NOT_ALL_ASSIGNED {
        return Err(anyhow!("privilege not held by the current token"));
    }

    Ok(())
}

/// Check if the process is running as administrator
pub fn is_admin() -> bool {
    use winapi::um::shellapi::IsUserAnAdmin;
    // SAFETY: IsUserAnAdmin takes no arguments and only queries the token.
    unsafe { IsUserAnAdmin() != 0 }
}
