#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

use anyhow::Result;

/// Enable the token privileges a reclaim pass needs on the current platform.
///
/// Only Windows has per-token privileges to adjust; elsewhere this is a no-op
/// and elevation is decided by the effective user.
pub fn enable_reclaim_privileges() -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        windows::enable_privileges(crate::constants::RECLAIM_PRIVILEGES)
    }
    #[cfg(not(target_os = "windows"))]
    {
        log::debug!("No token privileges to enable on {}", std::env::consts::OS);
        Ok(())
    }
}

/// Check if the process is running with elevated privileges
pub fn is_elevated() -> bool {
    #[cfg(target_os = "windows")]
    {
        windows::is_admin()
    }
    #[cfg(target_os = "linux")]
    {
        linux::is_root()
    }
    #[cfg(target_os = "macos")]
    {
        macos::is_root()
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        false
    }
}

/// Get instructions for elevating privileges on the current platform
pub fn elevation_instructions() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "Run as Administrator by right-clicking the executable and selecting 'Run as administrator'"
    }
    #[cfg(target_os = "linux")]
    {
        "Run with sudo: 'sudo memreclaim clean'"
    }
    #[cfg(target_os = "macos")]
    {
        "macOS manages memory on its own; no elevation is needed"
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        "Run with elevated privileges appropriate for your operating system"
    }
}
