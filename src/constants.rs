//! Global constants for memreclaim.
//!
//! Timing values are empirical defaults; each one can be overridden
//! through the `timings` section of the configuration file.

use std::time::Duration;

// Coordinator timing constants
/// Minimum gap between two manual reclaims (15s)
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);

/// How long the busy flag stays raised after a reclaim completes (3s)
pub const DEFAULT_BUSY_GRACE: Duration = Duration::from_secs(3);

/// Delay between the last reclaim stage and the "after" memory sample (500ms)
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

// Scheduler constants
/// Default auto-clean interval in minutes
pub const DEFAULT_CLEAN_INTERVAL_MINUTES: u64 = 5;

/// Default memory usage percentage above which auto-clean fires
pub const DEFAULT_MEM_THRESHOLD_PERCENT: u8 = 80;

// Upper bounds accepted from the configuration file
pub const MAX_CLEAN_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
pub const MAX_COOLDOWN_SECS: u64 = 24 * 60 * 60;
pub const MAX_BUSY_GRACE_SECS: u64 = 60 * 60;
pub const MAX_SETTLE_DELAY_MS: u64 = 60_000;

// Reporting constants
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Reclaims freeing less than this are reported as "nothing to clean"
pub const NEGLIGIBLE_FREED_BYTES: u64 = BYTES_PER_MB;

// Windows constants
/// Processes never trimmed, compared case-insensitively
pub const PROTECTED_PROCESS_NAMES: &[&str] = &[
    "system",
    "smss.exe",
    "csrss.exe",
    "wininit.exe",
    "winlogon.exe",
    "services.exe",
    "lsass.exe",
];

/// SYSTEM_INFORMATION_CLASS::SystemMemoryListInformation
pub const SYSTEM_MEMORY_LIST_INFORMATION: u32 = 80;

/// SYSTEM_MEMORY_LIST_COMMAND::MemoryFlushModifiedList
pub const MEMORY_FLUSH_MODIFIED_LIST: u32 = 3;

/// SYSTEM_MEMORY_LIST_COMMAND::MemoryPurgeStandbyList
pub const MEMORY_PURGE_STANDBY_LIST: u32 = 4;

/// Privileges needed to trim other processes and purge page lists
pub const RECLAIM_PRIVILEGES: &[&str] = &["SeIncreaseQuotaPrivilege", "SeProfileSingleProcessPrivilege"];

// Linux constants
pub const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";

/// Page cache + dentries + inodes
pub const DROP_CACHES_ALL: &str = "3\n";

pub const SYNC_COMMAND: &str = "sync";

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "config.yaml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_defaults_are_ordered() {
        assert!(DEFAULT_SETTLE_DELAY < DEFAULT_BUSY_GRACE);
        assert!(DEFAULT_BUSY_GRACE < DEFAULT_COOLDOWN);
    }

    #[test]
    fn test_protected_names_are_lowercase() {
        for name in PROTECTED_PROCESS_NAMES {
            assert_eq!(*name, name.to_lowercase());
        }
    }
}
