use std::collections::HashSet;

use crate::constants::PROTECTED_PROCESS_NAMES;

/// Processes that must never have their working set trimmed.
///
/// Holds the critical OS process names plus the caller's own pid. Built
/// once and only read afterwards.
#[derive(Debug, Clone)]
pub struct ProcessWhitelist {
    names: HashSet<String>,
    own_pid: u32,
}

impl ProcessWhitelist {
    pub fn new(own_pid: u32) -> Self {
        Self {
            names: PROTECTED_PROCESS_NAMES.iter().map(|n| n.to_string()).collect(),
            own_pid,
        }
    }

    /// Whitelist for the current process
    pub fn for_current_process() -> Self {
        Self::new(std::process::id())
    }

    pub fn is_protected(&self, name: &str, pid: u32) -> bool {
        pid == self.own_pid || self.names.contains(&name.to_ascii_lowercase())
    }
}
