//! Linux reclaim: flush dirty buffers, then drop the page, dentry and
//! inode caches through procfs.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::constants::{DROP_CACHES_ALL, DROP_CACHES_PATH, SYNC_COMMAND};
use crate::models::{FailureKind, ReclaimOutcome};
use crate::monitor::MemoryProbe;
use crate::privileges;
use crate::reclaim::{measure_reclaim, PlatformReclaimer, StageFailure};

/// Linux reclaimer implementation
pub struct LinuxReclaimer {
    probe: Arc<dyn MemoryProbe>,
    settle_delay: Duration,
    drop_caches_path: PathBuf,
    sync_command: String,
}

impl LinuxReclaimer {
    pub fn new(probe: Arc<dyn MemoryProbe>, settle_delay: Duration) -> Self {
        privileges::linux::preflight_cache_drop();
        Self::with_paths(probe, settle_delay, DROP_CACHES_PATH, SYNC_COMMAND)
    }

    /// Reclaimer writing to a custom control file and running a custom
    /// sync command
    pub fn with_paths(
        probe: Arc<dyn MemoryProbe>,
        settle_delay: Duration,
        drop_caches_path: impl Into<PathBuf>,
        sync_command: impl Into<String>,
    ) -> Self {
        Self {
            probe,
            settle_delay,
            drop_caches_path: drop_caches_path.into(),
            sync_command: sync_command.into(),
        }
    }

    fn sync_filesystems(&self) -> Result<(), StageFailure> {
        debug!("Flushing filesystem buffers with `{}`", self.sync_command);
        let status = Command::new(&self.sync_command).status().map_err(|e| {
            StageFailure::new(
                FailureKind::SyncFailed,
                format!("failed to run {}: {}", self.sync_command, e),
            )
        })?;

        if !status.success() {
            return Err(StageFailure::new(
                FailureKind::SyncFailed,
                format!("{} exited with {}", self.sync_command, status),
            ));
        }
        Ok(())
    }

    fn drop_caches(&self) -> Result<(), StageFailure> {
        debug!("Dropping caches via {}", self.drop_caches_path.display());
        write_control_file(&self.drop_caches_path, DROP_CACHES_ALL).map_err(|e| {
            let kind = classify_write_error(&e);
            let message = match kind {
                FailureKind::PermissionDenied => format!(
                    "writing {} requires root, run with sudo ({})",
                    self.drop_caches_path.display(),
                    e
                ),
                _ => format!("failed to write {}: {}", self.drop_caches_path.display(), e),
            };
            StageFailure::new(kind, message)
        })
    }
}

impl PlatformReclaimer for LinuxReclaimer {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn reclaim(&self) -> ReclaimOutcome {
        measure_reclaim(self.probe.as_ref(), self.settle_delay, || {
            self.sync_filesystems()?;
            self.drop_caches()
        })
    }
}

fn write_control_file(path: &Path, value: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(value.as_bytes())?;
    file.flush()
}

fn classify_write_error(error: &io::Error) -> FailureKind {
    match error.kind() {
        io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
        _ => match error.raw_os_error() {
            Some(libc::EPERM) | Some(libc::EACCES) => FailureKind::PermissionDenied,
            _ => FailureKind::CacheDropFailed,
        },
    }
}
