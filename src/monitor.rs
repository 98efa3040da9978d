use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};
use sysinfo::{CpuExt, System, SystemExt};

use crate::constants::BYTES_PER_MB;

/// Reads system-wide used memory for before/after reclaim measurement
pub trait MemoryProbe: Send + Sync {
    /// Bytes of physical memory currently in use
    fn used_memory(&self) -> u64;
}

/// Point-in-time CPU and memory usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub used_memory: u64,
    pub total_memory: u64,
}

impl SystemStats {
    /// One-line summary, e.g. `CPU 12.0% | MEM 48.3% (7712/15958 MB)`
    pub fn summary(&self) -> String {
        format!(
            "CPU {:.1}% | MEM {:.1}% ({}/{} MB)",
            self.cpu_percent,
            self.memory_percent,
            self.used_memory / BYTES_PER_MB,
            self.total_memory / BYTES_PER_MB
        )
    }
}

/// Live system statistics backed by `sysinfo`.
///
/// CPU usage is the average since the previous refresh, so the very
/// first reading after construction is not meaningful.
pub struct SystemMonitor {
    system: Mutex<System>,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
        }
    }

    /// Used memory as a percentage of total memory
    pub fn memory_percent(&self) -> f32 {
        let mut system = self.lock();
        system.refresh_memory();
        percent_of(system.used_memory(), system.total_memory())
    }

    /// Global CPU usage since the previous call
    pub fn cpu_percent(&self) -> f32 {
        let mut system = self.lock();
        system.refresh_cpu();
        system.global_cpu_info().cpu_usage()
    }

    pub fn snapshot(&self) -> SystemStats {
        let mut system = self.lock();
        system.refresh_memory();
        system.refresh_cpu();

        let stats = SystemStats {
            cpu_percent: system.global_cpu_info().cpu_usage(),
            memory_percent: percent_of(system.used_memory(), system.total_memory()),
            used_memory: system.used_memory(),
            total_memory: system.total_memory(),
        };
        debug!("System snapshot: {}", stats.summary());
        stats
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMonitor {
    fn used_memory(&self) -> u64 {
        let mut system = self.lock();
        system.refresh_memory();
        system.used_memory()
    }
}

fn percent_of(part: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 100.0 / total as f64) as f32
}
