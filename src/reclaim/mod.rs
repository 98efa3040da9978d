//! Platform-specific memory reclaim implementations
//!
//! Each supported OS family gets one [`PlatformReclaimer`]. Callers obtain
//! the right one through [`platform_reclaimer`] and never branch on the
//! platform themselves.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::models::{FailureKind, ReclaimOutcome};
use crate::monitor::MemoryProbe;

pub mod unsupported;
pub mod whitelist;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod linux;

pub use unsupported::UnsupportedReclaimer;
pub use whitelist::ProcessWhitelist;

/// One best-effort, blocking memory reclaim pass
#[cfg_attr(test, mockall::automock)]
pub trait PlatformReclaimer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Run every reclaim stage and report the bytes freed or why it failed.
    ///
    /// Mutates system-wide OS memory state. Must not be called
    /// concurrently with itself.
    fn reclaim(&self) -> ReclaimOutcome;
}

/// A stage failure that aborts the whole reclaim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<StageFailure> for ReclaimOutcome {
    fn from(failure: StageFailure) -> Self {
        ReclaimOutcome::Failure {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

/// Samples used memory around `stages` and reports the clamped difference.
///
/// The "after" sample is taken `settle_delay` after the last stage so the
/// OS accounting has caught up. A failing stage skips the second sample.
pub fn measure_reclaim<F>(probe: &dyn MemoryProbe, settle_delay: Duration, stages: F) -> ReclaimOutcome
where
    F: FnOnce() -> Result<(), StageFailure>,
{
    let before = probe.used_memory();
    debug!("Used memory before reclaim: {} bytes", before);

    if let Err(failure) = stages() {
        warn!("Reclaim aborted: {} ({})", failure.kind, failure.message);
        return failure.into();
    }

    if !settle_delay.is_zero() {
        thread::sleep(settle_delay);
    }

    let after = probe.used_memory();
    debug!("Used memory after reclaim: {} bytes", after);

    let outcome = ReclaimOutcome::from_samples(before, after);
    if let ReclaimOutcome::Success { freed_bytes } = outcome {
        info!("Reclaim freed {} bytes", freed_bytes);
    }
    outcome
}

/// Get the reclaimer for the platform this binary was built for
pub fn platform_reclaimer(probe: Arc<dyn MemoryProbe>, settle_delay: Duration) -> Box<dyn PlatformReclaimer> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsReclaimer::new(probe, settle_delay))
    }

    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxReclaimer::new(probe, settle_delay))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        let _ = (probe, settle_delay);
        Box::new(UnsupportedReclaimer::for_current_os())
    }
}

#[cfg(test)]
pub(crate) mod test_probe {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::monitor::MemoryProbe;

    /// Probe that replays a fixed sequence of readings
    pub struct ScriptedProbe {
        readings: Mutex<VecDeque<u64>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        pub fn new(readings: &[u64]) -> Self {
            Self {
                readings: Mutex::new(readings.iter().copied().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MemoryProbe for ScriptedProbe {
        fn used_memory(&self) -> u64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.readings.lock().unwrap().pop_front().unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_probe::ScriptedProbe;
    use super::*;

    #[test]
    fn test_measure_reports_freed_bytes() {
        let probe = ScriptedProbe::new(&[1_000, 880]);
        let outcome = measure_reclaim(&probe, Duration::ZERO, || Ok(()));

        assert_eq!(outcome, ReclaimOutcome::Success { freed_bytes: 120 });
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn test_measure_clamps_when_usage_grows() {
        let probe = ScriptedProbe::new(&[1_000, 4_000]);
        let outcome = measure_reclaim(&probe, Duration::ZERO, || Ok(()));

        assert_eq!(outcome, ReclaimOutcome::Success { freed_bytes: 0 });
    }

    #[test]
    fn test_measure_stops_on_stage_failure() {
        let probe = ScriptedProbe::new(&[1_000, 500]);
        let outcome = measure_reclaim(&probe, Duration::ZERO, || {
            Err(StageFailure::new(FailureKind::SyncFailed, "exit status: 1"))
        });

        assert_eq!(
            outcome,
            ReclaimOutcome::failure(FailureKind::SyncFailed, "exit status: 1")
        );
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn test_platform_reclaimer_has_a_name() {
        let probe: Arc<dyn MemoryProbe> = Arc::new(ScriptedProbe::new(&[]));
        let reclaimer = platform_reclaimer(probe, Duration::ZERO);
        assert!(!reclaimer.name().is_empty());
    }
}
