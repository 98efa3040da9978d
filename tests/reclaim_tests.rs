//! Integration tests for platform reclaimers wired through the coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memreclaim::clock::ManualClock;
use memreclaim::coordinator::{CoordinatorTimings, ReclaimCoordinator};
use memreclaim::models::{CoordinatorDecision, FailureKind, ReclaimOrigin, ReclaimOutcome};
use memreclaim::monitor::MemoryProbe;
use memreclaim::reclaim::{PlatformReclaimer, UnsupportedReclaimer};

/// Probe that counts reads and reports steadily shrinking usage
struct CountingProbe {
    reads: AtomicUsize,
}

impl MemoryProbe for CountingProbe {
    fn used_memory(&self) -> u64 {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) as u64;
        10_000 - n * 120
    }
}

#[test]
fn test_unsupported_failure_reaches_caller() {
    let clock = Arc::new(ManualClock::new());
    let coordinator = ReclaimCoordinator::new(
        Box::new(UnsupportedReclaimer::new("macos")),
        clock.clone(),
        CoordinatorTimings::default(),
    );

    let decision = coordinator.request_reclaim(ReclaimOrigin::Manual);
    assert!(matches!(
        decision,
        CoordinatorDecision::Accepted(ReclaimOutcome::Failure {
            kind: FailureKind::UnsupportedPlatform,
            ..
        })
    ));
    assert!(decision.user_message().starts_with("Cleanup failed"));

    // Failures do not start the cooldown, only the busy grace period
    clock.advance(Duration::from_secs(4));
    assert!(matches!(
        coordinator.request_reclaim(ReclaimOrigin::Manual),
        CoordinatorDecision::Accepted(_)
    ));
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
#[test]
fn test_unsupported_never_measures() {
    use memreclaim::reclaim::platform_reclaimer;

    let probe = Arc::new(CountingProbe {
        reads: AtomicUsize::new(0),
    });
    let reclaimer = platform_reclaimer(probe.clone(), Duration::ZERO);

    for _ in 0..3 {
        assert!(!reclaimer.reclaim().is_success());
    }
    assert_eq!(probe.reads.load(Ordering::SeqCst), 0);
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use memreclaim::reclaim::linux::LinuxReclaimer;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_linux_reclaim_through_coordinator() {
        let control = NamedTempFile::new().unwrap();
        let probe = Arc::new(CountingProbe {
            reads: AtomicUsize::new(0),
        });
        let reclaimer = LinuxReclaimer::with_paths(probe.clone(), Duration::ZERO, control.path(), "true");
        let coordinator = ReclaimCoordinator::new(
            Box::new(reclaimer),
            Arc::new(ManualClock::new()),
            CoordinatorTimings::default(),
        );

        let decision = coordinator.request_reclaim(ReclaimOrigin::Manual);

        assert_eq!(
            decision,
            CoordinatorDecision::Accepted(ReclaimOutcome::Success { freed_bytes: 120 })
        );
        assert_eq!(probe.reads.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read_to_string(control.path()).unwrap(), "3\n");
    }

    #[test]
    fn test_linux_sync_failure_is_reported() {
        let control = NamedTempFile::new().unwrap();
        let probe = Arc::new(CountingProbe {
            reads: AtomicUsize::new(0),
        });
        let reclaimer = LinuxReclaimer::with_paths(probe, Duration::ZERO, control.path(), "false");

        match reclaimer.reclaim() {
            ReclaimOutcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::SyncFailed);
                assert!(message.contains("false"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
