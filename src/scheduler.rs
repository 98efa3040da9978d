//! Threshold-driven background reclaim.
//!
//! On every interval tick the current memory usage is compared with the
//! configured threshold; above it, a [`ReclaimOrigin::Scheduled`] request
//! goes to the coordinator on a blocking worker thread.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::config::AutoCleanConfig;
use crate::constants::MAX_CLEAN_INTERVAL_MINUTES;
use crate::coordinator::ReclaimCoordinator;
use crate::models::{CoordinatorDecision, ReclaimOrigin};
use crate::monitor::SystemMonitor;

/// Current memory usage as a percentage
pub trait UsageSource: Send + Sync {
    fn memory_percent(&self) -> f32;
}

impl UsageSource for SystemMonitor {
    fn memory_percent(&self) -> f32 {
        SystemMonitor::memory_percent(self)
    }
}

/// Whether usage is high enough to trigger a scheduled reclaim
pub fn should_auto_clean(memory_percent: f32, threshold_percent: u8) -> bool {
    memory_percent > f32::from(threshold_percent)
}

/// Periodically issues scheduled reclaim requests
pub struct AutoCleaner {
    coordinator: Arc<ReclaimCoordinator>,
    usage: Arc<dyn UsageSource>,
    threshold_percent: u8,
    interval: Duration,
}

impl AutoCleaner {
    /// `interval` is bounded to `1ms..=MAX_CLEAN_INTERVAL_MINUTES`
    pub fn new(
        coordinator: Arc<ReclaimCoordinator>,
        usage: Arc<dyn UsageSource>,
        threshold_percent: u8,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            usage,
            threshold_percent,
            interval: interval.clamp(
                Duration::from_millis(1),
                Duration::from_secs(MAX_CLEAN_INTERVAL_MINUTES * 60),
            ),
        }
    }

    pub fn from_config(
        coordinator: Arc<ReclaimCoordinator>,
        usage: Arc<dyn UsageSource>,
        config: &AutoCleanConfig,
    ) -> Self {
        Self::new(coordinator, usage, config.threshold_percent, config.interval())
    }

    /// Checks usage once and reclaims if it is above the threshold.
    ///
    /// Returns `None` when usage was below the threshold.
    pub async fn tick(&self) -> Option<CoordinatorDecision> {
        let percent = self.usage.memory_percent();
        if !should_auto_clean(percent, self.threshold_percent) {
            debug!(
                "Memory at {:.1}% is within the {}% threshold",
                percent, self.threshold_percent
            );
            return None;
        }

        info!(
            "Memory at {:.1}% exceeds {}%, requesting reclaim",
            percent, self.threshold_percent
        );
        let coordinator = self.coordinator.clone();
        match tokio::task::spawn_blocking(move || coordinator.request_reclaim(ReclaimOrigin::Scheduled)).await {
            Ok(decision) => Some(decision),
            Err(e) => {
                error!("Scheduled reclaim task failed: {}", e);
                None
            }
        }
    }

    /// Ticks until `shutdown` changes or its sender is dropped.
    ///
    /// The first check happens one full interval after start.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Auto-clean every {:?} above {}%", self.interval, self.threshold_percent);
        let mut interval = time::interval_at(time::Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Auto-clean stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::coordinator::CoordinatorTimings;
    use crate::models::ReclaimOutcome;
    use crate::reclaim::PlatformReclaimer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedUsage(f32);

    impl UsageSource for FixedUsage {
        fn memory_percent(&self) -> f32 {
            self.0
        }
    }

    struct CountingReclaimer {
        calls: Arc<AtomicUsize>,
    }

    impl PlatformReclaimer for CountingReclaimer {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn reclaim(&self) -> ReclaimOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ReclaimOutcome::Success { freed_bytes: 42 }
        }
    }

    fn cleaner(percent: f32, interval: Duration) -> (AutoCleaner, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let reclaimer = CountingReclaimer { calls: calls.clone() };
        let timings = CoordinatorTimings {
            cooldown: Duration::from_secs(15),
            busy_grace: Duration::ZERO,
        };
        let coordinator = Arc::new(ReclaimCoordinator::new(
            Box::new(reclaimer),
            Arc::new(ManualClock::new()),
            timings,
        ));
        (AutoCleaner::new(coordinator, Arc::new(FixedUsage(percent)), 80, interval), calls)
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!should_auto_clean(79.9, 80));
        assert!(!should_auto_clean(80.0, 80));
        assert!(should_auto_clean(80.1, 80));
        assert!(!should_auto_clean(100.0, 100));
    }

    #[test]
    fn test_interval_is_bounded() {
        let (huge, _) = cleaner(50.0, Duration::MAX);
        assert_eq!(huge.interval, Duration::from_secs(MAX_CLEAN_INTERVAL_MINUTES * 60));

        let (zero, _) = cleaner(50.0, Duration::ZERO);
        assert_eq!(zero.interval, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_tick_below_threshold_does_nothing() {
        let (cleaner, calls) = cleaner(42.0, Duration::from_secs(60));
        assert!(cleaner.tick().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ticks_above_threshold_bypass_cooldown() {
        let (cleaner, calls) = cleaner(93.5, Duration::from_secs(60));

        let first = cleaner.tick().await;
        let second = cleaner.tick().await;

        assert!(matches!(first, Some(CoordinatorDecision::Accepted(_))));
        assert!(matches!(second, Some(CoordinatorDecision::Accepted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (cleaner, calls) = cleaner(95.0, Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(true);
        });
        cleaner.run(rx).await;
        stopper.await.unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}
