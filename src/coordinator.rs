//! Serializes and rate-limits reclaim requests.
//!
//! Every trigger source (button, hotkey, tray, auto-clean timer) funnels
//! into [`ReclaimCoordinator::request_reclaim`]. All state lives in one
//! [`CoordinatorState`] behind a single mutex. The mutex is never held
//! while the platform reclaimer runs, so concurrent callers are answered
//! immediately with [`RejectReason::AlreadyRunning`].
//!
//! State transitions:
//!
//! ```text
//! Idle ──accept──▶ Running ──complete──▶ Settling{until} ──until passed──▶ Idle
//! ```
//!
//! `Settling` keeps the busy signal raised for a short grace period after
//! completion so that a double-click does not start a second pass.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::constants::{DEFAULT_BUSY_GRACE, DEFAULT_COOLDOWN};
use crate::models::{CoordinatorDecision, ReclaimOrigin, RejectReason};
use crate::reclaim::PlatformReclaimer;

/// Timing windows enforced by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorTimings {
    /// Minimum gap between a successful reclaim and the next manual one
    pub cooldown: Duration,
    /// How long the busy flag stays up after a reclaim completes
    pub busy_grace: Duration,
}

impl Default for CoordinatorTimings {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            busy_grace: DEFAULT_BUSY_GRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Idle,
    Running,
    Settling { until: Instant },
}

/// Process-wide reclaim state, mutated only by the coordinator
#[derive(Debug)]
pub struct CoordinatorState {
    activity: Activity,
    last_reclaim: Option<Instant>,
}

impl CoordinatorState {
    fn new() -> Self {
        Self {
            activity: Activity::Idle,
            last_reclaim: None,
        }
    }

    /// Applies the scheduled `Settling -> Idle` transition if it is due
    fn settle(&mut self, now: Instant) {
        if let Activity::Settling { until } = self.activity {
            if now >= until {
                self.activity = Activity::Idle;
            }
        }
    }

    fn is_reclaiming(&self) -> bool {
        self.activity != Activity::Idle
    }

    fn in_cooldown(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_reclaim
            .map(|last| now.saturating_duration_since(last) < cooldown)
            .unwrap_or(false)
    }
}

/// Wraps a [`PlatformReclaimer`] with a concurrency guard and a cooldown
pub struct ReclaimCoordinator {
    reclaimer: Box<dyn PlatformReclaimer>,
    clock: Arc<dyn Clock>,
    timings: CoordinatorTimings,
    state: Mutex<CoordinatorState>,
}

impl ReclaimCoordinator {
    pub fn new(
        reclaimer: Box<dyn PlatformReclaimer>,
        clock: Arc<dyn Clock>,
        timings: CoordinatorTimings,
    ) -> Self {
        Self {
            reclaimer,
            clock,
            timings,
            state: Mutex::new(CoordinatorState::new()),
        }
    }

    /// Coordinator driven by the real monotonic clock
    pub fn with_system_clock(reclaimer: Box<dyn PlatformReclaimer>, timings: CoordinatorTimings) -> Self {
        Self::new(reclaimer, Arc::new(SystemClock), timings)
    }

    /// Runs a reclaim pass unless one is in flight or, for manual
    /// requests, the cooldown has not elapsed.
    ///
    /// Blocks for the duration of the reclaim when accepted. Never
    /// panics on its own and never returns an error: failures come back
    /// inside [`CoordinatorDecision::Accepted`].
    pub fn request_reclaim(&self, origin: ReclaimOrigin) -> CoordinatorDecision {
        if let Err(reason) = self.begin(origin) {
            let decision = CoordinatorDecision::Rejected(reason);
            report(origin, &decision);
            return decision;
        }

        debug!("Starting {} reclaim via {}", origin, self.reclaimer.name());
        let run = RunGuard { coordinator: self };
        let outcome = self.reclaimer.reclaim();
        run.complete(outcome.is_success());

        let decision = CoordinatorDecision::Accepted(outcome);
        report(origin, &decision);
        decision
    }

    /// Whether a reclaim is running or still inside its grace period
    pub fn is_reclaiming(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        state.settle(now);
        state.is_reclaiming()
    }

    /// When the last successful reclaim finished, if any
    pub fn last_reclaim(&self) -> Option<Instant> {
        self.lock().last_reclaim
    }

    fn begin(&self, origin: ReclaimOrigin) -> Result<(), RejectReason> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.settle(now);

        if state.is_reclaiming() {
            return Err(RejectReason::AlreadyRunning);
        }
        // Scheduled runs are throttled by their own interval.
        if origin == ReclaimOrigin::Manual && state.in_cooldown(now, self.timings.cooldown) {
            return Err(RejectReason::Cooldown);
        }

        state.activity = Activity::Running;
        Ok(())
    }

    fn finish(&self, succeeded: bool) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.activity = match now.checked_add(self.timings.busy_grace) {
            Some(until) => Activity::Settling { until },
            None => {
                warn!("Busy grace period {:?} is out of range, skipping it", self.timings.busy_grace);
                Activity::Idle
            }
        };
        if succeeded {
            state.last_reclaim = Some(state.last_reclaim.map_or(now, |last| last.max(now)));
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Leaves `Running` even if the reclaimer unwinds
struct RunGuard<'a> {
    coordinator: &'a ReclaimCoordinator,
}

impl RunGuard<'_> {
    fn complete(self, succeeded: bool) {
        let coordinator = self.coordinator;
        std::mem::forget(self);
        coordinator.finish(succeeded);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        warn!("Reclaim did not complete normally");
        self.coordinator.finish(false);
    }
}

/// Manual decisions are shown to the user by the caller; scheduled ones
/// only reach the log.
fn report(origin: ReclaimOrigin, decision: &CoordinatorDecision) {
    match (origin, decision) {
        (ReclaimOrigin::Manual, _) => debug!("Manual reclaim: {}", decision.user_message()),
        (ReclaimOrigin::Scheduled, CoordinatorDecision::Rejected(reason)) => {
            debug!("Scheduled reclaim skipped: {:?}", reason)
        }
        (ReclaimOrigin::Scheduled, CoordinatorDecision::Accepted(outcome)) => {
            info!("Scheduled reclaim finished: {:?}", outcome)
        }
    }
}
