use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BYTES_PER_MB, NEGLIGIBLE_FREED_BYTES};

/// Where a reclaim request came from.
///
/// Only the cooldown check and the reporting channel depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReclaimOrigin {
    /// Button, hotkey, tray double-click or the `clean` command
    Manual,
    /// Auto-clean timer after a threshold check
    Scheduled,
}

/// Why a platform reclaim attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    PrivilegedApiUnavailable,
    SyncFailed,
    PermissionDenied,
    CacheDropFailed,
    UnsupportedPlatform,
}

/// Result of a single platform reclaim pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimOutcome {
    Success { freed_bytes: u64 },
    Failure { kind: FailureKind, message: String },
}

/// Why the coordinator declined to run a reclaim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    AlreadyRunning,
    Cooldown,
}

/// Answer to a `request_reclaim` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorDecision {
    Accepted(ReclaimOutcome),
    Rejected(RejectReason),
}

impl ReclaimOutcome {
    /// Builds a success from two used-memory samples.
    ///
    /// Measurement noise can make `after` larger than `before`; the
    /// difference is clamped to zero in that case.
    pub fn from_samples(before: u64, after: u64) -> Self {
        ReclaimOutcome::Success {
            freed_bytes: before.saturating_sub(after),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ReclaimOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReclaimOutcome::Success { .. })
    }

    pub fn freed_bytes(&self) -> Option<u64> {
        match self {
            ReclaimOutcome::Success { freed_bytes } => Some(*freed_bytes),
            ReclaimOutcome::Failure { .. } => None,
        }
    }
}

impl CoordinatorDecision {
    /// Human-readable message for a user waiting on a manual request
    pub fn user_message(&self) -> String {
        match self {
            CoordinatorDecision::Rejected(reason) => reason.to_string(),
            CoordinatorDecision::Accepted(ReclaimOutcome::Success { freed_bytes }) => {
                if *freed_bytes >= NEGLIGIBLE_FREED_BYTES {
                    format!("Freed {} of memory", format_mb(*freed_bytes))
                } else {
                    "System is in good shape, nothing to clean".to_string()
                }
            }
            CoordinatorDecision::Accepted(ReclaimOutcome::Failure { kind, message }) => {
                format!("Cleanup failed ({}): {}", kind, message)
            }
        }
    }
}

/// Formats a byte count as megabytes with one decimal
pub fn format_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / BYTES_PER_MB as f64)
}

impl fmt::Display for ReclaimOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReclaimOrigin::Manual => write!(f, "manual"),
            ReclaimOrigin::Scheduled => write!(f, "scheduled"),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::PrivilegedApiUnavailable => write!(f, "privileged API unavailable"),
            FailureKind::SyncFailed => write!(f, "sync failed"),
            FailureKind::PermissionDenied => write!(f, "permission denied"),
            FailureKind::CacheDropFailed => write!(f, "cache drop failed"),
            FailureKind::UnsupportedPlatform => write!(f, "unsupported platform"),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AlreadyRunning => write!(f, "Cleaning in progress, please wait..."),
            RejectReason::Cooldown => write!(f, "System was just cleaned, take a break"),
        }
    }
}
