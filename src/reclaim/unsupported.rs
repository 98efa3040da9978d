use log::debug;

use crate::models::{FailureKind, ReclaimOutcome};
use crate::reclaim::PlatformReclaimer;

/// Reclaimer for platforms without a reclaim procedure (macOS and others).
///
/// Fails immediately and never samples memory.
#[derive(Debug, Clone)]
pub struct UnsupportedReclaimer {
    platform: String,
}

impl UnsupportedReclaimer {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    pub fn for_current_os() -> Self {
        Self::new(std::env::consts::OS)
    }

    fn message(&self) -> String {
        match self.platform.as_str() {
            "macos" => "macOS manages memory on its own; manual reclaim is not needed".to_string(),
            other => format!("memory reclaim is not supported on {}", other),
        }
    }
}

impl PlatformReclaimer for UnsupportedReclaimer {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn reclaim(&self) -> ReclaimOutcome {
        debug!("Reclaim requested on unsupported platform {}", self.platform);
        ReclaimOutcome::failure(FailureKind::UnsupportedPlatform, self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macos_is_unsupported() {
        let reclaimer = UnsupportedReclaimer::new("macos");
        match reclaimer.reclaim() {
            ReclaimOutcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::UnsupportedPlatform);
                assert!(message.contains("macOS"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_other_platforms_name_the_os() {
        let outcome = UnsupportedReclaimer::new("freebsd").reclaim();
        assert_eq!(
            outcome,
            ReclaimOutcome::failure(
                FailureKind::UnsupportedPlatform,
                "memory reclaim is not supported on freebsd"
            )
        );
    }

    #[test]
    fn test_repeated_calls_always_fail() {
        let reclaimer = UnsupportedReclaimer::for_current_os();
        for _ in 0..3 {
            assert!(!reclaimer.reclaim().is_success());
        }
    }
}
