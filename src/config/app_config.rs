use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BUSY_GRACE, DEFAULT_CLEAN_INTERVAL_MINUTES, DEFAULT_COOLDOWN,
    DEFAULT_MEM_THRESHOLD_PERCENT, DEFAULT_SETTLE_DELAY, MAX_BUSY_GRACE_SECS,
    MAX_CLEAN_INTERVAL_MINUTES, MAX_COOLDOWN_SECS, MAX_SETTLE_DELAY_MS,
};
use crate::coordinator::CoordinatorTimings;

/// Which statistic the front end shows by default
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMetric {
    #[default]
    Mem,
    Cpu,
}

/// Threshold-triggered background reclaim
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AutoCleanConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    /// Reclaim only when memory usage is strictly above this percentage
    pub threshold_percent: u8,
}

/// Tunable timing windows
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub cooldown_secs: u64,
    pub busy_grace_secs: u64,
    pub settle_delay_ms: u64,
}

/// Application configuration, stored as YAML.
///
/// Keys missing from an older file fall back to their defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub auto_clean: AutoCleanConfig,
    pub display_metric: DisplayMetric,
    pub timings: TimingConfig,
}

impl Default for AutoCleanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_CLEAN_INTERVAL_MINUTES,
            threshold_percent: DEFAULT_MEM_THRESHOLD_PERCENT,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN.as_secs(),
            busy_grace_secs: DEFAULT_BUSY_GRACE.as_secs(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
        }
    }
}

impl AutoCleanConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

impl TimingConfig {
    pub fn coordinator_timings(&self) -> CoordinatorTimings {
        CoordinatorTimings {
            cooldown: Duration::from_secs(self.cooldown_secs),
            busy_grace: Duration::from_secs(self.busy_grace_secs),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let mut config: AppConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;
        config.validate();

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        AppConfig::default().save_to_yaml_file(path)
    }

    /// Clamps values that would make the scheduler or coordinator misbehave
    pub fn validate(&mut self) {
        if self.auto_clean.interval_minutes == 0 {
            warn!("auto_clean.interval_minutes must be at least 1, using 1");
            self.auto_clean.interval_minutes = 1;
        }
        clamp_max("auto_clean.interval_minutes", &mut self.auto_clean.interval_minutes, MAX_CLEAN_INTERVAL_MINUTES);
        clamp_max("timings.cooldown_secs", &mut self.timings.cooldown_secs, MAX_COOLDOWN_SECS);
        clamp_max("timings.busy_grace_secs", &mut self.timings.busy_grace_secs, MAX_BUSY_GRACE_SECS);
        clamp_max("timings.settle_delay_ms", &mut self.timings.settle_delay_ms, MAX_SETTLE_DELAY_MS);
        let threshold = self.auto_clean.threshold_percent.clamp(1, 100);
        if threshold != self.auto_clean.threshold_percent {
            warn!(
                "auto_clean.threshold_percent {} out of range, using {}",
                self.auto_clean.threshold_percent, threshold
            );
            self.auto_clean.threshold_percent = threshold;
        }
    }
}

fn clamp_max(key: &str, value: &mut u64, max: u64) {
    if *value > max {
        warn!("{} {} is too large, using {}", key, value, max);
        *value = max;
    }
}

/// Load the configuration file if it exists, defaults otherwise.
///
/// Unlike [`load_or_create_config`] this never writes to disk.
pub fn load_config_or_default(config_path: &Path) -> Result<AppConfig> {
    if config_path.exists() {
        AppConfig::from_yaml_file(config_path)
    } else {
        debug!("{} not found, using default configuration", config_path.display());
        Ok(AppConfig::default())
    }
}

/// Load a configuration file or create a default one.
///
/// * `Some(path)` that exists is parsed; a missing one is created with
///   defaults.
/// * `None` returns the defaults without touching the disk.
///
/// Returns an error only if an existing file cannot be read or parsed,
/// or a new one cannot be written.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<AppConfig> {
    match config_path {
        Some(path) if path.exists() => AppConfig::from_yaml_file(path),
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let config = AppConfig::default();
            config.save_to_yaml_file(path)?;
            Ok(config)
        }
        None => {
            info!("No config path provided, using default configuration");
            Ok(AppConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_constants() {
        let config = AppConfig::default();
        assert!(!config.auto_clean.enabled);
        assert_eq!(config.auto_clean.interval(), Duration::from_secs(300));
        assert_eq!(config.auto_clean.threshold_percent, 80);
        assert_eq!(config.display_metric, DisplayMetric::Mem);
        assert_eq!(config.timings.coordinator_timings(), CoordinatorTimings::default());
        assert_eq!(config.timings.settle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "auto_clean:\n  enabled: true\ndisplay_metric: cpu\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.auto_clean.enabled);
        assert_eq!(config.auto_clean.interval_minutes, 5);
        assert_eq!(config.display_metric, DisplayMetric::Cpu);
        assert_eq!(config.timings.cooldown_secs, 15);
    }

    #[test]
    fn test_validate_clamps_values() {
        let mut config = AppConfig::default();
        config.auto_clean.interval_minutes = 0;
        config.auto_clean.threshold_percent = 150;

        config.validate();

        assert_eq!(config.auto_clean.interval_minutes, 1);
        assert_eq!(config.auto_clean.threshold_percent, 100);
    }

    #[test]
    fn test_load_or_create_writes_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let created = load_or_create_config(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(created, AppConfig::default());

        let reloaded = load_or_create_config(Some(&path)).unwrap();
        assert_eq!(reloaded, created);
    }

    #[test]
    fn test_load_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "timings:\n  cooldown_secs: 30\n  settle_delay_ms: 0\n").unwrap();

        let config = load_or_create_config(Some(&path)).unwrap();

        assert_eq!(config.timings.cooldown_secs, 30);
        assert_eq!(config.timings.busy_grace_secs, 3);
        assert_eq!(config.timings.settle_delay(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "auto_clean: [not, a, map]\n").unwrap();

        assert!(load_or_create_config(Some(&path)).is_err());
    }

    #[test]
    fn test_none_path_returns_defaults() {
        assert_eq!(load_or_create_config(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_validate_clamps_huge_values() {
        let yaml = "auto_clean:\n  interval_minutes: 18446744073709551615\n\
                    timings:\n  cooldown_secs: 18446744073709551615\n  \
                    busy_grace_secs: 18446744073709551615\n  settle_delay_ms: 18446744073709551615\n";
        let mut config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        config.validate();

        assert_eq!(config.auto_clean.interval_minutes, MAX_CLEAN_INTERVAL_MINUTES);
        assert_eq!(config.auto_clean.interval(), Duration::from_secs(MAX_CLEAN_INTERVAL_MINUTES * 60));
        assert_eq!(config.timings.cooldown_secs, MAX_COOLDOWN_SECS);
        assert_eq!(config.timings.busy_grace_secs, MAX_BUSY_GRACE_SECS);
        assert_eq!(config.timings.settle_delay_ms, MAX_SETTLE_DELAY_MS);
    }

    #[test]
    fn test_unvalidated_interval_saturates() {
        let auto_clean = AutoCleanConfig {
            interval_minutes: u64::MAX,
            ..AutoCleanConfig::default()
        };
        assert_eq!(auto_clean.interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_huge_busy_grace_from_file_is_clamped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "timings:\n  busy_grace_secs: 18446744073709551615\n").unwrap();

        let config = AppConfig::from_yaml_file(&path).unwrap();

        assert_eq!(
            config.timings.coordinator_timings().busy_grace,
            Duration::from_secs(MAX_BUSY_GRACE_SECS)
        );
    }

    #[test]
    fn test_load_config_or_default_does_not_create_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let config = load_config_or_default(&path).unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(!path.exists());
    }
}
