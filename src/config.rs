//! Application-level configuration loading for the scheduler and its
//! activity wrappers.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::{activity::ActivityOptions, scheduler::SchedulerOptions};

/// Default location on disk where the worker looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DOMINO_LEAGUE_CONFIG_PATH";
/// Default quiet window applied to debounced game update streams.
const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Scheduler tuning.
    pub scheduler: SchedulerOptions,
    /// Activity monitor tuning.
    pub activity: ActivityOptions,
    /// Quiet window for debounced game update streams.
    pub update_debounce: Duration,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        interval = ?config.scheduler.interval,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerOptions::default(),
            activity: ActivityOptions::default(),
            update_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file. Every field is optional;
/// missing ones keep their defaults.
struct RawConfig {
    scheduler: Option<RawScheduler>,
    activity: Option<RawActivity>,
    update_debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawScheduler {
    interval_secs: Option<u64>,
    batch_size: Option<usize>,
    batch_delay_ms: Option<u64>,
    max_no_update_cycles: Option<u32>,
    cleanup_every_runs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawActivity {
    active_interval_secs: Option<u64>,
    inactive_interval_secs: Option<u64>,
    min_event_gap_secs: Option<u64>,
    inactivity_timeout_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let raw_scheduler = value.scheduler.unwrap_or_default();
        let raw_activity = value.activity.unwrap_or_default();

        let scheduler = SchedulerOptions {
            interval: raw_scheduler
                .interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.scheduler.interval),
            batch_size: raw_scheduler
                .batch_size
                .unwrap_or(defaults.scheduler.batch_size),
            batch_delay: raw_scheduler
                .batch_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.scheduler.batch_delay),
            max_no_update_cycles: raw_scheduler
                .max_no_update_cycles
                .unwrap_or(defaults.scheduler.max_no_update_cycles),
            cleanup_every_runs: raw_scheduler
                .cleanup_every_runs
                .unwrap_or(defaults.scheduler.cleanup_every_runs),
        };
        let activity = ActivityOptions {
            active_interval: raw_activity
                .active_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(scheduler.interval),
            inactive_interval: raw_activity
                .inactive_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.activity.inactive_interval),
            min_event_gap: raw_activity
                .min_event_gap_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.activity.min_event_gap),
            inactivity_timeout: raw_activity
                .inactivity_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.activity.inactivity_timeout),
        };

        Self {
            scheduler,
            activity,
            update_debounce: value
                .update_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.update_debounce),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"scheduler": {"interval_secs": 30}, "update_debounce_ms": 150}"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.scheduler.interval, Duration::from_secs(30));
        assert_eq!(config.scheduler.batch_size, 10);
        assert_eq!(config.update_debounce, Duration::from_millis(150));
        // Without an explicit active interval the activity monitor follows
        // the scheduler interval.
        assert_eq!(config.activity.active_interval, Duration::from_secs(30));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config, AppConfig::default());
    }
}
