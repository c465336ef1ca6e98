use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::environment::Environment;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Delay between two ticks of the same job.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// A job fails once its error count exceeds this.
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,
    /// A job with no leads completes once more pages than this came back empty.
    #[serde(default = "default_empty_page_limit")]
    pub empty_page_limit: u32,
    #[serde(default = "default_audit_log_cap")]
    pub audit_log_cap: usize,
    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Recorded as the actor of audit entries written by the engine.
    #[serde(default = "default_actor")]
    pub actor: String,
    /// Scripted provider replay used by the daemon.
    #[serde(default)]
    pub replay_file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_max_errors() -> u32 {
    10
}

fn default_empty_page_limit() -> u32 {
    3
}

fn default_audit_log_cap() -> usize {
    500
}

fn default_snapshot_retention() -> usize {
    10
}

fn default_event_capacity() -> usize {
    256
}

fn default_actor() -> String {
    "system".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Delay between two polls of the same job, never below one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_errors: default_max_errors(),
            empty_page_limit: default_empty_page_limit(),
            audit_log_cap: default_audit_log_cap(),
            snapshot_retention: default_snapshot_retention(),
            event_capacity: default_event_capacity(),
            environment: Environment::default(),
            database_path: None,
            actor: default_actor(),
            replay_file: None,
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_has_one_second_floor() {
        let config = EngineConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(
            EngineConfig::default().poll_interval(),
            Duration::from_secs(default_poll_interval_secs())
        );
    }
}
