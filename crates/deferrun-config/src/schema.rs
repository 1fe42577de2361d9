//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;

use deferrun_core::{MissedJobPolicy, PayloadRetention};
use serde::{Deserialize, Serialize};

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Handlers keyed by job kind.
    #[serde(default)]
    pub handlers: HashMap<String, HandlerConfig>,
}

/// Where and how jobs are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub payload_retention: PayloadRetention,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            payload_retention: PayloadRetention::default(),
        }
    }
}

impl StoreConfig {
    /// The data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.data_dir))
    }
}

fn default_data_dir() -> String {
    dirs::home_dir()
        .map(|home| home.join(".deferrun").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".deferrun".to_string())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// What recovery does with pending jobs whose due time passed while the
    /// process was down.
    #[serde(default)]
    pub missed_job_policy: MissedJobPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write a daily log file under `<data_dir>/logs`.
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: true,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// An external program that processes payloads of one kind.
///
/// The payload path is appended as the last argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Kill the program after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store.data_dir.ends_with(".deferrun"));
        assert_eq!(config.store.payload_retention, PayloadRetention::Keep);
        assert_eq!(config.scheduler.missed_job_policy, MissedJobPolicy::Expire);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file);
        assert!(config.handlers.is_empty());
    }

    #[test]
    fn test_data_dir_expands_tilde() {
        let store = StoreConfig {
            data_dir: "~/jobs".to_string(),
            payload_retention: PayloadRetention::Keep,
        };
        let dir = store.data_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
        assert!(dir.ends_with("jobs"));
    }

    #[test]
    fn test_handler_defaults() {
        let handler: HandlerConfig = toml::from_str(r#"program = "python3""#).unwrap();
        assert_eq!(handler.program, "python3");
        assert!(handler.args.is_empty());
        assert!(handler.timeout_secs.is_none());
    }

    #[test]
    fn test_policies_deserialize() {
        let config: Config = toml::from_str(
            r#"
            [store]
            payload_retention = "remove_on_terminal"

            [scheduler]
            missed_job_policy = "run_immediately"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.payload_retention, PayloadRetention::RemoveOnTerminal);
        assert_eq!(config.scheduler.missed_job_policy, MissedJobPolicy::RunImmediately);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [scheduler]
            missed_job_policy = "retry_forever"
            "#,
        );
        assert!(result.is_err());
    }
}
