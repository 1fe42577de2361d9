//! Named policies shared by the store, the scheduler and configuration.

use serde::{Deserialize, Serialize};

/// What happens to a payload once its job reaches a terminal status.
///
/// Deleting a job always removes its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadRetention {
    /// Leave the payload on disk.
    #[default]
    Keep,
    /// Remove the payload when the job is executed, failed, expired or cancelled.
    RemoveOnTerminal,
}

/// How recovery treats pending jobs whose due time passed while the process was down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedJobPolicy {
    /// Mark them `Expired`; they never run.
    #[default]
    Expire,
    /// Run them right away (catch-up).
    RunImmediately,
}

impl std::fmt::Display for MissedJobPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissedJobPolicy::Expire => write!(f, "expire"),
            MissedJobPolicy::RunImmediately => write!(f, "run_immediately"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        retention: PayloadRetention,
        missed: MissedJobPolicy,
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PayloadRetention::default(), PayloadRetention::Keep);
        assert_eq!(MissedJobPolicy::default(), MissedJobPolicy::Expire);
    }

    #[test]
    fn test_snake_case_names() {
        let parsed: Wrapper = serde_json::from_str(
            r#"{"retention": "remove_on_terminal", "missed": "run_immediately"}"#,
        )
        .unwrap();
        assert_eq!(parsed.retention, PayloadRetention::RemoveOnTerminal);
        assert_eq!(parsed.missed, MissedJobPolicy::RunImmediately);
    }

    #[test]
    fn test_display() {
        assert_eq!(MissedJobPolicy::RunImmediately.to_string(), "run_immediately");
    }
}
