//! Job definition and status.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting for its due time.
    Pending,
    /// Handler is running.
    Executing,
    /// Handler reported success.
    Executed,
    /// Handler reported failure, errored, or no handler existed.
    Failed,
    /// Due time passed while the process was down.
    Expired,
    /// Cancelled before it fired.
    Cancelled,
}

impl JobStatus {
    /// Returns true if no transition leaves this status.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Executed | Self::Failed | Self::Expired | Self::Cancelled
        )
    }

    /// Whether the state machine allows `self -> next`.
    pub const fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Pending, Self::Expired)
                | (Self::Executing, Self::Executed)
                | (Self::Executing, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "Pending",
            Self::Executing => "Executing",
            Self::Executed => "Executed",
            Self::Failed => "Failed",
            Self::Expired => "Expired",
            Self::Cancelled => "Cancelled",
        })
    }
}

/// A deferred job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID.
    pub id: Uuid,
    /// Human label, usually the uploaded file name.
    pub display_name: String,
    /// Where the stored payload lives.
    pub payload_path: PathBuf,
    /// Selects the handler.
    pub kind: String,
    /// When the job fires.
    pub due_at: DateTime<Utc>,
    /// Current status.
    pub status: JobStatus,
    /// Set once, when the job reaches a terminal status.
    pub executed_at: Option<DateTime<Utc>>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Captured handler output or failure reason.
    #[serde(default)]
    pub output: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        id: Uuid,
        display_name: impl Into<String>,
        payload_path: impl Into<PathBuf>,
        kind: impl Into<String>,
        due_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            payload_path: payload_path.into(),
            kind: kind.into(),
            due_at,
            status: JobStatus::Pending,
            executed_at: None,
            created_at: Some(created_at),
            output: None,
        }
    }

    /// Move to `next`, stamping `executed_at` when `next` is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTransition`] if the state machine forbids it.
    pub fn transition(
        &mut self,
        next: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if next.is_terminal() {
            self.executed_at = Some(at);
        }
        Ok(())
    }

    /// Check if the job is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }

    /// Check if the job is past due at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

/// Derive a job kind from a file name: its lowercase extension.
///
/// `"report.XLSX"` gives `Some("xlsx")`; names without an extension give `None`.
pub fn kind_from_name(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}
