//! Job errors.

use thiserror::Error;
use uuid::Uuid;

use crate::job::JobStatus;

/// Job error types.
#[derive(Debug, Error)]
pub enum JobError {
    /// Input rejected before anything was persisted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The job id already has an armed timer.
    #[error("Job already armed: {0}")]
    DuplicateJob(Uuid),

    /// A handler for the kind is already registered.
    #[error("Handler already registered for kind: {0}")]
    DuplicateHandler(String),

    /// No handler registered for the kind.
    #[error("Unsupported job kind: {0}")]
    UnsupportedKind(String),

    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// Status change not allowed by the job state machine.
    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Some records could not be recovered at startup.
    #[error("Recovery skipped {} record(s): {}", skipped.len(), skipped.join(", "))]
    PartialRecovery { skipped: Vec<String> },
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::Storage(format!("Serialization error: {}", err))
    }
}

/// Errors raised by a handler while processing a payload.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Processing exceeded its time bound.
    #[error("Handler timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Processing failed.
    #[error("Execution failed: {0}")]
    Execution(String),
}
