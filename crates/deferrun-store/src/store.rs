//! Job store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use deferrun_core::{Clock, Job, JobError, JobStatus, PayloadRetention};

use crate::backend::StoreBackend;
use crate::schema::{Snapshot, UnreadableRecord};

/// Durable, single-writer collection of jobs.
///
/// Every mutation runs under one lock: the collection is cloned, changed,
/// persisted through the backend, and only then swapped in. A failed
/// persist therefore leaves both disk and memory as they were.
pub struct JobStore {
    backend: Arc<dyn StoreBackend>,
    clock: Arc<dyn Clock>,
    retention: PayloadRetention,
    state: Mutex<Snapshot>,
}

impl JobStore {
    /// Open a store, loading whatever the backend holds.
    pub async fn open(
        backend: Arc<dyn StoreBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, JobError> {
        let snapshot = match backend.load().await? {
            Some(envelope) => Snapshot::from_envelope(envelope)?,
            None => Snapshot::default(),
        };

        info!(
            "Job store opened: {} job(s), {} unreadable record(s)",
            snapshot.jobs.len(),
            snapshot.unreadable.len()
        );

        Ok(Self {
            backend,
            clock,
            retention: PayloadRetention::default(),
            state: Mutex::new(snapshot),
        })
    }

    /// Set the payload retention policy.
    pub fn with_retention(mut self, retention: PayloadRetention) -> Self {
        self.retention = retention;
        self
    }

    /// The clock used for validation and timestamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Create a pending job.
    ///
    /// The payload is written first, then the record. If the record cannot
    /// be persisted the payload is removed again.
    pub async fn create(
        &self,
        display_name: &str,
        payload: &[u8],
        kind: &str,
        due_at: DateTime<Utc>,
    ) -> Result<Job, JobError> {
        if display_name.trim().is_empty() {
            return Err(JobError::Validation("display name must not be empty".to_string()));
        }
        if kind.trim().is_empty() {
            return Err(JobError::Validation("kind must not be empty".to_string()));
        }

        let mut state = self.state.lock().await;

        let now = self.clock.now();
        if due_at <= now {
            return Err(JobError::Validation(format!(
                "due time {} is not in the future (now {})",
                due_at.to_rfc3339(),
                now.to_rfc3339()
            )));
        }

        let mut id = Uuid::new_v4();
        while state.contains(&id) {
            id = Uuid::new_v4();
        }

        let payload_path = self.backend.write_payload(&id, display_name, payload).await?;
        let job = Job::new(id, display_name, payload_path, kind, due_at, now);

        let mut next = state.clone();
        next.jobs.push(job.clone());

        if let Err(e) = self.persist(&next).await {
            if let Err(cleanup) = self.backend.remove_payload(&job.payload_path).await {
                warn!("Failed to remove payload of unsaved job '{}': {}", id, cleanup);
            }
            return Err(e);
        }
        *state = next;

        info!(
            "Created job '{}' ({}, kind={}) due at {}",
            job.id,
            job.display_name,
            job.kind,
            job.due_at.to_rfc3339()
        );
        Ok(job)
    }

    /// Move a job to `status`.
    ///
    /// `executed_at` defaults to the clock's now and is only recorded for
    /// terminal statuses.
    pub async fn update_status(
        &self,
        id: &Uuid,
        status: JobStatus,
        executed_at: Option<DateTime<Utc>>,
    ) -> Result<Job, JobError> {
        self.apply(id, status, executed_at, None).await
    }

    /// Record a terminal outcome together with the handler's output.
    pub async fn record_outcome(
        &self,
        id: &Uuid,
        status: JobStatus,
        output: impl Into<String>,
    ) -> Result<Job, JobError> {
        self.apply(id, status, None, Some(output.into())).await
    }

    async fn apply(
        &self,
        id: &Uuid,
        status: JobStatus,
        executed_at: Option<DateTime<Utc>>,
        output: Option<String>,
    ) -> Result<Job, JobError> {
        let mut state = self.state.lock().await;

        let mut next = state.clone();
        let job = next.find_mut(id).ok_or(JobError::NotFound(*id))?;
        let at = executed_at.unwrap_or_else(|| self.clock.now());
        job.transition(status, at)?;
        if output.is_some() {
            job.output = output;
        }
        let updated = job.clone();

        self.persist(&next).await?;
        *state = next;
        drop(state);

        debug!("Job '{}' is now {}", id, status);

        if status.is_terminal() && self.retention == PayloadRetention::RemoveOnTerminal {
            self.discard_payload(&updated).await;
        }
        Ok(updated)
    }

    /// Remove a job and its payload.
    pub async fn delete(&self, id: &Uuid) -> Result<Job, JobError> {
        let mut state = self.state.lock().await;

        let mut next = state.clone();
        let index = next
            .jobs
            .iter()
            .position(|job| job.id == *id)
            .ok_or(JobError::NotFound(*id))?;
        let removed = next.jobs.remove(index);

        self.persist(&next).await?;
        *state = next;
        drop(state);

        self.discard_payload(&removed).await;
        info!("Deleted job '{}'", id);
        Ok(removed)
    }

    /// Consistent snapshot of all jobs, ordered by due time.
    pub async fn load_all(&self) -> Vec<Job> {
        let state = self.state.lock().await;
        let mut jobs = state.jobs.clone();
        drop(state);

        jobs.sort_by(|a, b| {
            a.due_at
                .cmp(&b.due_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        jobs
    }

    /// Get a job by ID.
    pub async fn get(&self, id: &Uuid) -> Option<Job> {
        self.state.lock().await.find(id).cloned()
    }

    /// Records that could not be decoded when the store was opened.
    pub async fn unreadable(&self) -> Vec<UnreadableRecord> {
        self.state.lock().await.unreadable.clone()
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), JobError> {
        let envelope = snapshot.to_envelope()?;
        self.backend.persist(&envelope).await
    }

    async fn discard_payload(&self, job: &Job) {
        if let Err(e) = self.backend.remove_payload(&job.payload_path).await {
            warn!("Failed to remove payload for job '{}': {}", job.id, e);
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
