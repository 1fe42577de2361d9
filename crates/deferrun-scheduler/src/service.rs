//! Job service - the single entry point for creating and managing jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use deferrun_core::{HandlerRegistry, Job, JobError, JobStatus, MissedJobPolicy};
use deferrun_store::JobStore;

use crate::recovery::{RecoveryManager, RecoveryReport};
use crate::scheduler::Scheduler;

/// Ties the store and the scheduler together.
pub struct JobService {
    store: Arc<JobStore>,
    scheduler: Arc<Scheduler>,
    policy: MissedJobPolicy,
}

impl JobService {
    pub fn new(store: Arc<JobStore>, handlers: Arc<HandlerRegistry>, policy: MissedJobPolicy) -> Self {
        let scheduler = Scheduler::new(store.clone(), handlers);
        Self {
            store,
            scheduler,
            policy,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Re-arm persisted jobs. Call once, before creating new jobs.
    pub async fn recover(&self) -> RecoveryReport {
        RecoveryManager::new(self.store.clone(), self.scheduler.clone(), self.policy)
            .recover()
            .await
    }

    /// Persist a new pending job and arm its timer.
    ///
    /// If the timer cannot be armed the record is removed again, so a
    /// returned error never leaves a job behind.
    pub async fn create(
        &self,
        display_name: &str,
        payload: &[u8],
        kind: &str,
        due_at: DateTime<Utc>,
    ) -> Result<Job, JobError> {
        let job = self.store.create(display_name, payload, kind, due_at).await?;

        if let Err(e) = self.scheduler.arm(&job) {
            warn!("Failed to arm job '{}', rolling back: {}", job.id, e);
            if let Err(cleanup) = self.store.delete(&job.id).await {
                warn!("Failed to roll back job '{}': {}", job.id, cleanup);
            }
            return Err(e);
        }

        Ok(job)
    }

    /// Revoke the timer and remove the job and its payload.
    ///
    /// If the job is already firing the record is still removed; the
    /// firing's outcome is then discarded.
    pub async fn delete_job(&self, id: &Uuid) -> Result<(), JobError> {
        if !self.scheduler.cancel(id) {
            info!("Job '{}' had no armed timer; deleting record only", id);
        }
        self.store.delete(id).await?;
        Ok(())
    }

    /// Revoke the timer and mark the job `Cancelled`, keeping its history.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job already fired or finished.
    pub async fn cancel_job(&self, id: &Uuid) -> Result<Job, JobError> {
        self.scheduler.cancel(id);
        let job = self.store.update_status(id, JobStatus::Cancelled, None).await?;
        info!("Cancelled job '{}'", id);
        Ok(job)
    }

    /// All jobs, ordered by due time.
    pub async fn load_all(&self) -> Vec<Job> {
        self.store.load_all().await
    }

    pub async fn get(&self, id: &Uuid) -> Option<Job> {
        self.store.get(id).await
    }

    /// Stop all timers and wait for running handlers.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
