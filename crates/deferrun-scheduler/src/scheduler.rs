//! Scheduler - one armed one-shot timer per pending job.
//!
//! Each armed job gets its own task that waits on the [`Clock`] for the
//! due time. When the wait ends the task claims the timer, moves the job
//! to `Executing` through the store, runs the handler in a separate task
//! and writes the outcome back.
//!
//! Two gates keep firing at-most-once:
//!
//! - the timer's own `ARMED -> FIRING | CANCELLED` state
//! - the store's `Pending -> Executing` transition, which fails for a job
//!   that was cancelled, deleted or already fired

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deferrun_core::{Clock, HandlerRegistry, Job, JobError, JobStatus};
use deferrun_store::JobStore;

use crate::timer::ArmedTimer;

/// Output recorded for a handler that panicked.
const HANDLER_PANICKED: &str = "handler panicked";

/// Job scheduler.
pub struct Scheduler {
    store: Arc<JobStore>,
    handlers: Arc<HandlerRegistry>,
    clock: Arc<dyn Clock>,
    timers: DashMap<Uuid, Arc<ArmedTimer>>,
    tracker: TaskTracker,
}

impl Scheduler {
    /// Create a scheduler that fires through `handlers` and reports to `store`.
    ///
    /// Uses the store's clock.
    pub fn new(store: Arc<JobStore>, handlers: Arc<HandlerRegistry>) -> Arc<Self> {
        let clock = store.clock().clone();
        Arc::new(Self {
            store,
            handlers,
            clock,
            timers: DashMap::new(),
            tracker: TaskTracker::new(),
        })
    }

    /// Arm a one-shot timer for `job`, due at `job.due_at`.
    ///
    /// A due time already in the past fires on the next scheduling pass.
    ///
    /// # Errors
    ///
    /// - [`JobError::DuplicateJob`] if the id is already armed
    /// - [`JobError::Validation`] if the job is not pending
    pub fn arm(self: &Arc<Self>, job: &Job) -> Result<(), JobError> {
        if job.status != JobStatus::Pending {
            return Err(JobError::Validation(format!(
                "cannot arm job {} in status {}",
                job.id, job.status
            )));
        }

        let timer = match self.timers.entry(job.id) {
            Entry::Occupied(_) => return Err(JobError::DuplicateJob(job.id)),
            Entry::Vacant(slot) => {
                let timer = Arc::new(ArmedTimer::new(job.id, job.due_at));
                slot.insert(timer.clone());
                timer
            }
        };

        let this = self.clone();
        let task_timer = timer.clone();
        let handle = self.tracker.spawn(async move {
            this.run_timer(task_timer).await;
        });
        timer.set_abort_handle(handle.abort_handle());

        info!("Armed job '{}' for {}", job.id, job.due_at.to_rfc3339());
        Ok(())
    }

    /// Revoke the timer for `id`.
    ///
    /// Returns true if the timer was cancelled before firing began. False
    /// means nothing was armed or the firing already started; in the latter
    /// case the firing runs to completion.
    pub fn cancel(&self, id: &Uuid) -> bool {
        let Some((_, timer)) = self.timers.remove(id) else {
            debug!("No armed timer for job '{}'", id);
            return false;
        };

        let won = timer.try_cancel();
        if won {
            info!("Cancelled timer for job '{}'", id);
        } else {
            debug!("Cancel lost the race for job '{}': already firing", id);
        }
        won
    }

    /// Check if a timer is armed for `id`.
    pub fn is_armed(&self, id: &Uuid) -> bool {
        self.timers.get(id).is_some_and(|timer| timer.is_armed())
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> usize {
        self.timers.iter().filter(|entry| entry.value().is_armed()).count()
    }

    /// Cancel every armed timer and wait for in-flight firings to finish.
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.timers.iter().map(|entry| *entry.key()).collect();
        for id in &ids {
            self.cancel(id);
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("Scheduler stopped ({} timer(s) cancelled)", ids.len());
    }

    async fn run_timer(self: Arc<Self>, timer: Arc<ArmedTimer>) {
        let id = timer.job_id();
        self.clock.sleep_until(timer.due_at()).await;

        if !timer.try_begin_fire() {
            debug!("Timer for job '{}' was cancelled before firing", id);
            return;
        }
        self.timers.remove_if(&id, |_, armed| Arc::ptr_eq(armed, &timer));

        self.fire(id).await;
    }

    /// Execute a due job and persist its outcome.
    async fn fire(&self, id: Uuid) {
        let job = match self.store.update_status(&id, JobStatus::Executing, None).await {
            Ok(job) => job,
            Err(JobError::NotFound(_)) => {
                warn!("Job '{}' was deleted before it fired; ignoring", id);
                return;
            }
            Err(JobError::InvalidTransition { from, .. }) => {
                warn!("Job '{}' is {} and will not fire", id, from);
                return;
            }
            Err(e) => {
                error!("Failed to mark job '{}' as executing: {}", id, e);
                return;
            }
        };

        info!("Firing job '{}' ({}, kind={})", job.id, job.display_name, job.kind);

        let (status, output) = self.dispatch(&job).await;
        match self.store.record_outcome(&id, status, output).await {
            Ok(_) => info!("Job '{}' finished: {}", id, status),
            Err(JobError::NotFound(_)) => {
                warn!("Job '{}' was deleted while executing; outcome {} dropped", id, status);
            }
            Err(e) => error!("Failed to record outcome for job '{}': {}", id, e),
        }
    }

    /// Run the handler for `job`, turning every failure into `Failed`.
    async fn dispatch(&self, job: &Job) -> (JobStatus, String) {
        let handler = match self.handlers.resolve(&job.kind) {
            Ok(handler) => handler,
            Err(e) => {
                warn!("Job '{}': {}", job.id, e);
                return (JobStatus::Failed, e.to_string());
            }
        };

        let payload_path = job.payload_path.clone();
        let result = tokio::spawn(async move { handler.process(&payload_path).await }).await;

        match result {
            Ok(Ok(out)) if out.success => (JobStatus::Executed, out.output),
            Ok(Ok(out)) => (JobStatus::Failed, out.output),
            Ok(Err(e)) => {
                warn!("Handler for job '{}' failed: {}", job.id, e);
                (JobStatus::Failed, e.to_string())
            }
            Err(e) => {
                error!("Handler for job '{}' did not complete: {}", job.id, e);
                (JobStatus::Failed, HANDLER_PANICKED.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
