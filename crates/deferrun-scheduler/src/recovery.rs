//! Startup reconciliation of persisted jobs.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use deferrun_core::{Clock, Job, JobError, JobStatus, MissedJobPolicy};
use deferrun_store::JobStore;

use crate::scheduler::Scheduler;

/// Output recorded for a job that was executing when the process stopped.
pub const INTERRUPTED_OUTPUT: &str = "interrupted by restart";

/// What recovery did with each persisted record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Future jobs armed at their original due time.
    pub armed: Vec<Uuid>,
    /// Overdue jobs marked `Expired`.
    pub expired: Vec<Uuid>,
    /// Overdue jobs armed to fire immediately.
    pub caught_up: Vec<Uuid>,
    /// Jobs found `Executing`, now `Failed`.
    pub interrupted: Vec<Uuid>,
    /// Records that could not be decoded or reconciled.
    pub skipped: Vec<String>,
}

impl RecoveryReport {
    /// Check if every record was recovered.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Turn a report with skipped records into [`JobError::PartialRecovery`].
    pub fn into_result(self) -> Result<Self, JobError> {
        if self.skipped.is_empty() {
            Ok(self)
        } else {
            Err(JobError::PartialRecovery {
                skipped: self.skipped,
            })
        }
    }
}

/// Re-arms or reconciles persisted jobs at startup.
pub struct RecoveryManager {
    store: Arc<JobStore>,
    scheduler: Arc<Scheduler>,
    policy: MissedJobPolicy,
}

impl RecoveryManager {
    pub fn new(store: Arc<JobStore>, scheduler: Arc<Scheduler>, policy: MissedJobPolicy) -> Self {
        Self {
            store,
            scheduler,
            policy,
        }
    }

    /// Walk every persisted record once.
    ///
    /// Never fails as a whole: records that cannot be handled are listed in
    /// [`RecoveryReport::skipped`] and the rest are still processed.
    pub async fn recover(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        for record in self.store.unreadable().await {
            warn!("Skipping unreadable record {}: {}", record.label, record.reason);
            report.skipped.push(record.label);
        }

        let now = self.store.clock().now();
        for job in self.store.load_all().await {
            match job.status {
                JobStatus::Pending if job.is_overdue(now) => self.reconcile_missed(&job, &mut report).await,
                JobStatus::Pending => match self.scheduler.arm(&job) {
                    Ok(()) => report.armed.push(job.id),
                    Err(e) => skip(&mut report, &job, &e),
                },
                JobStatus::Executing => {
                    match self
                        .store
                        .record_outcome(&job.id, JobStatus::Failed, INTERRUPTED_OUTPUT)
                        .await
                    {
                        Ok(_) => {
                            warn!("Job '{}' was interrupted by a restart; marked failed", job.id);
                            report.interrupted.push(job.id);
                        }
                        Err(e) => skip(&mut report, &job, &e),
                    }
                }
                _ => {}
            }
        }

        info!(
            "Recovery finished (policy={}): {} armed, {} expired, {} caught up, {} interrupted, {} skipped",
            self.policy,
            report.armed.len(),
            report.expired.len(),
            report.caught_up.len(),
            report.interrupted.len(),
            report.skipped.len()
        );
        report
    }

    async fn reconcile_missed(&self, job: &Job, report: &mut RecoveryReport) {
        match self.policy {
            MissedJobPolicy::Expire => {
                match self.store.update_status(&job.id, JobStatus::Expired, None).await {
                    Ok(_) => {
                        info!("Job '{}' missed its due time {}; expired", job.id, job.due_at.to_rfc3339());
                        report.expired.push(job.id);
                    }
                    Err(e) => skip(report, job, &e),
                }
            }
            MissedJobPolicy::RunImmediately => match self.scheduler.arm(job) {
                Ok(()) => {
                    info!("Job '{}' missed its due time {}; running now", job.id, job.due_at.to_rfc3339());
                    report.caught_up.push(job.id);
                }
                Err(e) => skip(report, job, &e),
            },
        }
    }
}

fn skip(report: &mut RecoveryReport, job: &Job, error: &JobError) {
    warn!("Skipping job '{}' during recovery: {}", job.id, error);
    report.skipped.push(job.id.to_string());
}
