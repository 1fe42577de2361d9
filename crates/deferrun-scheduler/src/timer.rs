//! One-shot timer state.

use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use uuid::Uuid;

const ARMED: u8 = 0;
const FIRING: u8 = 1;
const CANCELLED: u8 = 2;

/// A timer bound to one job id.
///
/// The state only ever moves `ARMED -> FIRING` or `ARMED -> CANCELLED`,
/// so exactly one of firing and cancelling can win.
pub(crate) struct ArmedTimer {
    job_id: Uuid,
    due_at: DateTime<Utc>,
    state: AtomicU8,
    abort: Mutex<Option<AbortHandle>>,
}

impl ArmedTimer {
    pub(crate) fn new(job_id: Uuid, due_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            due_at,
            state: AtomicU8::new(ARMED),
            abort: Mutex::new(None),
        }
    }

    pub(crate) fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub(crate) fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    /// Attach the handle of the task waiting on this timer.
    pub(crate) fn set_abort_handle(&self, handle: AbortHandle) {
        *self.abort.lock() = Some(handle);
    }

    /// Claim the timer for firing. False if it was cancelled.
    pub(crate) fn try_begin_fire(&self) -> bool {
        self.state
            .compare_exchange(ARMED, FIRING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Revoke the timer. False if firing already began.
    pub(crate) fn try_cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            if let Some(handle) = self.abort.lock().take() {
                handle.abort();
            }
        }
        won
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == ARMED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_then_cancel() {
        let timer = ArmedTimer::new(Uuid::new_v4(), Utc::now());
        assert!(timer.is_armed());
        assert!(timer.try_begin_fire());
        assert!(!timer.try_cancel());
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_cancel_then_fire() {
        let timer = ArmedTimer::new(Uuid::new_v4(), Utc::now());
        assert!(timer.try_cancel());
        assert!(!timer.try_begin_fire());
        assert!(!timer.try_cancel());
    }

    #[test]
    fn test_only_one_fire() {
        let timer = ArmedTimer::new(Uuid::new_v4(), Utc::now());
        assert!(timer.try_begin_fire());
        assert!(!timer.try_begin_fire());
    }

    #[tokio::test]
    async fn test_cancel_aborts_waiting_task() {
        let timer = ArmedTimer::new(Uuid::new_v4(), Utc::now());
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        timer.set_abort_handle(task.abort_handle());

        assert!(timer.try_cancel());
        let err = task.await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
