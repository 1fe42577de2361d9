//! Shared fixtures for the scheduler unit tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use deferrun_core::{
    Clock, Handler, HandlerError, HandlerOutput, HandlerRegistry, JobStatus, ManualClock,
};
use deferrun_store::{JobStore, MemoryBackend};
use tokio::sync::Notify;
use uuid::Uuid;

/// What a [`RecordingHandler`] does when invoked.
#[derive(Clone, Copy)]
pub(crate) enum Outcome {
    Succeed,
    Fail,
    Error,
    Panic,
}

/// Handler that counts its invocations.
pub(crate) struct RecordingHandler {
    kind: String,
    outcome: Outcome,
    calls: AtomicUsize,
}

impl RecordingHandler {
    pub(crate) fn new(kind: &str, outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            kind: kind.to_string(),
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn process(&self, payload_path: &Path) -> Result<HandlerOutput, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Succeed => Ok(HandlerOutput::success(format!(
                "processed {}",
                payload_path.display()
            ))),
            Outcome::Fail => Ok(HandlerOutput::failure("exit code 1")),
            Outcome::Error => Err(HandlerError::Execution("boom".to_string())),
            Outcome::Panic => panic!("handler exploded"),
        }
    }
}

/// Handler that blocks inside `process` until released.
pub(crate) struct GatedHandler {
    kind: String,
    started: Notify,
    release: Notify,
}

impl GatedHandler {
    pub(crate) fn new(kind: &str) -> Arc<Self> {
        Arc::new(Self {
            kind: kind.to_string(),
            started: Notify::new(),
            release: Notify::new(),
        })
    }

    /// Wait until a call to `process` is in progress.
    pub(crate) async fn started(&self) {
        self.started.notified().await;
    }

    /// Let the in-progress call return.
    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Handler for GatedHandler {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn process(&self, _payload_path: &Path) -> Result<HandlerOutput, HandlerError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(HandlerOutput::success("released"))
    }
}

pub(crate) struct Fixture {
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) backend: Arc<MemoryBackend>,
    pub(crate) store: Arc<JobStore>,
    pub(crate) handlers: Arc<HandlerRegistry>,
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new())).await
    }

    pub(crate) async fn with_backend(backend: Arc<MemoryBackend>) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = JobStore::open(backend.clone(), clock.clone()).await.unwrap();
        Self {
            clock,
            backend,
            store: Arc::new(store),
            handlers: Arc::new(HandlerRegistry::new()),
        }
    }

    pub(crate) fn register(&self, handler: Arc<RecordingHandler>) {
        self.handlers.register(handler).unwrap();
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}

/// Poll the store until `id` reaches `status`.
pub(crate) async fn wait_for_status(store: &JobStore, id: &Uuid, status: JobStatus) {
    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(5);
    loop {
        if store.get(id).await.map(|job| job.status) == Some(status) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} never reached {}",
            id,
            status
        );
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
}

/// Give spawned timer tasks a chance to run.
pub(crate) async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(StdDuration::from_millis(20)).await;
}
