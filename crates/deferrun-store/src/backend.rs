//! Persistence backends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use deferrun_core::JobError;

use crate::schema::Envelope;

/// Where the job collection and payloads are kept.
///
/// `persist` must replace the whole collection atomically: after a failure
/// the previously persisted envelope must still be what `load` returns.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Load the persisted envelope, `None` if nothing was ever written.
    async fn load(&self) -> Result<Option<Envelope>, JobError>;

    /// Atomically replace the persisted envelope.
    async fn persist(&self, envelope: &Envelope) -> Result<(), JobError>;

    /// Durably store a payload and return its location.
    async fn write_payload(
        &self,
        id: &Uuid,
        display_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, JobError>;

    /// Remove a payload. Missing payloads are not an error.
    async fn remove_payload(&self, path: &Path) -> Result<(), JobError>;
}

/// Payload file name: `<id>.<ext>` with the display name's lowercase extension.
pub fn payload_file_name(id: &Uuid, display_name: &str) -> String {
    let ext = deferrun_core::kind_from_name(display_name).unwrap_or_else(|| "bin".to_string());
    format!("{}.{}", id, ext)
}

/// In-memory backend for testing.
pub struct MemoryBackend {
    envelope: Mutex<Option<Envelope>>,
    payloads: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            envelope: Mutex::new(None),
            payloads: Mutex::new(HashMap::new()),
        }
    }

    /// Create a backend that already holds `envelope`.
    pub fn with_envelope(envelope: Envelope) -> Self {
        Self {
            envelope: Mutex::new(Some(envelope)),
            payloads: Mutex::new(HashMap::new()),
        }
    }

    /// The last persisted envelope.
    pub fn envelope(&self) -> Option<Envelope> {
        self.envelope.lock().clone()
    }

    /// Check if a payload is stored at `path`.
    pub fn has_payload(&self, path: &Path) -> bool {
        self.payloads.lock().contains_key(path)
    }

    /// Number of stored payloads.
    pub fn payload_count(&self) -> usize {
        self.payloads.lock().len()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<Envelope>, JobError> {
        Ok(self.envelope.lock().clone())
    }

    async fn persist(&self, envelope: &Envelope) -> Result<(), JobError> {
        *self.envelope.lock() = Some(envelope.clone());
        Ok(())
    }

    async fn write_payload(
        &self,
        id: &Uuid,
        display_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, JobError> {
        let path = PathBuf::from("memory").join(payload_file_name(id, display_name));
        self.payloads.lock().insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn remove_payload(&self, path: &Path) -> Result<(), JobError> {
        self.payloads.lock().remove(path);
        Ok(())
    }
}
