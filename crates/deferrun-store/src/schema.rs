//! Persisted layout of the job collection.
//!
//! ```text
//! {
//!   "version": 1,
//!   "jobs": [ { "id": "...", "display_name": "...", ... }, ... ]
//! }
//! ```
//!
//! Records are decoded one by one so a single bad record cannot hide the
//! rest of the collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use deferrun_core::{Job, JobError};

/// Current envelope version.
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    #[serde(default)]
    pub jobs: Vec<Value>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            jobs: Vec::new(),
        }
    }
}

/// A record that could not be decoded into a [`Job`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnreadableRecord {
    /// The record's `id` field if it had one, otherwise its position.
    pub label: String,
    /// Why decoding failed.
    pub reason: String,
    /// The record exactly as read.
    pub raw: Value,
}

/// Decoded collection.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub jobs: Vec<Job>,
    pub unreadable: Vec<UnreadableRecord>,
}

impl Snapshot {
    /// Decode an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Storage`] if the envelope was written by a newer schema.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, JobError> {
        if envelope.version > SCHEMA_VERSION {
            return Err(JobError::Storage(format!(
                "Unsupported store version {} (this build understands up to {})",
                envelope.version, SCHEMA_VERSION
            )));
        }

        let mut snapshot = Snapshot::default();
        for (index, raw) in envelope.jobs.into_iter().enumerate() {
            match serde_json::from_value::<Job>(raw.clone()) {
                Ok(job) => snapshot.jobs.push(job),
                Err(e) => {
                    let label = raw
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("record #{}", index));
                    warn!("Skipping unreadable job record {}: {}", label, e);
                    snapshot.unreadable.push(UnreadableRecord {
                        label,
                        reason: e.to_string(),
                        raw,
                    });
                }
            }
        }

        Ok(snapshot)
    }

    /// Encode into an envelope, unreadable records included.
    pub fn to_envelope(&self) -> Result<Envelope, JobError> {
        let mut jobs = Vec::with_capacity(self.jobs.len() + self.unreadable.len());
        for job in &self.jobs {
            jobs.push(serde_json::to_value(job)?);
        }
        jobs.extend(self.unreadable.iter().map(|r| r.raw.clone()));

        Ok(Envelope {
            version: SCHEMA_VERSION,
            jobs,
        })
    }

    /// Find a job by id.
    pub fn find(&self, id: &uuid::Uuid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == *id)
    }

    /// Find a job by id, mutably.
    pub fn find_mut(&mut self, id: &uuid::Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == *id)
    }

    /// Whether `id` is taken by a job or an unreadable record.
    pub fn contains(&self, id: &uuid::Uuid) -> bool {
        let label = id.to_string();
        self.find(id).is_some() || self.unreadable.iter().any(|r| r.label == label)
    }
}
