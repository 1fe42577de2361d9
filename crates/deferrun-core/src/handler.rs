//! Handler capability and registry.
//!
//! A [`Handler`] knows how to process one kind of payload. The
//! [`HandlerRegistry`] maps kinds to handlers and is populated once at
//! startup; the scheduler only ever calls [`HandlerRegistry::resolve`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, JobError};

/// Outcome reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerOutput {
    /// Whether processing succeeded.
    pub success: bool,
    /// Captured output.
    pub output: String,
}

impl HandlerOutput {
    /// Successful outcome.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// Failed outcome.
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Processes payloads of a single kind.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The job kind this handler accepts.
    fn kind(&self) -> &str;

    /// Process the payload stored at `payload_path`.
    async fn process(&self, payload_path: &Path) -> Result<HandlerOutput, HandlerError>;
}

/// Registry of handlers keyed by job kind.
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler under its kind.
    ///
    /// Returns an error if a handler for the same kind is already registered.
    pub fn register(&self, handler: Arc<dyn Handler>) -> Result<(), JobError> {
        let kind = handler.kind().to_string();

        if self.handlers.contains_key(&kind) {
            return Err(JobError::DuplicateHandler(kind));
        }

        self.handlers.insert(kind, handler);
        Ok(())
    }

    /// Look up the handler for `kind`.
    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn Handler>, JobError> {
        self.handlers
            .get(kind)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| JobError::UnsupportedKind(kind.to_string()))
    }

    /// Check if a handler is registered for `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// List registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        kinds.sort();
        kinds
    }

    /// Get the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
