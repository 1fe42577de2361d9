//! # deferrun Store
//!
//! Durable record of every job.
//!
//! ## Features
//!
//! - Single-writer [`JobStore`] owning the record collection and its lock
//! - Whole-collection write-then-rename persistence ([`FileBackend`])
//! - Versioned JSON envelope that tolerates added fields
//! - Unreadable records are kept verbatim and reported, never dropped
//! - In-memory backend for tests ([`MemoryBackend`])

pub mod backend;
pub mod file;
pub mod schema;
pub mod store;

pub use backend::{MemoryBackend, StoreBackend};
pub use file::FileBackend;
pub use schema::{Envelope, SCHEMA_VERSION, Snapshot, UnreadableRecord};
pub use store::JobStore;
