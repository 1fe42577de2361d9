//! # deferrun Core
//!
//! Shared building blocks for the deferred-job system.
//!
//! ## Contents
//!
//! - [`Job`] and its [`JobStatus`] state machine
//! - [`Clock`] with a real and a manually advanced implementation
//! - [`Handler`] capability and the [`HandlerRegistry`] keyed by job kind
//! - [`JobError`], the error taxonomy every crate in the workspace returns
//! - [`PayloadRetention`] and [`MissedJobPolicy`], the configurable policies

pub mod clock;
pub mod error;
pub mod handler;
pub mod job;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HandlerError, JobError};
pub use handler::{Handler, HandlerOutput, HandlerRegistry};
pub use job::{Job, JobStatus, kind_from_name};
pub use policy::{MissedJobPolicy, PayloadRetention};

// Re-export async_trait for handler implementors
pub use async_trait::async_trait;
