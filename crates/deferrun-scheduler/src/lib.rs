//! # deferrun Scheduler
//!
//! Fires each pending job exactly once at its due time.
//!
//! ## Architecture
//!
//! - [`Scheduler`] - one armed one-shot timer per pending job
//! - [`RecoveryManager`] - re-arms or reconciles persisted jobs at startup
//! - [`JobService`] - the facade collaborators call: create, delete, cancel, query
//!
//! ```text
//! JobService::create ──> JobStore::create ──> Scheduler::arm
//!                                                  │ due
//!                                                  v
//!            JobStore <── outcome <── Handler <── fire
//! ```

pub mod recovery;
pub mod scheduler;
pub mod service;
mod timer;

#[cfg(test)]
pub(crate) mod test_support;

pub use recovery::{RecoveryManager, RecoveryReport};
pub use scheduler::Scheduler;
pub use service::JobService;
