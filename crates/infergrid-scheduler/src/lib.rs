//! infergrid-scheduler, the outer scheduling loop for InferGrid.
//!
//! Consumes the policy engine from `infergrid-policy` to decide where a
//! model's instances should run, and owns the store writes that record
//! those decisions: creating instance records up to a model's replica
//! count, binding pending instances to the least-loaded eligible worker,
//! and ranking instances for request routing.
//!
//! Failed decisions are never retried here; the caller decides when to
//! reconcile again.

pub mod error;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{ScheduleOutcome, Scheduler};
