//! Error types for the scheduler.

use thiserror::Error;

/// Result type alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that can occur during scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("policy evaluation failed: {0}")]
    Policy(#[from] infergrid_policy::PolicyError),

    #[error("state error: {0}")]
    State(#[from] infergrid_state::StateError),
}
