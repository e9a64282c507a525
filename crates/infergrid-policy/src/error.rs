//! Error types for policy evaluation.

use infergrid_state::StateError;
use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors surfaced by policy stages and the engine.
///
/// The taxonomy is deliberately narrow. A dangling instance-to-worker
/// reference is NOT an error: the status scorer absorbs it with a zero
/// score and a debug trace. Only a failed snapshot read aborts a decision.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A required snapshot read failed. Propagated to the caller as-is;
    /// the engine never substitutes defaults or returns partial results.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(#[from] StateError),
}
