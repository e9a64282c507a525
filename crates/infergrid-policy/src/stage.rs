//! Policy stage traits and shared decision types.
//!
//! A scheduling decision runs a model (and optionally one of its instances)
//! through an ordered pipeline of stages: filter stages narrow the set of
//! candidate workers, score stages rate the model's instances. Stages are
//! trait objects, so policy families can be extended without touching the
//! engine.

use async_trait::async_trait;
use infergrid_state::types::{Model, ModelInstance, Worker};

use crate::error::PolicyResult;
use crate::snapshot::SnapshotReader;

/// Highest score a stage may assign.
pub const MAX_SCORE: f64 = 100.0;

/// The subject of a policy decision.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// The model the decision is about.
    pub model: &'a Model,
    /// The specific instance, when the decision is instance-scoped.
    pub instance: Option<&'a ModelInstance>,
}

impl<'a> PolicyContext<'a> {
    /// Context for a model-scoped decision (e.g. placing a new instance).
    pub fn for_model(model: &'a Model) -> Self {
        Self {
            model,
            instance: None,
        }
    }

    /// Context for an instance-scoped decision (e.g. rescheduling one copy).
    pub fn for_instance(model: &'a Model, instance: &'a ModelInstance) -> Self {
        Self {
            model,
            instance: Some(instance),
        }
    }
}

/// A scored instance, produced by
/// [`PolicyEngine::score_instances`](crate::engine::PolicyEngine::score_instances).
#[derive(Debug, Clone)]
pub struct InstanceScore {
    pub instance: ModelInstance,
    /// Combined score in `0.0..=MAX_SCORE`.
    pub score: f64,
}

/// Narrows the set of candidate workers for a decision.
///
/// Contract: the output is a subset of the input with relative order
/// preserved. An empty result is a valid outcome, not an error; a stage
/// fails only if a snapshot read it requires fails.
#[async_trait]
pub trait FilterStage: Send + Sync {
    /// Stage name used in traces.
    fn name(&self) -> &str;

    async fn filter(
        &self,
        ctx: &PolicyContext<'_>,
        store: &dyn SnapshotReader,
        workers: Vec<Worker>,
    ) -> PolicyResult<Vec<Worker>>;
}

/// Rates a model's instances for a decision.
///
/// Contract: returns exactly one score per input instance, in input order,
/// each in `0.0..=MAX_SCORE`. A stage reads at most one snapshot from the
/// store per call and never mutates entities. For a fixed snapshot the
/// stage is a pure function of its inputs.
#[async_trait]
pub trait ScoreStage: Send + Sync {
    /// Stage name used in traces.
    fn name(&self) -> &str;

    async fn score(
        &self,
        ctx: &PolicyContext<'_>,
        store: &dyn SnapshotReader,
        instances: &[ModelInstance],
    ) -> PolicyResult<Vec<f64>>;
}
