//! Policy engine: an ordered stage pipeline over a snapshot source.
//!
//! A decision flows through the engine conceptually as
//!
//! ```text
//! Init ──> WorkersFetched ──> Filtered ──> Scored ──> Done
//!              │                  │           │
//!              └──────────────────┴───────────┴─────> Failed (store error)
//! ```
//!
//! The engine holds no state between calls. Each entry point runs the
//! installed stages in declared order against fresh snapshot reads; two
//! concurrent decisions never share mutable state, and dropping the future
//! abandons the decision without cleanup (stages hold no resources beyond
//! the scoped store reads). A filter call and a later scoring call each
//! take their own snapshot, so they may observe different cluster states;
//! decisions are eventually-consistent hints, not transactions.

use std::sync::Arc;

use infergrid_state::types::{ModelInstance, Worker};

use crate::error::PolicyResult;
use crate::selector::SelectorFilter;
use crate::snapshot::SnapshotReader;
use crate::stage::{FilterStage, InstanceScore, PolicyContext, ScoreStage};
use crate::status::{StatusFilter, StatusScorer};

/// Orchestrates filter and score stages for scheduling decisions.
pub struct PolicyEngine {
    store: Arc<dyn SnapshotReader>,
    filters: Vec<Box<dyn FilterStage>>,
    scorers: Vec<(Box<dyn ScoreStage>, f64)>,
}

impl PolicyEngine {
    /// Engine with no stages installed. Filtering passes workers through
    /// unchanged and every instance scores zero until stages are added.
    pub fn new(store: Arc<dyn SnapshotReader>) -> Self {
        Self {
            store,
            filters: Vec::new(),
            scorers: Vec::new(),
        }
    }

    /// The default policy family: selector and readiness filters, status
    /// scoring.
    pub fn status_family(store: Arc<dyn SnapshotReader>) -> Self {
        Self::new(store)
            .with_filter(SelectorFilter)
            .with_filter(StatusFilter)
            .with_scorer(StatusScorer)
    }

    /// Appends a filter stage. Declared order is execution order; cheaper
    /// stages belong earlier in the chain.
    pub fn with_filter(mut self, stage: impl FilterStage + 'static) -> Self {
        self.filters.push(Box::new(stage));
        self
    }

    /// Appends a score stage with weight 1.0.
    pub fn with_scorer(self, stage: impl ScoreStage + 'static) -> Self {
        self.with_weighted_scorer(stage, 1.0)
    }

    /// Appends a score stage with an explicit weight. Weights across all
    /// scorers should sum to 1.0 to keep combined scores in
    /// `0..=MAX_SCORE`.
    pub fn with_weighted_scorer(mut self, stage: impl ScoreStage + 'static, weight: f64) -> Self {
        self.scorers.push((Box::new(stage), weight));
        self
    }

    /// The snapshot source the stages read from.
    pub fn store(&self) -> &Arc<dyn SnapshotReader> {
        &self.store
    }

    /// Narrows `workers` through every filter stage in declared order.
    ///
    /// Each stage receives the previous stage's output; the result is a
    /// subset of the input with relative order preserved. An empty result
    /// is a valid outcome, and later stages still run on an empty list.
    pub async fn filter(
        &self,
        ctx: &PolicyContext<'_>,
        workers: Vec<Worker>,
    ) -> PolicyResult<Vec<Worker>> {
        let mut remaining = workers;
        for stage in &self.filters {
            remaining = stage.filter(ctx, self.store.as_ref(), remaining).await?;
        }
        Ok(remaining)
    }

    /// Scores `instances` through every score stage, combining per
    /// instance as the weight-multiplied sum.
    ///
    /// The output has the same length and order as the input. With a
    /// single scorer at weight 1.0 the combination is the identity. Any
    /// stage error aborts the whole call; there are no partial results.
    pub async fn score_instances(
        &self,
        ctx: &PolicyContext<'_>,
        instances: &[ModelInstance],
    ) -> PolicyResult<Vec<InstanceScore>> {
        let mut combined = vec![0.0f64; instances.len()];
        for (stage, weight) in &self.scorers {
            let scores = stage.score(ctx, self.store.as_ref(), instances).await?;
            debug_assert_eq!(
                scores.len(),
                instances.len(),
                "score stage {} must return one score per instance",
                stage.name()
            );
            for (total, score) in combined.iter_mut().zip(&scores) {
                *total += weight * score;
            }
        }
        Ok(instances
            .iter()
            .zip(combined)
            .map(|(instance, score)| InstanceScore {
                instance: instance.clone(),
                score,
            })
            .collect())
    }
}
