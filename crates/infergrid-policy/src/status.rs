//! Status policy family: readiness filtering and status scoring.
//!
//! [`StatusFilter`] keeps the workers that can accept new instances.
//! [`StatusScorer`] rates a model's instances by the joint operational
//! state of the instance and its hosting worker, pulling one worker
//! snapshot per call. Scores are coarse on purpose: unusable (0),
//! transitional (50), serving (100). Finer-grained signals (load, VRAM
//! headroom) belong to other stages.

use std::collections::HashMap;

use async_trait::async_trait;
use infergrid_state::types::{InstanceState, ModelInstance, Worker, WorkerState};
use tracing::debug;

use crate::error::PolicyResult;
use crate::snapshot::SnapshotReader;
use crate::stage::{FilterStage, PolicyContext, ScoreStage, MAX_SCORE};

/// Score for instances that cannot serve.
pub const SCORE_UNUSABLE: f64 = 0.0;
/// Score for instances in a transitional state.
pub const SCORE_TRANSITIONAL: f64 = 50.0;
/// Score for instances serving on a ready worker.
pub const SCORE_SERVING: f64 = MAX_SCORE;

/// Keeps only workers that are ready to receive new instances.
#[derive(Debug, Default)]
pub struct StatusFilter;

#[async_trait]
impl FilterStage for StatusFilter {
    fn name(&self) -> &str {
        "status"
    }

    async fn filter(
        &self,
        ctx: &PolicyContext<'_>,
        _store: &dyn SnapshotReader,
        workers: Vec<Worker>,
    ) -> PolicyResult<Vec<Worker>> {
        let candidates = workers.len();
        let eligible: Vec<Worker> = workers
            .into_iter()
            .filter(|w| w.state == WorkerState::Ready)
            .collect();
        debug!(
            model = %ctx.model.name,
            instance = ctx.instance.map(|i| i.name.as_str()),
            candidates,
            eligible = eligible.len(),
            "readiness filter"
        );
        Ok(eligible)
    }
}

/// Rates instances by instance and worker operational status.
///
/// One worker snapshot is read per call and shared across all instances.
/// The per-instance rules apply first-match-wins:
///
/// 1. unbound, or bound to a worker absent from the snapshot: 0
/// 2. worker not ready: 0
/// 3. instance errored: 0
/// 4. worker ready and instance running: 100
/// 5. anything else (transitional): 50
#[derive(Debug, Default)]
pub struct StatusScorer;

#[async_trait]
impl ScoreStage for StatusScorer {
    fn name(&self) -> &str {
        "status"
    }

    async fn score(
        &self,
        ctx: &PolicyContext<'_>,
        store: &dyn SnapshotReader,
        instances: &[ModelInstance],
    ) -> PolicyResult<Vec<f64>> {
        let workers = store.list_workers().await?;
        let by_id: HashMap<&str, &Worker> =
            workers.iter().map(|w| (w.id.as_str(), w)).collect();

        let mut scores = Vec::with_capacity(instances.len());
        for instance in instances {
            let score = score_instance(instance, &by_id);
            debug!(
                model = %ctx.model.name,
                instance = %instance.name,
                score,
                "status score"
            );
            scores.push(score);
        }
        Ok(scores)
    }
}

/// Applies the status precedence rules against a worker snapshot.
fn score_instance(instance: &ModelInstance, workers: &HashMap<&str, &Worker>) -> f64 {
    let worker = instance
        .worker_id
        .as_deref()
        .and_then(|id| workers.get(id).copied());
    let Some(worker) = worker else {
        // Unbound instance, or the worker was deleted after binding.
        // Scoring must stay total over dangling references.
        debug!(
            instance = %instance.name,
            worker_id = instance.worker_id.as_deref(),
            "worker reference missing, scoring zero"
        );
        return SCORE_UNUSABLE;
    };
    if worker.state == WorkerState::NotReady {
        return SCORE_UNUSABLE;
    }
    if instance.state == InstanceState::Error {
        return SCORE_UNUSABLE;
    }
    if worker.state == WorkerState::Ready && instance.state == InstanceState::Running {
        return SCORE_SERVING;
    }
    SCORE_TRANSITIONAL
}
