//! Label selector filtering.

use async_trait::async_trait;
use infergrid_state::types::Worker;
use tracing::debug;

use crate::error::PolicyResult;
use crate::snapshot::SnapshotReader;
use crate::stage::{FilterStage, PolicyContext};

/// Keeps workers whose labels satisfy the model's worker selector.
///
/// Every key/value pair of the selector must be present on the worker.
/// An empty selector matches every worker.
#[derive(Debug, Default)]
pub struct SelectorFilter;

#[async_trait]
impl FilterStage for SelectorFilter {
    fn name(&self) -> &str {
        "selector"
    }

    async fn filter(
        &self,
        ctx: &PolicyContext<'_>,
        _store: &dyn SnapshotReader,
        workers: Vec<Worker>,
    ) -> PolicyResult<Vec<Worker>> {
        let selector = &ctx.model.worker_selector;
        if selector.is_empty() {
            return Ok(workers);
        }
        let candidates = workers.len();
        let eligible: Vec<Worker> = workers
            .into_iter()
            .filter(|w| selector.iter().all(|(k, v)| w.labels.get(k) == Some(v)))
            .collect();
        debug!(
            model = %ctx.model.name,
            candidates,
            eligible = eligible.len(),
            "selector filter"
        );
        Ok(eligible)
    }
}
