//! Read-only snapshot access to cluster state.
//!
//! Policy stages see the cluster exclusively through [`SnapshotReader`],
//! injected at engine construction. Every call takes a fresh point-in-time
//! snapshot; there is no watch or subscription semantics, and consecutive
//! reads may observe different states.

use async_trait::async_trait;
use infergrid_state::types::{ModelInstance, Worker};
use infergrid_state::StateStore;

use crate::error::PolicyResult;

/// Point-in-time reads of cluster state, as consumed by policy stages.
///
/// A failed read surfaces as
/// [`PolicyError::StoreUnavailable`](crate::error::PolicyError) and aborts
/// the calling decision. Implementations must not cache across calls.
#[async_trait]
pub trait SnapshotReader: Send + Sync {
    /// Every registered worker.
    async fn list_workers(&self) -> PolicyResult<Vec<Worker>>;

    /// Every instance of the given model.
    async fn list_instances(&self, model_id: &str) -> PolicyResult<Vec<ModelInstance>>;
}

#[async_trait]
impl SnapshotReader for StateStore {
    async fn list_workers(&self) -> PolicyResult<Vec<Worker>> {
        Ok(StateStore::list_workers(self)?)
    }

    async fn list_instances(&self, model_id: &str) -> PolicyResult<Vec<ModelInstance>> {
        Ok(self.list_instances_for_model(model_id)?)
    }
}
