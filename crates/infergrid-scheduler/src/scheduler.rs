//! Scheduling decisions for model instances.
//!
//! The scheduler is the writing side of the control plane: it creates
//! instance records for a model, asks the policy engine which workers are
//! eligible, binds instances to the least-loaded eligible worker, and
//! ranks instances for request routing. All policy evaluation is delegated
//! to [`PolicyEngine`]; the scheduler owns the store writes.
//!
//! Decisions are computed from point-in-time snapshots and may race with
//! worker state changes; a binding that lands on a worker that just went
//! away simply produces a zero-scored instance on the next ranking pass.

use std::time::{SystemTime, UNIX_EPOCH};

use infergrid_policy::{InstanceScore, PolicyContext, PolicyEngine};
use infergrid_state::types::{InstanceState, Model, ModelInstance, Worker, WorkerId};
use infergrid_state::StateStore;
use tracing::{debug, info};

use crate::error::SchedulerResult;

/// Outcome of a single instance scheduling attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Instance bound to the given worker.
    Bound(WorkerId),
    /// No eligible worker; the instance stays pending.
    Unschedulable,
}

/// Binds model instances to workers and ranks instances for routing.
pub struct Scheduler {
    store: StateStore,
    engine: PolicyEngine,
}

impl Scheduler {
    /// Scheduler with the default status policy family over `store`.
    pub fn new(store: StateStore) -> Self {
        let engine = PolicyEngine::status_family(std::sync::Arc::new(store.clone()));
        Self { store, engine }
    }

    /// Replaces the policy engine, e.g. to install additional stages.
    pub fn with_engine(mut self, engine: PolicyEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Picks the worker for a new instance of `model`.
    ///
    /// Workers pass through the engine's filter pipeline; among the
    /// eligible, the one hosting the fewest instances of this model wins,
    /// ties resolving to the earlier worker in filtered order. `None`
    /// means nothing is eligible right now, which is a valid outcome.
    pub async fn select_worker(&self, model: &Model) -> SchedulerResult<Option<Worker>> {
        let ctx = PolicyContext::for_model(model);
        let workers = self.engine.store().list_workers().await?;
        let eligible = self.engine.filter(&ctx, workers).await?;
        if eligible.is_empty() {
            debug!(model = %model.name, "no eligible worker");
            return Ok(None);
        }

        let instances = self.engine.store().list_instances(&model.id).await?;
        let mut best: Option<(&Worker, usize)> = None;
        for worker in &eligible {
            let load = instances
                .iter()
                .filter(|i| i.worker_id.as_deref() == Some(worker.id.as_str()))
                .count();
            let better = match best {
                Some((_, current)) => load < current,
                None => true,
            };
            if better {
                best = Some((worker, load));
            }
        }
        if let Some((worker, load)) = best {
            debug!(model = %model.name, worker = %worker.id, load, "worker selected");
        }
        Ok(best.map(|(w, _)| w.clone()))
    }

    /// Attempts to bind `instance` to a worker and persists the result.
    ///
    /// On success the instance moves to `Scheduled` with its worker set.
    /// Without an eligible worker it stays `Pending` with an explanatory
    /// `state_message`.
    pub async fn schedule_instance(
        &self,
        model: &Model,
        instance: &ModelInstance,
    ) -> SchedulerResult<ScheduleOutcome> {
        let mut updated = instance.clone();
        updated.updated_at = epoch_secs();
        match self.select_worker(model).await? {
            Some(worker) => {
                updated.worker_id = Some(worker.id.clone());
                updated.state = InstanceState::Scheduled;
                updated.state_message = None;
                self.store.put_instance(&updated)?;
                info!(
                    model = %model.name,
                    instance = %updated.name,
                    worker = %worker.name,
                    "instance scheduled"
                );
                Ok(ScheduleOutcome::Bound(worker.id))
            }
            None => {
                updated.state_message = Some("no ready worker matched".to_string());
                self.store.put_instance(&updated)?;
                info!(
                    model = %model.name,
                    instance = %updated.name,
                    "instance unschedulable"
                );
                Ok(ScheduleOutcome::Unschedulable)
            }
        }
    }

    /// Drives `model` toward its declared replica count.
    ///
    /// Creates missing instance records, then attempts to schedule every
    /// unbound pending instance. Re-running is safe: existing records are
    /// never duplicated, and already-bound instances are left alone.
    pub async fn reconcile(&self, model: &Model) -> SchedulerResult<Vec<ScheduleOutcome>> {
        let mut instances = self.store.list_instances_for_model(&model.id)?;
        let now = epoch_secs();

        let mut index = 0u32;
        while (instances.len() as u32) < model.replicas {
            let name = format!("{}-{}", model.name, index);
            index += 1;
            if instances.iter().any(|i| i.name == name) {
                continue;
            }
            let instance = ModelInstance {
                id: name.clone(),
                name,
                model_id: model.id.clone(),
                worker_id: None,
                state: InstanceState::Pending,
                state_message: None,
                created_at: now,
                updated_at: now,
            };
            self.store.put_instance(&instance)?;
            info!(model = %model.name, instance = %instance.name, "instance created");
            instances.push(instance);
        }

        let mut outcomes = Vec::new();
        for instance in &instances {
            if instance.state == InstanceState::Pending && instance.worker_id.is_none() {
                outcomes.push(self.schedule_instance(model, instance).await?);
            }
        }
        Ok(outcomes)
    }

    /// Ranks the model's instances by policy score, best first.
    ///
    /// The sort is stable: equal scores keep store order, so repeated
    /// calls over an unchanged snapshot return identical rankings.
    pub async fn rank_instances(&self, model: &Model) -> SchedulerResult<Vec<InstanceScore>> {
        let ctx = PolicyContext::for_model(model);
        let instances = self.engine.store().list_instances(&model.id).await?;
        let mut scored = self.engine.score_instances(&ctx, &instances).await?;
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(scored)
    }

    /// The best instance to route a request to, if the model has any.
    pub async fn select_instance(&self, model: &Model) -> SchedulerResult<Option<InstanceScore>> {
        Ok(self.rank_instances(model).await?.into_iter().next())
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use infergrid_policy::{PolicyError, PolicyResult, SnapshotReader};
    use infergrid_state::types::WorkerState;
    use infergrid_state::StateError;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn make_worker(id: &str, state: WorkerState) -> Worker {
        Worker {
            id: id.to_string(),
            name: id.to_string(),
            address: "10.0.0.1:9090".to_string(),
            labels: HashMap::new(),
            state,
            last_heartbeat: 1000,
        }
    }

    fn make_labeled_worker(id: &str, labels: &[(&str, &str)]) -> Worker {
        let mut worker = make_worker(id, WorkerState::Ready);
        worker.labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        worker
    }

    fn make_model(id: &str, replicas: u32) -> Model {
        Model {
            id: id.to_string(),
            name: id.to_string(),
            source: "hf://test-org/test-model".to_string(),
            replicas,
            worker_selector: HashMap::new(),
            created_at: 1000,
            updated_at: 1000,
        }
    }

    fn make_instance(model_id: &str, id: &str, worker_id: Option<&str>, state: InstanceState) -> ModelInstance {
        ModelInstance {
            id: id.to_string(),
            name: format!("{model_id}-{id}"),
            model_id: model_id.to_string(),
            worker_id: worker_id.map(str::to_string),
            state,
            state_message: None,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    /// Snapshot double whose reads always fail.
    struct FailingSnapshot;

    #[async_trait]
    impl SnapshotReader for FailingSnapshot {
        async fn list_workers(&self) -> PolicyResult<Vec<Worker>> {
            Err(PolicyError::StoreUnavailable(StateError::Read(
                "injected read failure".to_string(),
            )))
        }

        async fn list_instances(&self, _model_id: &str) -> PolicyResult<Vec<ModelInstance>> {
            Err(PolicyError::StoreUnavailable(StateError::Read(
                "injected read failure".to_string(),
            )))
        }
    }

    // ── Worker selection ───────────────────────────────────────────

    #[tokio::test]
    async fn selects_least_loaded_ready_worker() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        store.put_worker(&make_worker("worker-2", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 2);
        store
            .put_instance(&make_instance("llama", "a", Some("worker-1"), InstanceState::Running))
            .unwrap();

        let scheduler = Scheduler::new(store);
        let selected = scheduler.select_worker(&model).await.unwrap().unwrap();
        assert_eq!(selected.id, "worker-2");
    }

    #[tokio::test]
    async fn ties_resolve_to_earlier_worker() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        store.put_worker(&make_worker("worker-2", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 2);

        let scheduler = Scheduler::new(store);
        let selected = scheduler.select_worker(&model).await.unwrap().unwrap();
        // Both unloaded; worker list order (key order) breaks the tie.
        assert_eq!(selected.id, "worker-1");
    }

    #[tokio::test]
    async fn ignores_other_models_load() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        store.put_worker(&make_worker("worker-2", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 1);
        // worker-1 is busy with a different model only.
        store
            .put_instance(&make_instance("qwen", "a", Some("worker-1"), InstanceState::Running))
            .unwrap();

        let scheduler = Scheduler::new(store);
        let selected = scheduler.select_worker(&model).await.unwrap().unwrap();
        assert_eq!(selected.id, "worker-1");
    }

    #[tokio::test]
    async fn no_ready_worker_selects_none() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::NotReady)).unwrap();
        store.put_worker(&make_worker("worker-2", WorkerState::Unreachable)).unwrap();
        let model = make_model("llama", 1);

        let scheduler = Scheduler::new(store);
        assert!(scheduler.select_worker(&model).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn honors_worker_selector() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_worker(&make_labeled_worker("worker-1", &[("gpu", "h100")]))
            .unwrap();
        store
            .put_worker(&make_labeled_worker("worker-2", &[("gpu", "a100")]))
            .unwrap();
        let mut model = make_model("llama", 1);
        model
            .worker_selector
            .insert("gpu".to_string(), "a100".to_string());

        let scheduler = Scheduler::new(store);
        let selected = scheduler.select_worker(&model).await.unwrap().unwrap();
        assert_eq!(selected.id, "worker-2");
    }

    // ── Instance binding ───────────────────────────────────────────

    #[tokio::test]
    async fn schedule_instance_binds_and_persists() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 1);
        let instance = make_instance("llama", "inst-0", None, InstanceState::Pending);
        store.put_instance(&instance).unwrap();

        let scheduler = Scheduler::new(store.clone());
        let outcome = scheduler.schedule_instance(&model, &instance).await.unwrap();
        assert_eq!(outcome, ScheduleOutcome::Bound("worker-1".to_string()));

        let stored = store.get_instance("llama:inst-0").unwrap().unwrap();
        assert_eq!(stored.state, InstanceState::Scheduled);
        assert_eq!(stored.worker_id.as_deref(), Some("worker-1"));
        assert!(stored.state_message.is_none());
    }

    #[tokio::test]
    async fn schedule_instance_marks_unschedulable() {
        let store = StateStore::open_in_memory().unwrap();
        let model = make_model("llama", 1);
        let instance = make_instance("llama", "inst-0", None, InstanceState::Pending);
        store.put_instance(&instance).unwrap();

        let scheduler = Scheduler::new(store.clone());
        let outcome = scheduler.schedule_instance(&model, &instance).await.unwrap();
        assert_eq!(outcome, ScheduleOutcome::Unschedulable);

        let stored = store.get_instance("llama:inst-0").unwrap().unwrap();
        assert_eq!(stored.state, InstanceState::Pending);
        assert!(stored.worker_id.is_none());
        assert_eq!(stored.state_message.as_deref(), Some("no ready worker matched"));
    }

    // ── Reconciliation ─────────────────────────────────────────────

    #[tokio::test]
    async fn reconcile_creates_and_binds_replicas() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        store.put_worker(&make_worker("worker-2", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 2);

        let scheduler = Scheduler::new(store.clone());
        let outcomes = scheduler.reconcile(&model).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o, ScheduleOutcome::Bound(_))));

        let instances = store.list_instances_for_model("llama").unwrap();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.state == InstanceState::Scheduled));
        // Spread: one instance per worker.
        let workers: Vec<&str> = instances
            .iter()
            .filter_map(|i| i.worker_id.as_deref())
            .collect();
        assert!(workers.contains(&"worker-1"));
        assert!(workers.contains(&"worker-2"));
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 2);

        let scheduler = Scheduler::new(store.clone());
        scheduler.reconcile(&model).await.unwrap();
        let second = scheduler.reconcile(&model).await.unwrap();

        // Everything already bound; nothing new to create or schedule.
        assert!(second.is_empty());
        assert_eq!(store.list_instances_for_model("llama").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reconcile_without_workers_leaves_instances_pending() {
        let store = StateStore::open_in_memory().unwrap();
        let model = make_model("llama", 2);

        let scheduler = Scheduler::new(store.clone());
        let outcomes = scheduler.reconcile(&model).await.unwrap();
        assert_eq!(outcomes, vec![ScheduleOutcome::Unschedulable, ScheduleOutcome::Unschedulable]);

        let instances = store.list_instances_for_model("llama").unwrap();
        assert!(instances.iter().all(|i| i.state == InstanceState::Pending));
        assert!(instances.iter().all(|i| i.worker_id.is_none()));
    }

    // ── Ranking and routing ────────────────────────────────────────

    #[tokio::test]
    async fn ranks_serving_instances_first() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 3);
        store
            .put_instance(&make_instance("llama", "a", Some("worker-1"), InstanceState::Starting))
            .unwrap();
        store
            .put_instance(&make_instance("llama", "b", Some("worker-1"), InstanceState::Running))
            .unwrap();
        store
            .put_instance(&make_instance("llama", "c", Some("worker-1"), InstanceState::Starting))
            .unwrap();

        let scheduler = Scheduler::new(store);
        let ranked = scheduler.rank_instances(&model).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|s| s.instance.id.as_str()).collect();
        // b serves (100); a and c are transitional (50) and keep store order.
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(ranked[0].score, 100.0);
    }

    #[tokio::test]
    async fn select_instance_returns_top_ranked() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_worker(&make_worker("worker-1", WorkerState::Ready)).unwrap();
        let model = make_model("llama", 2);
        store
            .put_instance(&make_instance("llama", "a", Some("worker-1"), InstanceState::Error))
            .unwrap();
        store
            .put_instance(&make_instance("llama", "b", Some("worker-1"), InstanceState::Running))
            .unwrap();

        let scheduler = Scheduler::new(store);
        let top = scheduler.select_instance(&model).await.unwrap().unwrap();
        assert_eq!(top.instance.id, "b");
    }

    #[tokio::test]
    async fn select_instance_none_without_instances() {
        let store = StateStore::open_in_memory().unwrap();
        let model = make_model("llama", 1);

        let scheduler = Scheduler::new(store);
        assert!(scheduler.select_instance(&model).await.unwrap().is_none());
    }

    // ── Store failure ──────────────────────────────────────────────

    #[tokio::test]
    async fn store_failure_surfaces_not_partial() {
        let store = StateStore::open_in_memory().unwrap();
        let model = make_model("llama", 1);

        let engine = PolicyEngine::status_family(Arc::new(FailingSnapshot));
        let scheduler = Scheduler::new(store).with_engine(engine);

        let result = scheduler.rank_instances(&model).await;
        assert!(matches!(
            result,
            Err(crate::error::SchedulerError::Policy(
                PolicyError::StoreUnavailable(_)
            ))
        ));
    }
}
