//! Domain types for the InferGrid state store.
//!
//! These types represent the persisted state of workers, models, and model
//! instances. All types are serializable to/from JSON for storage in redb
//! tables. Workers and models are written by external collaborators
//! (registration, heartbeat, manifest apply); instances are written by the
//! scheduler. The policy engine only ever reads them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a worker node.
pub type WorkerId = String;

/// Unique identifier for a model.
pub type ModelId = String;

/// Unique identifier for an instance within a model.
pub type InstanceId = String;

// ── Worker ────────────────────────────────────────────────────────

/// A registered GPU-bearing node that can host model instances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worker {
    pub id: WorkerId,
    /// Hostname reported at registration.
    pub name: String,
    pub address: String,
    /// Arbitrary labels for scheduling constraints (e.g. `gpu = "a100"`).
    pub labels: HashMap<String, String>,
    pub state: WorkerState,
    /// Unix timestamp of last heartbeat.
    pub last_heartbeat: u64,
}

/// Operational state of a worker, maintained by the heartbeat collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Healthy and accepting new instances.
    Ready,
    /// Registered but not accepting new instances.
    NotReady,
    /// Missed heartbeats; liveness unknown.
    Unreachable,
}

// ── Model ─────────────────────────────────────────────────────────

/// Desired-state record for a served model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    /// Source URI (hf://, ollama://, file://, etc.)
    pub source: String,
    /// Desired number of serving instances.
    pub replicas: u32,
    /// Labels a hosting worker must carry. Empty matches every worker.
    pub worker_selector: HashMap<String, String>,
    /// Unix timestamp (seconds) when this model was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) when this model was last updated.
    pub updated_at: u64,
}

// ── Instance ──────────────────────────────────────────────────────

/// One deployed copy of a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInstance {
    pub id: InstanceId,
    pub name: String,
    pub model_id: ModelId,
    /// Bound worker, if any. May point at a worker that has since been
    /// removed; readers must treat that as a dangling reference, not as
    /// an invariant violation.
    pub worker_id: Option<WorkerId>,
    pub state: InstanceState,
    /// Operator-facing detail, set on error or when scheduling finds no
    /// candidate worker.
    pub state_message: Option<String>,
    /// Unix timestamp when this instance record was created.
    pub created_at: u64,
    /// Unix timestamp of last state change.
    pub updated_at: u64,
}

/// Lifecycle state of a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Created, awaiting a scheduling decision.
    Pending,
    /// Bound to a worker, not yet started there.
    Scheduled,
    /// Starting up on its worker.
    Starting,
    /// Serving traffic.
    Running,
    /// Failed; `state_message` carries the detail.
    Error,
}

impl ModelInstance {
    /// Build the composite key for the instances table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.model_id, self.id)
    }
}
