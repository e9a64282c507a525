//! redb table definitions for the InferGrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Instances use composite `{model_id}:{instance_id}` keys for prefix scans.

use redb::TableDefinition;

/// Workers keyed by `{worker_id}`.
pub const WORKERS: TableDefinition<&str, &[u8]> = TableDefinition::new("workers");

/// Models keyed by `{model_id}`.
pub const MODELS: TableDefinition<&str, &[u8]> = TableDefinition::new("models");

/// Instance records keyed by `{model_id}:{instance_id}`.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");
