//! infergrid-state, the embedded state store for InferGrid.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! state management for workers, models, and model instances, plus the TOML
//! manifest that declares a served model.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Instances use composite `{model_id}:{instance_id}` keys so a model's
//! instances can be listed with a prefix scan.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Every operation opens its own
//! transaction and releases it on all exit paths.

pub mod error;
pub mod manifest;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use manifest::ModelManifest;
pub use store::StateStore;
pub use types::*;
