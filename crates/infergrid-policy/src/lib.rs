//! infergrid-policy, scheduling policies for InferGrid.
//!
//! This crate decides which workers may host a model instance and how a
//! model's instances rank against each other. It never writes cluster
//! state: everything here reads point-in-time snapshots through an
//! injected [`SnapshotReader`] handle and returns values for the outer
//! scheduler to act on.
//!
//! # Components
//!
//! - **`stage`**: filter and score stage traits, decision context, scores
//! - **`snapshot`**: read-only store accessor trait and its store impl
//! - **`status`**: readiness filter and status scorer (the default family)
//! - **`selector`**: label selector filter
//! - **`engine`**: pipeline orchestration and score combination
//!
//! # Architecture
//!
//! ```text
//! PolicyEngine
//!   ├── SnapshotReader (list workers, list instances)
//!   ├── filters: [SelectorFilter, StatusFilter, ...]
//!   │     workers in ──> subset out, order preserved
//!   └── scorers: [(StatusScorer, 1.0), ...]
//!         instances in ──> one score per instance, weighted sum
//! ```

pub mod engine;
pub mod error;
pub mod selector;
pub mod snapshot;
pub mod stage;
pub mod status;

pub use engine::PolicyEngine;
pub use error::{PolicyError, PolicyResult};
pub use selector::SelectorFilter;
pub use snapshot::SnapshotReader;
pub use stage::{FilterStage, InstanceScore, PolicyContext, ScoreStage, MAX_SCORE};
pub use status::{StatusFilter, StatusScorer, SCORE_SERVING, SCORE_TRANSITIONAL, SCORE_UNUSABLE};
