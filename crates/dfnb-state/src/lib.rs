//! Process-wide session state for dataflow notebooks.
//!
//! Two independent stores live here, both keyed by [`SessionId`]:
//!
//! - [`StalenessTracker`]: the code each cell last ran successfully, used to
//!   classify the editor content as clean or dirty.
//! - [`GraphRegistry`]: one [`DependencyGraph`](dfnb_core::DependencyGraph)
//!   per session plus the fan-out channel dependency views subscribe to.
//!
//! Both are plain values meant to be constructed once and shared by
//! reference (usually behind an `Arc`), never reached through globals.
//!
//! # Modules
//!
//! - [`error`]: StateError enum
//! - [`types`]: SessionId
//! - [`staleness`]: StalenessTracker and DirtySet
//! - [`registry`]: GraphRegistry and view notifications

pub mod error;
pub mod registry;
pub mod staleness;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StateError;
pub use registry::{EnsuredGraph, GraphRegistry, SharedGraph, ViewNotification};
pub use staleness::{DirtySet, StalenessTracker};
pub use types::SessionId;
