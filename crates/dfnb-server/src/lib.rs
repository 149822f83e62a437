//! Execution coordination and dependency-view API for dataflow notebooks.
//!
//! The [`execution::ExecutionCoordinator`] drives one cell execution against
//! a [`backend::KernelBackend`], streams its messages into the notebook's
//! cell models, and merges the reply's dependency facts into the session's
//! graph. The HTTP layer exposes sessions, cells and graph snapshots to
//! dependency views.

pub mod backend;
pub mod config;
pub mod error;
pub mod execution;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod session;
pub mod state;
