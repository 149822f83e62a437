//! State error types for dfnb-state.

use thiserror::Error;

use crate::types::SessionId;

/// Errors produced by session state lookups.
#[derive(Debug, Error)]
pub enum StateError {
    /// No graph has been created for the session yet.
    #[error("no dependency graph for session {0}")]
    GraphNotFound(SessionId),

    /// The session is not connected.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
}
