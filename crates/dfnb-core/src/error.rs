//! Core error types for dfnb-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of cell identity handling and graph queries.

use thiserror::Error;

use crate::id::ShortCellId;

/// Core errors produced by the dfnb-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A long or short cell identifier could not be decoded.
    #[error("invalid cell identifier '{id}': {reason}")]
    InvalidIdentifier { id: String, reason: String },

    /// Two distinct long identifiers produced the same short identifier
    /// within one session.
    #[error("short id {short} already belongs to cell '{existing}', refusing '{incoming}'")]
    IdentifierCollision {
        short: ShortCellId,
        existing: String,
        incoming: String,
    },

    /// A cell was not found in the graph or the notebook.
    #[error("cell not found: {id}")]
    CellNotFound { id: ShortCellId },
}

impl CoreError {
    pub(crate) fn invalid(id: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidIdentifier {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
