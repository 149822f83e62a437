//! HTTP handler modules for the dataflow notebook API.
//!
//! Handlers are thin: they parse path parameters, look up the session, and
//! delegate to the session manager, the coordinator or the graph registry.
//! [`views`] streams graph notifications to dependency views.

pub mod cells;
pub mod graph;
pub mod sessions;
pub mod views;

use std::sync::Arc;

use dfnb_core::ShortCellId;
use dfnb_state::SessionId;

use crate::error::ApiError;
use crate::session::NotebookSession;
use crate::state::AppState;

pub(crate) fn parse_session(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid session id '{}': {}", raw, e)))
}

/// Accepts a short id or a long one (which is shortened).
pub(crate) fn parse_cell(raw: &str) -> Result<ShortCellId, ApiError> {
    Ok(ShortCellId::shorten(raw)?)
}

pub(crate) fn require_session(state: &AppState, raw: &str) -> Result<Arc<NotebookSession>, ApiError> {
    Ok(state.sessions.require(parse_session(raw)?)?)
}
