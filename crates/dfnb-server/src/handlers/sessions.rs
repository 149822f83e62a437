//! Session lifecycle handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::backend::{HttpKernelBackend, KernelBackend};
use crate::error::ApiError;
use crate::schema::sessions::{
    AttachBackendRequest, DeleteSessionResponse, ListSessionsResponse, SessionSummary,
};
use crate::session::NotebookSession;
use crate::state::AppState;

use super::{parse_session, require_session};

fn summarize(state: &AppState, session: &NotebookSession) -> SessionSummary {
    SessionSummary {
        session_id: session.id(),
        connected: session.backend().is_some(),
        cell_count: session.cell_ids().len(),
        has_graph: state.registry.get(session.id()).is_some(),
    }
}

/// Opens a session on the configured kernel bridge, if any.
///
/// `POST /sessions`
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionSummary>) {
    let session = state.sessions.connect(state.default_backend.clone());
    (StatusCode::CREATED, Json(summarize(&state, &session)))
}

/// `GET /sessions`
pub async fn list_sessions(State(state): State<AppState>) -> Json<ListSessionsResponse> {
    let sessions = state
        .sessions
        .list()
        .iter()
        .map(|session| summarize(&state, session))
        .collect();
    Json(ListSessionsResponse { sessions })
}

/// Disconnects a session, discarding its graph and staleness state.
///
/// `DELETE /sessions/{id}`
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, ApiError> {
    let id = parse_session(&id)?;
    if !state.sessions.disconnect(id) {
        return Err(ApiError::NotFound(format!("session not found: {}", id)));
    }
    Ok(Json(DeleteSessionResponse { success: true }))
}

/// Points a session at a kernel bridge, replacing any previous backend.
///
/// `PUT /sessions/{id}/backend`
pub async fn attach_backend(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AttachBackendRequest>,
) -> Result<Json<SessionSummary>, ApiError> {
    let session = require_session(&state, &id)?;
    let backend =
        HttpKernelBackend::new(&req.url).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    session.attach_backend(Arc::new(backend) as Arc<dyn KernelBackend>);
    Ok(Json(summarize(&state, &session)))
}

/// Disconnects the session's backend. Cells and graph are kept.
///
/// `DELETE /sessions/{id}/backend`
pub async fn detach_backend(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let session = require_session(&state, &id)?;
    if !session.detach_backend() {
        return Err(ApiError::NotFound(format!(
            "session {} has no backend",
            session.id()
        )));
    }
    Ok(Json(summarize(&state, &session)))
}
