//! Dependency view handlers.

use axum::extract::{Path, State};
use axum::Json;

use dfnb_core::CoreError;

use crate::error::ApiError;
use crate::schema::graph::{CellStateResponse, ClosureResponse, GraphResponse};
use crate::state::AppState;

use super::{parse_cell, require_session};

/// `GET /sessions/{id}/graph`
pub async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GraphResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let graph = state.registry.require(session.id())?;
    let snapshot = graph.read().await.snapshot();
    Ok(Json(GraphResponse {
        session_id: session.id(),
        graph: snapshot,
    }))
}

/// Transitive producers of a cell.
///
/// `GET /sessions/{id}/cells/{cell}/upstream`
pub async fn upstream(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
) -> Result<Json<ClosureResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    let graph = state.registry.require(session.id())?;
    let graph = graph.read().await;
    if !graph.contains(cell) {
        return Err(CoreError::CellNotFound { id: cell }.into());
    }
    Ok(Json(ClosureResponse {
        cell,
        cells: graph.all_upstream(cell),
    }))
}

/// Transitive dependents of a cell, as recorded by the backend.
///
/// `GET /sessions/{id}/cells/{cell}/downstream`
pub async fn downstream(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
) -> Result<Json<ClosureResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    let graph = state.registry.require(session.id())?;
    let graph = graph.read().await;
    if !graph.contains(cell) {
        return Err(CoreError::CellNotFound { id: cell }.into());
    }
    Ok(Json(ClosureResponse {
        cell,
        cells: graph.all_downstream(cell),
    }))
}

/// The cell was edited: it becomes changed, its dependents upstream-stale.
///
/// `POST /sessions/{id}/cells/{cell}/changed`
pub async fn mark_changed(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
) -> Result<Json<CellStateResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    let graph = state.registry.require(session.id())?;

    let response = {
        let mut graph = graph.write().await;
        let upstream_stale = graph.mark_changed(cell)?;
        CellStateResponse {
            cell,
            state: graph.node(cell).map(|n| n.state).unwrap_or_default(),
            upstream_stale,
        }
    };
    state.registry.notify_views(session.id(), false);
    Ok(Json(response))
}

/// The edit was undone.
///
/// `POST /sessions/{id}/cells/{cell}/reverted`
pub async fn revert_changed(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
) -> Result<Json<CellStateResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    let graph = state.registry.require(session.id())?;

    let response = {
        let mut graph = graph.write().await;
        graph.revert_changed(cell)?;
        CellStateResponse {
            cell,
            state: graph.node(cell).map(|n| n.state).unwrap_or_default(),
            upstream_stale: Vec::new(),
        }
    };
    state.registry.notify_views(session.id(), false);
    Ok(Json(response))
}
