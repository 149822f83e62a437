//! Cell handlers: registration, edits, execution and the cell view.

use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use dfnb_core::{CoreError, ShortCellId};

use crate::error::ApiError;
use crate::schema::cells::{
    CellRunView, CellView, DirtyCellsResponse, ExecuteCellRequest, ExecuteCellResponse, RegisterCellRequest,
    RegisterCellResponse, RunCellsRequest, RunCellsResponse, UpdateCodeRequest,
};
use crate::session::NotebookSession;
use crate::state::AppState;

use super::{parse_cell, require_session};

fn cell_view(state: &AppState, session: &NotebookSession, cell: ShortCellId) -> Result<CellView, ApiError> {
    let model = session
        .cell(cell)
        .ok_or(CoreError::CellNotFound { id: cell })?;
    let clean = state.staleness.is_clean(session.id(), cell, &model.code);
    Ok(CellView::from_model(&model, clean))
}

/// `POST /sessions/{id}/cells`
pub async fn register_cell(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RegisterCellRequest>,
) -> Result<(StatusCode, Json<RegisterCellResponse>), ApiError> {
    let session = require_session(&state, &id)?;
    let short_id = session.register_cell(&req.cell_id, req.code, req.tag)?;
    Ok((StatusCode::CREATED, Json(RegisterCellResponse { short_id })))
}

/// `GET /sessions/{id}/cells/{cell}`
pub async fn get_cell(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
) -> Result<Json<CellView>, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    Ok(Json(cell_view(&state, &session, cell)?))
}

/// `PUT /sessions/{id}/cells/{cell}/code`
pub async fn update_code(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
    Json(req): Json<UpdateCodeRequest>,
) -> Result<Json<CellView>, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    session.set_code(cell, req.code)?;
    Ok(Json(cell_view(&state, &session, cell)?))
}

/// Cells that never ran or were edited since their last run.
///
/// `GET /sessions/{id}/dirty`
pub async fn dirty_cells(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DirtyCellsResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let code = session.code_dict();
    let dirty = state
        .staleness
        .dirty_set(session.id(), code.iter().map(|(cell, code)| (*cell, code.as_str())));

    let order = session.cell_ids();
    let in_order = |set: &HashSet<ShortCellId>| -> Vec<ShortCellId> {
        order.iter().copied().filter(|cell| set.contains(cell)).collect()
    };
    Ok(Json(DirtyCellsResponse {
        clean: dirty.is_clean(),
        never_run: in_order(&dirty.never_run),
        modified: in_order(&dirty.modified),
    }))
}

/// `DELETE /sessions/{id}/cells/{cell}`
pub async fn delete_cell(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    state.sessions.delete_cell(&session, cell).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Runs one cell through the execution coordinator.
///
/// `POST /sessions/{id}/cells/{cell}/execute`
pub async fn execute_cell(
    State(state): State<AppState>,
    Path((id, cell)): Path<(String, String)>,
    Json(req): Json<ExecuteCellRequest>,
) -> Result<Json<ExecuteCellResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let cell = parse_cell(&cell)?;
    let record_timing = req
        .record_timing
        .unwrap_or(state.coordinator.options().record_timing);

    let outcome = state
        .coordinator
        .execute_with(&session, cell, record_timing)
        .await?;
    Ok(Json(ExecuteCellResponse {
        outcome,
        cell: cell_view(&state, &session, cell)?,
    }))
}

/// Runs cells in order, aborting the rest after the first failure.
///
/// `POST /sessions/{id}/run`
pub async fn run_cells(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RunCellsRequest>,
) -> Result<Json<RunCellsResponse>, ApiError> {
    let session = require_session(&state, &id)?;
    let cells = req
        .cells
        .iter()
        .map(|raw| parse_cell(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let report = state.coordinator.run_cells(&session, &cells).await;
    let runs = report
        .runs
        .into_iter()
        .map(|run| match run.result {
            Ok(outcome) => CellRunView {
                cell: run.cell,
                outcome: Some(outcome),
                error: None,
            },
            Err(err) => CellRunView {
                cell: run.cell,
                outcome: None,
                error: Some(err.to_string()),
            },
        })
        .collect::<Vec<_>>();

    Ok(Json(RunCellsResponse {
        success: runs.iter().all(|run| run.error.is_none()),
        runs,
    }))
}
