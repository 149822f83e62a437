//! Cell request/response types.
//!
//! Cells are addressed by short id in paths; a long id is accepted too and
//! shortened.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dfnb_core::ShortCellId;

use crate::execution::ExecutionOutcome;
use crate::session::{CellModel, Output};

/// Request to register a notebook cell.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCellRequest {
    /// Long, stable cell identifier.
    pub cell_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCellResponse {
    pub short_id: ShortCellId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCodeRequest {
    pub code: String,
}

/// Request to execute one cell. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteCellRequest {
    /// Overrides the server's timing default for this execution.
    #[serde(default)]
    pub record_timing: Option<bool>,
}

/// A cell as the notebook shows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellView {
    pub cell_id: String,
    pub short_id: ShortCellId,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// `*` while running, else the short id.
    pub prompt: String,
    pub execution_count: Option<i64>,
    pub outputs: Vec<Output>,
    pub metadata: Map<String, Value>,
    /// The editor content matches the code that last ran.
    pub clean: bool,
}

impl CellView {
    pub fn from_model(model: &CellModel, clean: bool) -> Self {
        CellView {
            cell_id: model.id.as_str().to_string(),
            short_id: model.short(),
            code: model.code.clone(),
            tag: model.tag.clone(),
            prompt: model.prompt.to_string(),
            execution_count: model.execution_count,
            outputs: model.outputs.clone(),
            metadata: model.metadata.clone(),
            clean,
        }
    }
}

/// Cells whose editor content diverges from their last run, in notebook order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirtyCellsResponse {
    /// No cell is dirty.
    pub clean: bool,
    pub never_run: Vec<ShortCellId>,
    pub modified: Vec<ShortCellId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteCellResponse {
    pub outcome: ExecutionOutcome,
    pub cell: CellView,
}

/// Request to run several cells in order.
#[derive(Debug, Clone, Deserialize)]
pub struct RunCellsRequest {
    pub cells: Vec<String>,
}

/// Result of one cell of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct CellRunView {
    pub cell: ShortCellId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunCellsResponse {
    pub success: bool,
    pub runs: Vec<CellRunView>,
}
