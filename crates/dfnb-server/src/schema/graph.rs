//! Dependency view response types.

use serde::Serialize;

use dfnb_core::{CellState, GraphSnapshot, ShortCellId};
use dfnb_state::SessionId;

#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub session_id: SessionId,
    pub graph: GraphSnapshot,
}

/// A cell's transitive upstream or downstream closure.
#[derive(Debug, Clone, Serialize)]
pub struct ClosureResponse {
    pub cell: ShortCellId,
    pub cells: Vec<ShortCellId>,
}

/// Graph state of a cell after a changed/reverted notice.
#[derive(Debug, Clone, Serialize)]
pub struct CellStateResponse {
    pub cell: ShortCellId,
    pub state: CellState,
    /// Downstream cells now marked upstream-stale.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upstream_stale: Vec<ShortCellId>,
}
