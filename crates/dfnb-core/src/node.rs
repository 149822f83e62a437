//! Graph node payloads.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::ShortCellId;

/// Freshness of a cell relative to the rest of the graph.
///
/// This is graph staleness (has something upstream changed), which is
/// independent of content staleness (does the editor text still match what
/// was last run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    /// Known to the backend but not executed in this session.
    #[default]
    Stale,
    /// Edited since it last ran.
    Changed,
    /// Something it depends on was edited.
    UpstreamStale,
    /// Executed and nothing upstream changed since.
    Fresh,
}

/// A cell's dataflow identity inside the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellNode {
    pub id: ShortCellId,
    /// Code text last reported for this cell.
    pub code: String,
    /// Output variable bindings declared by the last execution, if any.
    pub output_vars: SmallVec<[String; 4]>,
    pub state: CellState,
    /// Set once the cell has completed an execution in this session.
    pub executed: bool,
}

impl CellNode {
    pub fn new(id: ShortCellId) -> Self {
        CellNode {
            id,
            code: String::new(),
            output_vars: SmallVec::new(),
            state: CellState::Stale,
            executed: false,
        }
    }
}
