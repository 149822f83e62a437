//! Graph update payloads extracted from execution replies.
//!
//! The backend resolves dependencies; the graph only records what it is told.
//! [`GraphDelta`] carries the dependency facts of one reply, and
//! [`DownstreamUpdate`] the transitive-update notices that may accompany it.

use serde::{Deserialize, Serialize};

use crate::edge::Uplink;
use crate::id::ShortCellId;

/// Dependency facts from a single execution reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDelta {
    /// Cells the backend touched.
    #[serde(default)]
    pub cells: Vec<ShortCellId>,
    /// Cells that participated in the execution.
    #[serde(default)]
    pub nodes: Vec<ShortCellId>,
    /// Inbound edges of the triggering cell.
    #[serde(default)]
    pub uplinks: Vec<Uplink>,
    /// Immediate downstream dependents of the triggering cell.
    #[serde(default)]
    pub downlinks: Vec<ShortCellId>,
    /// Full upstream dependency set of the triggering cell.
    #[serde(default)]
    pub upstream: Vec<ShortCellId>,
    /// Upstream cells already part of the visible graph.
    #[serde(default)]
    pub internal_nodes: Vec<ShortCellId>,
    /// Output variables bound by the triggering cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_vars: Option<Vec<String>>,
}

/// Notice that `cell` was updated transitively by another cell's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamUpdate {
    pub cell: ShortCellId,
    /// The cell's immediate downstream dependents after the update.
    #[serde(default)]
    pub downstream: Vec<ShortCellId>,
}

/// Backend-supplied annotations recorded for a cell, keyed by the cell whose
/// execution produced them. Stored verbatim, never recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAnnotations {
    pub downstream: Vec<ShortCellId>,
    pub upstream: Vec<ShortCellId>,
    pub internal_nodes: Vec<ShortCellId>,
}
