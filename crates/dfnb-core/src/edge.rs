//! Dependency edges between cells.
//!
//! An uplink says "the consuming cell reads something the producing cell
//! exposes". The label names what is read: either a raw variable name or a
//! user-assigned tag on the producing cell's output.

use serde::{Deserialize, Serialize};

use crate::id::ShortCellId;

/// How a consuming cell referred to the producer's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Plain variable name.
    #[default]
    Variable,
    /// User-assigned tag.
    Tag,
}

/// Edge weight stored in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkLabel {
    pub name: String,
    #[serde(default)]
    pub kind: LinkKind,
}

impl LinkLabel {
    pub fn variable(name: impl Into<String>) -> Self {
        LinkLabel {
            name: name.into(),
            kind: LinkKind::Variable,
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        LinkLabel {
            name: name.into(),
            kind: LinkKind::Tag,
        }
    }
}

/// An inbound dependency of some consuming cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uplink {
    /// Producing cell.
    pub from: ShortCellId,
    /// Consuming cell. `None` means the cell the reply was produced for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ShortCellId>,
    pub label: LinkLabel,
}

impl Uplink {
    pub fn new(from: ShortCellId, label: LinkLabel) -> Self {
        Uplink {
            from,
            to: None,
            label,
        }
    }

    /// Whether this uplink targets `cell` when reported in `cell`'s reply.
    pub fn targets(&self, cell: ShortCellId) -> bool {
        self.to.map_or(true, |to| to == cell)
    }
}
