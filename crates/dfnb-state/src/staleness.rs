//! Content staleness: does a cell's editor text still match what last ran?
//!
//! Snapshots are stored trimmed. A missing snapshot is never clean, and
//! neither is an empty one: a cell that was cleared must not look unchanged
//! just because its editor is empty too.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;

use dfnb_core::ShortCellId;

use crate::types::SessionId;

/// Cells whose editor content diverges from their last run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    /// Cells with no meaningful snapshot in this session.
    pub never_run: HashSet<ShortCellId>,
    /// Cells whose trimmed code differs from the snapshot.
    pub modified: HashSet<ShortCellId>,
}

impl DirtySet {
    /// Returns true if every inspected cell is clean.
    pub fn is_clean(&self) -> bool {
        self.never_run.is_empty() && self.modified.is_empty()
    }
}

/// Per-session record of the last successfully executed code of each cell.
///
/// Backed by `DashMap`, so recording from one session never blocks lookups
/// in another.
#[derive(Debug, Default)]
pub struct StalenessTracker {
    sessions: DashMap<SessionId, HashMap<ShortCellId, String>>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the snapshot for `cell`. Called once per completed run.
    pub fn record_run(&self, session: SessionId, cell: ShortCellId, code: &str) {
        self.sessions
            .entry(session)
            .or_default()
            .insert(cell, code.trim().to_string());
    }

    /// True iff a non-empty snapshot exists and equals `current` once both
    /// sides are trimmed.
    pub fn is_clean(&self, session: SessionId, cell: ShortCellId, current: &str) -> bool {
        self.sessions
            .get(&session)
            .and_then(|cells| {
                cells
                    .get(&cell)
                    .map(|last| !last.is_empty() && last == current.trim())
            })
            .unwrap_or(false)
    }

    /// The trimmed code `cell` last ran with, if any.
    pub fn snapshot(&self, session: SessionId, cell: ShortCellId) -> Option<String> {
        self.sessions
            .get(&session)
            .and_then(|cells| cells.get(&cell).cloned())
    }

    /// Classifies the given editor contents against the session's snapshots.
    pub fn dirty_set<'a, I>(&self, session: SessionId, current: I) -> DirtySet
    where
        I: IntoIterator<Item = (ShortCellId, &'a str)>,
    {
        let snapshots = self.sessions.get(&session);
        let mut dirty = DirtySet::default();

        for (cell, code) in current {
            match snapshots.as_ref().and_then(|s| s.get(&cell)) {
                Some(last) if !last.is_empty() => {
                    if last != code.trim() {
                        dirty.modified.insert(cell);
                    }
                }
                _ => {
                    dirty.never_run.insert(cell);
                }
            }
        }
        dirty
    }

    /// Drops the snapshot of a deleted cell.
    pub fn forget_cell(&self, session: SessionId, cell: ShortCellId) {
        if let Some(mut cells) = self.sessions.get_mut(&session) {
            cells.remove(&cell);
        }
    }

    /// Discards all snapshots of a session. Returns `true` if it had any.
    pub fn clear_session(&self, session: SessionId) -> bool {
        self.sessions.remove(&session).is_some()
    }
}
