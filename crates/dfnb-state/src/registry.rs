//! Graph registry: one dependency graph per live session.
//!
//! Graphs live as long as the session's compute connection. Each graph sits
//! behind its own `tokio::sync::RwLock`, so a merge is exclusive for that
//! session only. Other sessions never contend. Readers either see the
//! graph before a merge or after it, never halfway.
//!
//! Dependency views subscribe to a broadcast channel. A notification with
//! `force_full_redraw` means "rebuild from scratch": it is sent when a
//! session's graph is first created and there is no previous state to diff.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use dfnb_core::{DependencyGraph, ShortCellId};

use crate::error::StateError;
use crate::types::SessionId;

/// A session's graph, shared between the coordinator and views.
pub type SharedGraph = Arc<RwLock<DependencyGraph>>;

/// Message fanned out to dependency-view subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNotification {
    pub session: SessionId,
    /// Subscribers must rebuild instead of diffing.
    pub force_full_redraw: bool,
    /// Cells flagged by transitive-update notices, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged: Vec<ShortCellId>,
}

/// Result of [`GraphRegistry::ensure`].
#[derive(Debug, Clone)]
pub struct EnsuredGraph {
    pub graph: SharedGraph,
    /// `true` if this call created the graph.
    pub created: bool,
}

/// Owner of every per-session [`DependencyGraph`].
pub struct GraphRegistry {
    graphs: DashMap<SessionId, SharedGraph>,
    views: broadcast::Sender<ViewNotification>,
}

impl GraphRegistry {
    /// Creates an empty registry whose view channel buffers `capacity`
    /// notifications per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (views, _) = broadcast::channel(capacity.max(1));
        GraphRegistry {
            graphs: DashMap::new(),
            views,
        }
    }

    /// Returns the session's graph, creating an empty one if needed.
    pub fn ensure(&self, session: SessionId) -> EnsuredGraph {
        match self.graphs.entry(session) {
            Entry::Occupied(entry) => EnsuredGraph {
                graph: Arc::clone(entry.get()),
                created: false,
            },
            Entry::Vacant(entry) => {
                let graph: SharedGraph = Arc::new(RwLock::new(DependencyGraph::new()));
                entry.insert(Arc::clone(&graph));
                tracing::info!(%session, "created dependency graph");
                EnsuredGraph {
                    graph,
                    created: true,
                }
            }
        }
    }

    pub fn get(&self, session: SessionId) -> Option<SharedGraph> {
        self.graphs.get(&session).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`get`](Self::get) but errors when the session has no graph.
    pub fn require(&self, session: SessionId) -> Result<SharedGraph, StateError> {
        self.get(session).ok_or(StateError::GraphNotFound(session))
    }

    /// Discards a session's graph. Returns `true` if one existed.
    pub fn remove(&self, session: SessionId) -> bool {
        let removed = self.graphs.remove(&session).is_some();
        if removed {
            tracing::info!(%session, "discarded dependency graph");
        }
        removed
    }

    /// Sessions that currently own a graph.
    pub fn sessions(&self) -> Vec<SessionId> {
        self.graphs.iter().map(|entry| *entry.key()).collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewNotification> {
        self.views.subscribe()
    }

    /// Tells every view subscriber that `session`'s graph changed.
    pub fn notify_views(&self, session: SessionId, force_full_redraw: bool) {
        self.send(ViewNotification {
            session,
            force_full_redraw,
            flagged: Vec::new(),
        });
    }

    /// Tells view subscribers which cells were flagged by transitive-update
    /// notices.
    pub fn notify_flagged(&self, session: SessionId, flagged: Vec<ShortCellId>) {
        self.send(ViewNotification {
            session,
            force_full_redraw: false,
            flagged,
        });
    }

    fn send(&self, notification: ViewNotification) {
        // No subscribers is normal: nobody has a view open.
        if self.views.send(notification).is_err() {
            tracing::debug!("no dependency view subscribers");
        }
    }
}

impl Default for GraphRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}
