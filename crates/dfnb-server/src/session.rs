//! Notebook sessions and the cell models the coordinator writes into.
//!
//! A [`NotebookSession`] is one live compute connection: its optional
//! backend, the registered cell models, and a pass-through channel for
//! backend messages the coordinator does not interpret. The
//! [`SessionManager`] owns every session and tears down the session's graph
//! and staleness snapshots when it disconnects.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use dfnb_core::{CellId, CoreError, ShortCellId};
use dfnb_state::{GraphRegistry, SessionId, StalenessTracker, StateError};

use crate::backend::{IopubMessage, KernelBackend};
use crate::execution::AttemptId;

/// One rendered output of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub output_type: String,
    #[serde(default)]
    pub content: Value,
}

/// What the cell's prompt shows: `*` while running, else its short id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Idle(ShortCellId),
    Busy,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::Idle(id) => write!(f, "{id}"),
            Prompt::Busy => f.write_str("*"),
        }
    }
}

impl Serialize for Prompt {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Client-side state of one notebook cell.
#[derive(Debug, Clone)]
pub struct CellModel {
    pub id: CellId,
    pub code: String,
    pub tag: Option<String>,
    pub outputs: Vec<Output>,
    /// Counter reported by the last completed execution.
    pub execution_count: Option<i64>,
    pub prompt: Prompt,
    /// Free-form cell metadata. Timing lives under `"execution"`.
    pub metadata: Map<String, Value>,
    /// Most recently registered execution attempt.
    pub current_attempt: Option<AttemptId>,
    position: usize,
}

impl CellModel {
    fn new(id: CellId, code: String, tag: Option<String>, position: usize) -> Self {
        let prompt = Prompt::Idle(id.short());
        CellModel {
            id,
            code,
            tag,
            outputs: Vec::new(),
            execution_count: None,
            prompt,
            metadata: Map::new(),
            current_attempt: None,
            position,
        }
    }

    pub fn short(&self) -> ShortCellId {
        self.id.short()
    }

    /// Forgets everything the last execution left behind.
    pub fn clear_execution(&mut self) {
        self.outputs.clear();
        self.execution_count = None;
        self.prompt = Prompt::Idle(self.short());
        self.metadata.remove("execution");
    }
}

/// A backend message forwarded without interpretation.
#[derive(Debug, Clone)]
pub struct Passthrough {
    /// Cell whose execution produced the message.
    pub cell: ShortCellId,
    pub message: IopubMessage,
}

/// One live compute connection and its notebook cells.
pub struct NotebookSession {
    id: SessionId,
    backend: RwLock<Option<Arc<dyn KernelBackend>>>,
    cells: DashMap<ShortCellId, CellModel>,
    next_position: AtomicUsize,
    passthrough: broadcast::Sender<Passthrough>,
}

impl fmt::Debug for NotebookSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotebookSession")
            .field("id", &self.id)
            .field("cells", &self.cells.len())
            .field("connected", &self.backend().is_some())
            .finish()
    }
}

impl NotebookSession {
    pub fn new(backend: Option<Arc<dyn KernelBackend>>) -> Self {
        let (passthrough, _) = broadcast::channel(256);
        NotebookSession {
            id: SessionId::new(),
            backend: RwLock::new(backend),
            cells: DashMap::new(),
            next_position: AtomicUsize::new(0),
            passthrough,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    // -----------------------------------------------------------------------
    // Backend connection
    // -----------------------------------------------------------------------

    pub fn backend(&self) -> Option<Arc<dyn KernelBackend>> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attach_backend(&self, backend: Arc<dyn KernelBackend>) {
        *self.backend.write().unwrap_or_else(PoisonError::into_inner) = Some(backend);
        tracing::info!(session = %self.id, "backend attached");
    }

    /// Drops the backend. Returns `true` if one was attached.
    pub fn detach_backend(&self) -> bool {
        let previous = self
            .backend
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::info!(session = %self.id, "backend detached");
        }
        previous.is_some()
    }

    // -----------------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------------

    /// Registers a cell, or updates code and tag of an already registered one.
    ///
    /// Fails if `long_id` is malformed or its short id already belongs to a
    /// different cell.
    pub fn register_cell(
        &self,
        long_id: &str,
        code: impl Into<String>,
        tag: Option<String>,
    ) -> Result<ShortCellId, CoreError> {
        let id = CellId::new(long_id)?;
        let short = id.short();
        let code = code.into();

        match self.cells.entry(short) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                let cell = entry.get_mut();
                if cell.id != id {
                    return Err(CoreError::IdentifierCollision {
                        short,
                        existing: cell.id.as_str().to_string(),
                        incoming: id.as_str().to_string(),
                    });
                }
                cell.code = code;
                cell.tag = tag;
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let position = self.next_position.fetch_add(1, Ordering::Relaxed);
                entry.insert(CellModel::new(id, code, tag, position));
                tracing::debug!(session = %self.id, cell = %short, "registered cell");
            }
        }
        Ok(short)
    }

    pub fn remove_cell(&self, cell: ShortCellId) -> Option<CellModel> {
        self.cells.remove(&cell).map(|(_, model)| model)
    }

    pub fn contains(&self, cell: ShortCellId) -> bool {
        self.cells.contains_key(&cell)
    }

    pub fn cell(&self, cell: ShortCellId) -> Option<CellModel> {
        self.cells.get(&cell).map(|entry| entry.value().clone())
    }

    /// Runs `f` on the cell's model. `None` if the cell is not registered.
    pub fn with_cell_mut<R>(&self, cell: ShortCellId, f: impl FnOnce(&mut CellModel) -> R) -> Option<R> {
        self.cells.get_mut(&cell).map(|mut entry| f(entry.value_mut()))
    }

    pub fn set_code(&self, cell: ShortCellId, code: impl Into<String>) -> Result<(), CoreError> {
        let code = code.into();
        self.with_cell_mut(cell, |model| model.code = code)
            .ok_or(CoreError::CellNotFound { id: cell })
    }

    /// Registered cells in notebook order.
    pub fn cell_ids(&self) -> Vec<ShortCellId> {
        let mut ids: Vec<(usize, ShortCellId)> = self
            .cells
            .iter()
            .map(|entry| (entry.position, *entry.key()))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Current code of every registered cell.
    pub fn code_dict(&self) -> BTreeMap<ShortCellId, String> {
        self.cells
            .iter()
            .map(|entry| (*entry.key(), entry.code.clone()))
            .collect()
    }

    /// `tag -> short id` for every tagged cell.
    pub fn input_tags(&self) -> BTreeMap<String, ShortCellId> {
        self.cells
            .iter()
            .filter_map(|entry| entry.tag.clone().map(|tag| (tag, *entry.key())))
            .collect()
    }

    /// Current outputs of every cell other than `except`.
    pub fn outputs_except(&self, except: ShortCellId) -> BTreeMap<ShortCellId, Vec<Output>> {
        self.cells
            .iter()
            .filter(|entry| *entry.key() != except)
            .map(|entry| (*entry.key(), entry.outputs.clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Pass-through
    // -----------------------------------------------------------------------

    pub fn subscribe_passthrough(&self) -> broadcast::Receiver<Passthrough> {
        self.passthrough.subscribe()
    }

    pub(crate) fn forward(&self, cell: ShortCellId, message: IopubMessage) {
        if self.passthrough.send(Passthrough { cell, message }).is_err() {
            tracing::trace!(session = %self.id, "no output renderer subscribed");
        }
    }
}

/// Owner of every live [`NotebookSession`].
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<NotebookSession>>,
    registry: Arc<GraphRegistry>,
    staleness: Arc<StalenessTracker>,
}

impl SessionManager {
    pub fn new(registry: Arc<GraphRegistry>, staleness: Arc<StalenessTracker>) -> Self {
        SessionManager {
            sessions: DashMap::new(),
            registry,
            staleness,
        }
    }

    /// Opens a session. Its graph is created lazily on first completion.
    pub fn connect(&self, backend: Option<Arc<dyn KernelBackend>>) -> Arc<NotebookSession> {
        let session = Arc::new(NotebookSession::new(backend));
        self.sessions.insert(session.id(), Arc::clone(&session));
        tracing::info!(session = %session.id(), "session connected");
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<NotebookSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn require(&self, id: SessionId) -> Result<Arc<NotebookSession>, StateError> {
        self.get(id).ok_or(StateError::SessionNotFound(id))
    }

    pub fn list(&self) -> Vec<Arc<NotebookSession>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Closes a session and discards its graph and staleness snapshots.
    pub fn disconnect(&self, id: SessionId) -> bool {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return false;
        };
        session.detach_backend();
        self.registry.remove(id);
        self.staleness.clear_session(id);
        tracing::info!(session = %id, "session disconnected");
        true
    }

    /// Deletes a cell from the notebook, its graph node and its snapshot.
    pub async fn delete_cell(
        &self,
        session: &NotebookSession,
        cell: ShortCellId,
    ) -> Result<CellModel, CoreError> {
        let removed = session
            .remove_cell(cell)
            .ok_or(CoreError::CellNotFound { id: cell })?;
        if let Some(graph) = self.registry.get(session.id()) {
            let mut graph = graph.write().await;
            graph.remove_cell(cell);
            graph.update_order(session.cell_ids());
        }
        self.staleness.forget_cell(session.id(), cell);
        Ok(removed)
    }
}
