//! Shared fixtures: in-process backends and message builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::mpsc;

use dfnb_core::ShortCellId;
use dfnb_server::backend::{
    BackendMessage, ExecuteReply, ExecuteRequest, IopubMessage, KernelBackend, MessageHeader,
    TransportError,
};
use dfnb_server::execution::{ExecutionCoordinator, ExecutionOptions};
use dfnb_server::session::NotebookSession;
use dfnb_state::{GraphRegistry, StalenessTracker};

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Long cell id whose short form is `raw` as 8 hex digits.
pub fn long(raw: u32) -> String {
    format!("{raw:08x}-0000-4000-8000-000000000000")
}

pub fn short(raw: u32) -> ShortCellId {
    ShortCellId::from_raw(raw)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub fn iopub(msg_type: &str, content: Value) -> BackendMessage {
    BackendMessage::Iopub(IopubMessage::new(msg_type, content))
}

pub fn iopub_at(msg_type: &str, date: &str, content: Value) -> BackendMessage {
    BackendMessage::Iopub(IopubMessage {
        header: MessageHeader {
            msg_type: msg_type.to_string(),
            date: Some(date.to_string()),
        },
        content,
    })
}

/// A reply with the given status and counter, plus `extra` content fields.
pub fn reply(status: &str, execution_count: u32, extra: Value) -> BackendMessage {
    let mut content = json!({ "status": status, "execution_count": execution_count });
    if let (Some(map), Value::Object(extra)) = (content.as_object_mut(), extra) {
        map.extend(extra);
    }
    let reply: ExecuteReply = serde_json::from_value(json!({
        "header": { "msg_type": "execute_reply" },
        "content": content,
    }))
    .unwrap();
    BackendMessage::Reply(reply)
}

pub fn ok(execution_count: u32, extra: Value) -> BackendMessage {
    reply("ok", execution_count, extra)
}

pub fn error(execution_count: u32, ename: &str, evalue: &str) -> BackendMessage {
    reply(
        "error",
        execution_count,
        json!({ "ename": ename, "evalue": evalue, "traceback": ["line 1"] }),
    )
}

pub fn aborted(execution_count: u32) -> BackendMessage {
    reply("aborted", execution_count, json!({}))
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Replays canned message sequences, one per submission, keyed by cell.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<ShortCellId, VecDeque<Vec<BackendMessage>>>>,
    requests: Mutex<Vec<ExecuteRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the messages answering the next submission for `cell`.
    pub fn script(&self, cell: ShortCellId, messages: Vec<BackendMessage>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(cell)
            .or_default()
            .push_back(messages);
    }

    pub fn requests(&self) -> Vec<ExecuteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl KernelBackend for ScriptedBackend {
    fn submit(
        &self,
        request: ExecuteRequest,
    ) -> Result<mpsc::UnboundedReceiver<BackendMessage>, TransportError> {
        let cell = request.auxiliary.uuid;
        self.requests.lock().unwrap().push(request);
        let messages = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&cell)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| TransportError(format!("no script for {cell}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        for message in messages {
            tx.send(message).unwrap();
        }
        Ok(rx)
    }
}

pub type Submission = (ExecuteRequest, mpsc::UnboundedSender<BackendMessage>);

/// Hands each submission's sender to the test, which answers by hand.
pub struct ManualBackend {
    submissions: mpsc::UnboundedSender<Submission>,
}

impl ManualBackend {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Submission>) {
        let (submissions, rx) = mpsc::unbounded_channel();
        (Arc::new(ManualBackend { submissions }), rx)
    }
}

impl KernelBackend for ManualBackend {
    fn submit(
        &self,
        request: ExecuteRequest,
    ) -> Result<mpsc::UnboundedReceiver<BackendMessage>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.submissions
            .send((request, tx))
            .map_err(|_| TransportError("test dropped the submission queue".into()))?;
        Ok(rx)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub registry: Arc<GraphRegistry>,
    pub staleness: Arc<StalenessTracker>,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub session: Arc<NotebookSession>,
    pub backend: Arc<ScriptedBackend>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ExecutionOptions::default())
    }

    pub fn with_options(options: ExecutionOptions) -> Self {
        let registry = Arc::new(GraphRegistry::new(16));
        let staleness = Arc::new(StalenessTracker::new());
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&staleness),
            options,
        ));
        let backend = ScriptedBackend::new();
        let session = Arc::new(NotebookSession::new(Some(
            backend.clone() as Arc<dyn KernelBackend>
        )));
        Harness {
            registry,
            staleness,
            coordinator,
            session,
            backend,
        }
    }

    /// Registers cell `raw` with `code`, returning its short id.
    pub fn cell(&self, raw: u32, code: &str) -> ShortCellId {
        self.session.register_cell(&long(raw), code, None).unwrap()
    }

    pub fn tagged_cell(&self, raw: u32, code: &str, tag: &str) -> ShortCellId {
        self.session
            .register_cell(&long(raw), code, Some(tag.to_string()))
            .unwrap()
    }
}
