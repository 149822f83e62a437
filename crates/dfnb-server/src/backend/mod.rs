//! Contract with the execution backend.
//!
//! A [`KernelBackend`] accepts an
//! [`ExecuteRequest`] and hands back a channel carrying every message of that
//! execution in arrival order, ending with the [`ExecuteReply`]. Using one
//! channel per attempt keeps the ordering guarantee without depending on
//! callback registration order.
//!
//! [`HttpKernelBackend`] is the shipped transport: it posts the request to a
//! kernel bridge and reads the messages back as newline-delimited JSON.

mod http;

pub use http::HttpKernelBackend;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use dfnb_core::{
    CellId, CoreError, DownstreamUpdate, GraphDelta, LinkKind, LinkLabel, ShortCellId, Uplink,
};

use crate::session::Output;

/// Something that can run code for a session.
pub trait KernelBackend: Send + Sync {
    /// Submits a request. The returned channel yields the execution's
    /// messages and closes after the final reply.
    fn submit(
        &self,
        request: ExecuteRequest,
    ) -> Result<mpsc::UnboundedReceiver<BackendMessage>, TransportError>;
}

/// Submission failed before any message was exchanged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// One message on an execution's channel.
///
/// On the wire each message carries a `"channel"` field, `"iopub"` or
/// `"reply"`, next to its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum BackendMessage {
    Iopub(IopubMessage),
    Reply(ExecuteReply),
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Payload sent to the backend for one cell execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub metadata: RequestMetadata,
    /// Dataflow side-channel: code of every cell the backend may need.
    pub auxiliary: DataflowData,
    /// Current outputs of the other cells, keyed by short id.
    #[serde(default)]
    pub prior_outputs: BTreeMap<ShortCellId, Vec<Output>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub cell_id: CellId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub record_timing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataflowData {
    /// Short id of the cell being executed.
    pub uuid: ShortCellId,
    pub code_dict: BTreeMap<ShortCellId, String>,
    /// `tag -> short id` of tagged cells. Empty when tags are disabled.
    #[serde(default)]
    pub input_tags: BTreeMap<String, ShortCellId>,
}

// ---------------------------------------------------------------------------
// Streamed messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub msg_type: String,
    /// ISO 8601 timestamp set by the backend, when it sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A streamed (non-reply) message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IopubMessage {
    pub header: MessageHeader,
    #[serde(default)]
    pub content: Value,
}

/// Typed reading of an [`IopubMessage`]'s content.
#[derive(Debug, Clone, PartialEq)]
pub enum IopubEvent {
    /// The backend echoes the code it is about to run under a counter.
    ExecuteInput {
        code: String,
        execution_count: Option<i64>,
    },
    Status {
        execution_state: String,
    },
    /// `stream`, `display_data`, `execute_result` or `error`.
    Output {
        execution_count: Option<i64>,
        output: Output,
    },
    ClearOutput,
    /// Anything else, including malformed known kinds.
    Other,
}

#[derive(Deserialize)]
struct ExecuteInputContent {
    code: String,
    #[serde(default)]
    execution_count: Option<i64>,
}

#[derive(Deserialize)]
struct StatusContent {
    execution_state: String,
}

impl IopubMessage {
    pub fn new(msg_type: &str, content: Value) -> Self {
        IopubMessage {
            header: MessageHeader {
                msg_type: msg_type.to_string(),
                date: None,
            },
            content,
        }
    }

    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    pub fn event(&self) -> IopubEvent {
        match self.msg_type() {
            "execute_input" => serde_json::from_value::<ExecuteInputContent>(self.content.clone())
                .map(|c| IopubEvent::ExecuteInput {
                    code: c.code,
                    execution_count: c.execution_count,
                })
                .unwrap_or(IopubEvent::Other),
            "status" => serde_json::from_value::<StatusContent>(self.content.clone())
                .map(|c| IopubEvent::Status {
                    execution_state: c.execution_state,
                })
                .unwrap_or(IopubEvent::Other),
            kind @ ("stream" | "display_data" | "execute_result" | "error") => {
                let execution_count = self.content.get("execution_count").and_then(Value::as_i64);
                let mut content = self.content.clone();
                // Routing counters on stream/error are not part of the output.
                if matches!(kind, "stream" | "error") {
                    if let Some(map) = content.as_object_mut() {
                        map.remove("execution_count");
                    }
                }
                IopubEvent::Output {
                    execution_count,
                    output: Output {
                        output_type: kind.to_string(),
                        content,
                    },
                }
            }
            "clear_output" => IopubEvent::ClearOutput,
            _ => IopubEvent::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyMetadata {
    /// When the backend started executing (not part of the header).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
}

/// Final message of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteReply {
    pub header: MessageHeader,
    #[serde(default)]
    pub metadata: ReplyMetadata,
    pub content: ExecuteReplyContent,
}

/// A dependency link as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLink {
    pub from: ShortCellId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ShortCellId>,
    pub label: String,
    #[serde(default)]
    pub kind: LinkKind,
}

/// Transitive-update notice. `cellId` may be a long or short id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDownstreamUpdate {
    #[serde(rename = "cellId", alias = "key")]
    pub cell_id: String,
    #[serde(default, alias = "data")]
    pub info: Vec<ShortCellId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteReplyContent {
    pub status: ReplyStatus,
    #[serde(default)]
    pub execution_count: Option<i64>,
    #[serde(default)]
    pub nodes: Vec<ShortCellId>,
    #[serde(default)]
    pub links: Vec<WireLink>,
    #[serde(default)]
    pub cells: Vec<ShortCellId>,
    #[serde(default)]
    pub imm_downstream_deps: Vec<ShortCellId>,
    #[serde(default)]
    pub upstream_deps: Vec<ShortCellId>,
    #[serde(default)]
    pub internal_nodes: Vec<ShortCellId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_vars: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_downstreams: Option<Vec<WireDownstreamUpdate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evalue: Option<String>,
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl ExecuteReplyContent {
    /// Dependency facts for the graph merge.
    pub fn graph_delta(&self) -> GraphDelta {
        GraphDelta {
            cells: self.cells.clone(),
            nodes: self.nodes.clone(),
            uplinks: self
                .links
                .iter()
                .map(|link| Uplink {
                    from: link.from,
                    to: link.to,
                    label: LinkLabel {
                        name: link.label.clone(),
                        kind: link.kind,
                    },
                })
                .collect(),
            downlinks: self.imm_downstream_deps.clone(),
            upstream: self.upstream_deps.clone(),
            internal_nodes: self.internal_nodes.clone(),
            output_vars: self.output_vars.clone(),
        }
    }

    /// Transitive-update notices, if the reply carries the field.
    pub fn downstream_updates(&self) -> Result<Option<Vec<DownstreamUpdate>>, CoreError> {
        self.update_downstreams
            .as_ref()
            .map(|updates| {
                updates
                    .iter()
                    .map(|u| {
                        Ok(DownstreamUpdate {
                            cell: ShortCellId::shorten(&u.cell_id)?,
                            downstream: u.info.clone(),
                        })
                    })
                    .collect()
            })
            .transpose()
    }
}
