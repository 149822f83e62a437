//! Execution coordination.
//!
//! [`ExecutionCoordinator::execute`] runs one attempt for one cell:
//!
//! 1. blank code clears the cell and submits nothing;
//! 2. without a backend the cell's outputs are cleared and the attempt fails
//!    with `NoBackend`, which the caller sees as a skip;
//! 3. otherwise the request is submitted and the attempt's message channel is
//!    drained in arrival order. Each message is handled synchronously;
//! 4. an `ok` reply is merged into the session's graph and recorded in the
//!    staleness tracker. Error and aborted replies leave the graph alone and
//!    are returned as [`ExecutionError`].
//!
//! A newer attempt on the same cell supersedes older ones: only the cell's
//! current attempt may reset its prompt or write its execution counter.

mod attempt;
mod batch;
mod error;
pub mod timing;

pub use attempt::{Attempt, AttemptId, AttemptState, FailureKind};
pub use batch::{BatchReport, CellRun};
pub use error::ExecutionError;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use dfnb_core::{ExecutionCountCodec, HexPrefixCodec, ShortCellId};
use dfnb_state::{GraphRegistry, StalenessTracker};

use crate::backend::{
    BackendMessage, DataflowData, ExecuteReply, ExecuteRequest, IopubEvent, IopubMessage,
    ReplyStatus, RequestMetadata,
};
use crate::session::{CellModel, NotebookSession, Prompt};

/// Per-coordinator execution switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub record_timing: bool,
    pub enable_tags: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ExecutionOptions {
            record_timing: false,
            enable_tags: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoBackend,
    EmptyCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedExecution {
    pub cell: ShortCellId,
    pub execution_count: Option<i64>,
    /// This completion created the session's graph.
    pub graph_created: bool,
    /// Cells flagged by the reply's transitive-update notices.
    pub flagged: Vec<ShortCellId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ExecutionOutcome {
    Completed(CompletedExecution),
    Skipped { reason: SkipReason },
}

/// Drives execution attempts and merges their results.
pub struct ExecutionCoordinator {
    registry: Arc<GraphRegistry>,
    staleness: Arc<StalenessTracker>,
    codec: Arc<dyn ExecutionCountCodec>,
    options: ExecutionOptions,
    next_attempt: AtomicU64,
}

/// What the completion step needs from the submission.
struct Submitted {
    code: String,
    code_dict: BTreeMap<ShortCellId, String>,
    record_timing: bool,
}

impl ExecutionCoordinator {
    pub fn new(
        registry: Arc<GraphRegistry>,
        staleness: Arc<StalenessTracker>,
        options: ExecutionOptions,
    ) -> Self {
        Self::with_codec(registry, staleness, Arc::new(HexPrefixCodec), options)
    }

    pub fn with_codec(
        registry: Arc<GraphRegistry>,
        staleness: Arc<StalenessTracker>,
        codec: Arc<dyn ExecutionCountCodec>,
        options: ExecutionOptions,
    ) -> Self {
        ExecutionCoordinator {
            registry,
            staleness,
            codec,
            options,
            next_attempt: AtomicU64::new(1),
        }
    }

    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Executes `cell` with the coordinator's default timing setting.
    pub async fn execute(
        &self,
        session: &NotebookSession,
        cell: ShortCellId,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        self.execute_with(session, cell, self.options.record_timing).await
    }

    /// Executes `cell`, recording timing metadata if `record_timing`.
    pub async fn execute_with(
        &self,
        session: &NotebookSession,
        cell: ShortCellId,
        record_timing: bool,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let model = session.cell(cell).ok_or(ExecutionError::UnknownCell(cell))?;

        if model.code.trim().is_empty() {
            session.with_cell_mut(cell, CellModel::clear_execution);
            tracing::debug!(session = %session.id(), %cell, "blank cell, nothing submitted");
            return Ok(ExecutionOutcome::Skipped {
                reason: SkipReason::EmptyCode,
            });
        }

        let id = AttemptId(self.next_attempt.fetch_add(1, Ordering::Relaxed));
        let mut attempt = Attempt::new(id, session.id(), cell);
        attempt.advance(AttemptState::Submitting);

        let Some(backend) = session.backend() else {
            session.with_cell_mut(cell, |m| m.outputs.clear());
            attempt.advance(AttemptState::Failed(FailureKind::NoBackend));
            tracing::info!(session = %session.id(), %cell, "no backend, outputs cleared");
            return Ok(ExecutionOutcome::Skipped {
                reason: SkipReason::NoBackend,
            });
        };

        session.with_cell_mut(cell, |m| {
            m.current_attempt = Some(id);
            m.prompt = Prompt::Busy;
            m.outputs.clear();
            if record_timing {
                timing::start(&mut m.metadata);
            } else {
                timing::clear(&mut m.metadata);
            }
        });

        let request = self.build_request(session, &model, record_timing);
        let submitted = Submitted {
            code: request.code.clone(),
            code_dict: request.auxiliary.code_dict.clone(),
            record_timing,
        };

        let mut messages = match backend.submit(request) {
            Ok(rx) => rx,
            Err(err) => {
                tracing::warn!(session = %session.id(), %cell, "submit failed: {}", err);
                self.fail(session, &mut attempt, FailureKind::Transport);
                return Err(ExecutionError::Transport(err.0));
            }
        };
        attempt.advance(AttemptState::Streaming);

        let reply = loop {
            match messages.recv().await {
                Some(BackendMessage::Iopub(message)) => {
                    self.handle_message(session, cell, &message, record_timing)
                }
                Some(BackendMessage::Reply(reply)) => break reply,
                None => {
                    tracing::warn!(session = %session.id(), %cell, "channel closed before reply");
                    self.fail(session, &mut attempt, FailureKind::Disconnected);
                    return Err(ExecutionError::Disconnected);
                }
            }
        };

        match reply.content.status {
            ReplyStatus::Ok => self.complete(session, &mut attempt, submitted, reply).await,
            ReplyStatus::Error => {
                let content = reply.content;
                tracing::warn!(
                    session = %session.id(),
                    %cell,
                    ename = content.ename.as_deref().unwrap_or_default(),
                    "execution failed"
                );
                self.fail(session, &mut attempt, FailureKind::Backend);
                Err(ExecutionError::Backend {
                    ename: content.ename.unwrap_or_default(),
                    evalue: content.evalue.unwrap_or_default(),
                    traceback: content.traceback,
                })
            }
            ReplyStatus::Aborted => {
                session.with_cell_mut(cell, |m| m.outputs.clear());
                attempt.advance(AttemptState::Aborted);
                self.reset_prompt(session, &attempt);
                tracing::info!(session = %session.id(), %cell, "execution aborted by backend");
                Err(ExecutionError::Aborted)
            }
        }
    }

    fn build_request(
        &self,
        session: &NotebookSession,
        model: &CellModel,
        record_timing: bool,
    ) -> ExecuteRequest {
        let cell = model.short();
        let input_tags = if self.options.enable_tags {
            session.input_tags()
        } else {
            BTreeMap::new()
        };
        ExecuteRequest {
            code: model.code.clone(),
            metadata: RequestMetadata {
                cell_id: model.id.clone(),
                tag: model.tag.clone(),
                record_timing,
            },
            auxiliary: DataflowData {
                uuid: cell,
                code_dict: session.code_dict(),
                input_tags,
            },
            prior_outputs: session.outputs_except(cell),
        }
    }

    /// Decodes a routing counter to a registered cell other than `trigger`.
    fn other_cell(
        &self,
        session: &NotebookSession,
        trigger: ShortCellId,
        counter: Option<i64>,
    ) -> Option<ShortCellId> {
        let counter = counter?;
        match self.codec.decode(counter) {
            Some(id) if id == trigger => None,
            Some(id) if session.contains(id) => Some(id),
            _ => {
                tracing::debug!(session = %session.id(), counter, "counter maps to no known cell");
                None
            }
        }
    }

    /// Applies one streamed message. Never yields.
    fn handle_message(
        &self,
        session: &NotebookSession,
        trigger: ShortCellId,
        message: &IopubMessage,
        record_timing: bool,
    ) {
        match message.event() {
            IopubEvent::ExecuteInput {
                code,
                execution_count,
            } => {
                if record_timing {
                    let at = timing::timestamp(&message.header);
                    session.with_cell_mut(trigger, |m| {
                        timing::record(&mut m.metadata, "iopub.execute_input", at)
                    });
                }
                if let Some(other) = self.other_cell(session, trigger, execution_count) {
                    tracing::debug!(session = %session.id(), cell = %other, "backend re-ran dependent cell");
                    session.with_cell_mut(other, |m| {
                        m.code = code;
                        m.outputs.clear();
                    });
                }
            }
            IopubEvent::Status { execution_state } => {
                if record_timing {
                    let key = format!("iopub.status.{execution_state}");
                    let at = timing::timestamp(&message.header);
                    session.with_cell_mut(trigger, |m| timing::record(&mut m.metadata, &key, at));
                }
            }
            IopubEvent::Output {
                execution_count,
                output,
            } => {
                let target = self
                    .other_cell(session, trigger, execution_count)
                    .unwrap_or(trigger);
                session.with_cell_mut(target, |m| m.outputs.push(output));
            }
            IopubEvent::ClearOutput => {
                session.with_cell_mut(trigger, |m| m.outputs.clear());
            }
            IopubEvent::Other => session.forward(trigger, message.clone()),
        }
    }

    async fn complete(
        &self,
        session: &NotebookSession,
        attempt: &mut Attempt,
        submitted: Submitted,
        reply: ExecuteReply,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let cell = attempt.cell();
        let updates = match reply.content.downstream_updates() {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!(session = %session.id(), %cell, "unusable reply: {}", err);
                self.fail(session, attempt, FailureKind::InvalidReply);
                return Err(err.into());
            }
        };

        let current = self.is_current(session, attempt);
        let execution_count = reply.content.execution_count;
        session.with_cell_mut(cell, |m| {
            if current {
                m.execution_count = execution_count;
            }
            if submitted.record_timing {
                if let Some(started) = reply.metadata.started.clone() {
                    timing::record(&mut m.metadata, "shell.execute_reply.started", started);
                }
                timing::record(
                    &mut m.metadata,
                    "shell.execute_reply",
                    timing::timestamp(&reply.header),
                );
            }
        });

        let delta = reply.content.graph_delta();
        let ensured = self.registry.ensure(session.id());
        let flagged = {
            let mut graph = ensured.graph.write().await;
            let contents = submitted
                .code_dict
                .into_iter()
                .filter(|(id, _)| *id == cell || delta.cells.contains(id) || delta.nodes.contains(id))
                .map(|(id, code)| {
                    let code = if id == cell { submitted.code.clone() } else { code };
                    (id, code)
                });
            graph.update_cell_contents(contents);
            graph.update_graph(cell, &delta);
            graph.update_order(session.cell_ids());
            updates
                .as_deref()
                .map(|updates| graph.update_down_links(updates))
                .unwrap_or_default()
        };

        // Views hear about the merge only once it is visible to readers.
        self.registry.notify_views(session.id(), ensured.created);
        if !flagged.is_empty() {
            self.registry.notify_flagged(session.id(), flagged.clone());
        }

        self.staleness.record_run(session.id(), cell, &submitted.code);

        attempt.advance(AttemptState::Completed);
        self.reset_prompt(session, attempt);
        tracing::debug!(session = %session.id(), %cell, "execution completed");

        Ok(ExecutionOutcome::Completed(CompletedExecution {
            cell,
            execution_count,
            graph_created: ensured.created,
            flagged,
        }))
    }

    fn fail(&self, session: &NotebookSession, attempt: &mut Attempt, kind: FailureKind) {
        attempt.advance(AttemptState::Failed(kind));
        self.reset_prompt(session, attempt);
    }

    fn is_current(&self, session: &NotebookSession, attempt: &Attempt) -> bool {
        session
            .cell(attempt.cell())
            .is_some_and(|m| m.current_attempt == Some(attempt.id()))
    }

    /// Shows the cell's id again, unless a newer attempt owns the cell.
    fn reset_prompt(&self, session: &NotebookSession, attempt: &Attempt) {
        session.with_cell_mut(attempt.cell(), |m| {
            if m.current_attempt == Some(attempt.id()) {
                m.prompt = Prompt::Idle(attempt.cell());
            } else {
                tracing::debug!(cell = %attempt.cell(), attempt = %attempt.id(), "attempt superseded");
            }
        });
    }
}
