use thiserror::Error;

use dfnb_core::{CoreError, ShortCellId};

/// Errors re-raised to the caller of an execution, after local cleanup.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The reply reported an execution failure.
    #[error("{ename}: {evalue}")]
    Backend {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },

    /// The backend, or the batch driver, dropped the execution because an
    /// earlier one failed.
    #[error("execution aborted")]
    Aborted,

    #[error("submit failed: {0}")]
    Transport(String),

    #[error("backend disconnected before replying")]
    Disconnected,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("cell {0} is not registered in this session")]
    UnknownCell(ShortCellId),
}
