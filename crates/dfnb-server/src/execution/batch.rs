//! Run-several-cells driver.
//!
//! Cells run one after another. Once one fails, the rest are not submitted:
//! their outputs are cleared and they report [`ExecutionError::Aborted`].

use dfnb_core::ShortCellId;

use super::{ExecutionCoordinator, ExecutionError, ExecutionOutcome};
use crate::session::{CellModel, NotebookSession};

/// Result for one cell of a batch.
#[derive(Debug, Clone)]
pub struct CellRun {
    pub cell: ShortCellId,
    pub result: Result<ExecutionOutcome, ExecutionError>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub runs: Vec<CellRun>,
}

impl BatchReport {
    /// The first failing cell and its error, if any.
    pub fn first_failure(&self) -> Option<(ShortCellId, &ExecutionError)> {
        self.runs
            .iter()
            .find_map(|run| run.result.as_ref().err().map(|err| (run.cell, err)))
    }

    pub fn succeeded(&self) -> bool {
        self.runs.iter().all(|run| run.result.is_ok())
    }
}

impl ExecutionCoordinator {
    /// Executes `cells` in order, aborting the remainder after a failure.
    pub async fn run_cells(&self, session: &NotebookSession, cells: &[ShortCellId]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut failed = false;

        for &cell in cells {
            let result = if failed {
                session.with_cell_mut(cell, CellModel::clear_execution);
                Err(ExecutionError::Aborted)
            } else {
                let result = self.execute(session, cell).await;
                if let Err(err) = &result {
                    tracing::info!(session = %session.id(), %cell, "batch stopped: {}", err);
                    failed = true;
                }
                result
            };
            report.runs.push(CellRun { cell, result });
        }
        report
    }
}
