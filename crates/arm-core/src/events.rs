use serde::{Deserialize, Serialize};

use crate::error::ErrorBag;
use crate::log::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// Every event was one-shot and has fired.
    Completed,
    /// An `ExitProgram` command ended the run.
    Exited,
    Cancelled,
    Faulted,
}

#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Log(LogEntry),
    Finished {
        reason: FinishReason,
        errors: ErrorBag,
    },
}
