/// Execution records
///
/// Run and step-log types plus the durable run store.

pub mod types;

pub mod storage;

pub use storage::{ExecutionStorage, RunStore};
pub use types::{Run, RunOutcome, RunStatus, StepLogEntry, StepStatus};
