/// Run records
///
/// A [`Run`] is one execution attempt of a workflow. Its step log grows by one
/// entry per attempted step and is persisted after every step, so a crash
/// mid-run still leaves the partial record behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(anyhow::anyhow!("Unknown run status: {}", other)),
        }
    }
}

/// Why a run stopped
///
/// `OrphanedSuccessor` is kept apart from `StepFailed`: a link that points at a
/// step which no longer exists ends the run quietly as completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    NoTrigger { trigger: String },
    ChainExhausted,
    OrphanedSuccessor { step_id: String },
    StepFailed { step_id: String },
    /// The chain returned to a step it already ran
    CycleDetected { step_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
}

/// One attempted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLogEntry {
    pub step_id: String,
    pub step_type: String,
    pub status: StepStatus,
    /// Snapshot of the data fed into the step
    pub input: Value,
    /// Produced value, or the error message on failure
    pub output: Value,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl StepLogEntry {
    /// Entry for a run-level problem that happened before any step ran
    pub fn system_error(message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step_id: "system".to_string(),
            step_type: "system".to_string(),
            status: StepStatus::Error,
            input: Value::Null,
            output: Value::String(message.into()),
            start_time: now,
            end_time: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub workflow_id: String,
    pub user_id: String,
    pub status: RunStatus,
    pub outcome: Option<RunOutcome>,
    pub step_logs: Vec<StepLogEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Fresh run in the running state
    pub fn start(workflow_id: &str, user_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            user_id: user_id.to_string(),
            status: RunStatus::Running,
            outcome: None,
            step_logs: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to a terminal state and stamp `finished_at`
    ///
    /// A run that is already terminal keeps its first verdict.
    pub fn finish(&mut self, status: RunStatus, outcome: RunOutcome) {
        if self.status.is_terminal() {
            tracing::warn!("Run {} already {}, ignoring transition to {}",
                self.id, self.status.as_str(), status.as_str());
            return;
        }
        self.status = status;
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_state_is_sticky() {
        let mut run = Run::start("wf", "u");
        run.finish(RunStatus::Failed, RunOutcome::StepFailed { step_id: "s".into() });
        let finished = run.finished_at;
        run.finish(RunStatus::Completed, RunOutcome::ChainExhausted);
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.finished_at, finished);
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_value(RunOutcome::OrphanedSuccessor { step_id: "x".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "orphaned_successor", "step_id": "x"}));
    }
}
