/// Run orchestrator
///
/// Drives one workflow run from its trigger step to a terminal state. Steps
/// run strictly one after another: each step's output becomes the next step's
/// input and is recorded under the step's ID so later steps can reference it.
/// The run record is persisted after every step.

use crate::execution::storage::RunStore;
use crate::execution::types::{Run, RunOutcome, RunStatus, StepLogEntry, StepStatus};
use crate::runtime::executor::{NodeExecutor, StepOutcome};
use crate::runtime::template::NodeOutputs;
use crate::workflow::graph::StepGraph;
use crate::workflow::types::{Step, TriggerKind, Workflow};
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How the next step is chosen after a successful step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraversalStrategy {
    /// Follow only the first outgoing link, in link-list order
    #[default]
    LinearChain,
}

impl TraversalStrategy {
    pub fn next<'g>(&self, graph: &'g StepGraph, step_id: &str) -> Option<&'g str> {
        match self {
            TraversalStrategy::LinearChain => {
                let successors = graph.successors(step_id);
                if successors.len() > 1 {
                    tracing::warn!(
                        "🔀 Step '{}' has {} outgoing links; following '{}', ignoring [{}]",
                        step_id,
                        successors.len(),
                        successors[0],
                        successors[1..].join(", ")
                    );
                }
                successors.first().copied()
            }
        }
    }
}

/// Orchestrates runs over a shared dispatcher and run store
pub struct ExecutionEngine {
    executor: Arc<NodeExecutor>,
    runs: Arc<dyn RunStore>,
    strategy: TraversalStrategy,
}

impl ExecutionEngine {
    pub fn new(executor: Arc<NodeExecutor>, runs: Arc<dyn RunStore>) -> Self {
        Self {
            executor,
            runs,
            strategy: TraversalStrategy::default(),
        }
    }

    /// Execute `workflow` from the trigger step matching `trigger`
    ///
    /// Returns the terminal run record. Step failures are part of the record,
    /// not errors; `Err` means the run store could not be written.
    pub async fn run_workflow(
        &self,
        workflow: &Workflow,
        trigger: TriggerKind,
        payload: Value,
        user_id: &str,
    ) -> Result<Run> {
        let workflow_start_time = std::time::Instant::now();
        let mut run = Run::start(&workflow.id, user_id);
        self.runs.create(&run).await?;

        tracing::info!("🚀 Starting run {} of workflow '{}' ({} trigger, user {})",
            run.id, workflow.id, trigger, user_id);

        let Some(entry) = workflow.entry_step(trigger) else {
            let trigger_type = trigger_step_type(trigger);
            tracing::error!("❌ No trigger node found for type: {} in workflow '{}'", trigger_type, workflow.id);
            run.step_logs.push(StepLogEntry::system_error(format!("No trigger node found for type: {}", trigger_type)));
            run.finish(RunStatus::Failed, RunOutcome::NoTrigger { trigger: trigger_type.to_string() });
            self.persist(&run).await?;
            return Ok(run);
        };

        let graph = StepGraph::build(&workflow.steps, &workflow.links);
        let steps: HashMap<&str, &Step> = workflow.steps.iter().map(|s| (s.id.as_str(), s)).collect();

        let reachable = graph.reachable_from(&entry.id);
        let unreachable: Vec<&str> = workflow
            .steps
            .iter()
            .map(|s| s.id.as_str())
            .filter(|id| !reachable.contains(id))
            .collect();
        if !unreachable.is_empty() {
            tracing::debug!("🏝️ Steps not reachable from '{}': [{}]", entry.id, unreachable.join(", "));
        }

        let mut current_data = payload;
        let mut outputs = NodeOutputs::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current_id: Option<&str> = Some(entry.id.as_str());
        let mut outcome = RunOutcome::ChainExhausted;

        while let Some(step_id) = current_id {
            let Some(step) = steps.get(step_id).copied() else {
                tracing::warn!("👻 Link points at missing step '{}'; ending run {}", step_id, run.id);
                outcome = RunOutcome::OrphanedSuccessor { step_id: step_id.to_string() };
                break;
            };

            if !visited.insert(step_id) {
                tracing::error!("❌ Step '{}' reached twice; the chain loops", step_id);
                run.step_logs.push(StepLogEntry::system_error(format!("Cycle detected at step: {}", step_id)));
                run.finish(RunStatus::Failed, RunOutcome::CycleDetected { step_id: step_id.to_string() });
                self.persist(&run).await?;
                return Ok(run);
            }

            tracing::info!("📍 Step {}: executing '{}' (type: {})", run.step_logs.len() + 1, step.id, step.step_type);

            let start_time = Utc::now();
            let result = self.executor.execute_step(step, &current_data, &outputs, user_id).await;
            let end_time = Utc::now();

            let (status, output) = match &result {
                StepOutcome::Success(value) => (StepStatus::Success, value.clone()),
                StepOutcome::Failure(message) => (StepStatus::Error, Value::String(message.clone())),
            };
            run.step_logs.push(StepLogEntry {
                step_id: step.id.clone(),
                step_type: step.step_type.clone(),
                status,
                input: current_data.clone(),
                output,
                start_time,
                end_time,
            });

            match result {
                StepOutcome::Failure(message) => {
                    tracing::error!("❌ Run {} failed at step '{}': {}", run.id, step.id, message);
                    run.finish(RunStatus::Failed, RunOutcome::StepFailed { step_id: step.id.clone() });
                    self.persist(&run).await?;
                    return Ok(run);
                }
                StepOutcome::Success(value) => {
                    self.persist(&run).await?;
                    outputs.insert(step.id.clone(), value.clone());
                    current_data = value;
                    current_id = self.strategy.next(&graph, step_id);
                }
            }
        }

        run.finish(RunStatus::Completed, outcome);
        self.persist(&run).await?;

        tracing::info!("🎉 Run {} of workflow '{}' completed: {} steps in {:?}",
            run.id, workflow.id, run.step_logs.len(), workflow_start_time.elapsed());
        Ok(run)
    }

    async fn persist(&self, run: &Run) -> Result<()> {
        self.runs.save(run).await.map_err(|e| {
            tracing::error!("❌ Failed to persist run {}: {}", run.id, e);
            e
        })
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("executor", &self.executor)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Wire type tag of the step that starts runs of `trigger`
fn trigger_step_type(trigger: TriggerKind) -> &'static str {
    match trigger {
        TriggerKind::Manual => "manualTrigger",
        TriggerKind::Webhook => "webhookTrigger",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::Link;

    fn link(source: &str, target: &str) -> Link {
        Link { id: format!("{source}-{target}"), source: source.into(), target: target.into(), extra: Default::default() }
    }

    fn step(id: &str) -> Step {
        Step { id: id.into(), step_type: "code".into(), data: Value::Null, position: None }
    }

    #[test]
    fn linear_chain_follows_first_declared_link() {
        let graph = StepGraph::build(
            &[step("a"), step("b"), step("c")],
            &[link("a", "c"), link("a", "b")],
        );
        assert_eq!(TraversalStrategy::LinearChain.next(&graph, "a"), Some("c"));
        assert_eq!(TraversalStrategy::LinearChain.next(&graph, "c"), None);
    }
}
