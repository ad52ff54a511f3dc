//! The `5-execute` verification loop
//!
//! Tasks run batch by batch in dependency order; members of a batch run
//! concurrently. When any task in a batch fails, the rest of that batch still
//! finishes but no later batch starts. Each failed round counts against the
//! execute cap, and a retry only re-runs tasks that are not done.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use planwright_store::{Task, TaskStatus};
use planwright_utils::error::{ExecutionError, PlanError};
use planwright_utils::logging::log_batch;
use planwright_utils::types::{LogLevel, PhaseId};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{Instrument, info, warn};

use super::PlanOrchestrator;
use crate::executor::{TaskOutcome, TaskRequest};
use crate::optimizer::task_graph;

/// Result of a successful execute loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    /// Verification rounds run by this call, including the passing one
    pub rounds: u32,
    pub tasks_done: usize,
}

/// Outcome of one pass over the batches.
#[derive(Debug, Default)]
pub(super) struct Round {
    pub done: Vec<u32>,
    pub failing: Vec<String>,
}

impl PlanOrchestrator {
    /// Run every open task until all pass or the execute cap blocks the plan.
    ///
    /// # Errors
    ///
    /// - `ExecutionError::IterationCapReached` once the cap is hit; the plan
    ///   is then blocked with the failing criteria recorded
    /// - `ResolutionError` when a task's domain has no `5-execute` skill;
    ///   nothing runs in that case
    pub async fn execute(&self) -> Result<ExecuteSummary, PlanError> {
        let phase = PhaseId::Execute;
        let cap = self.config().execute_max_iterations();
        let mut rounds = 0;

        loop {
            let status = self.require_phase(phase)?;
            let attempt = status.phase(phase).map_or(0, |p| p.iteration_count) + 1;
            rounds += 1;

            let round = self
                .run_round(phase, attempt)
                .instrument(planwright_utils::logging::plan_span(
                    self.plan_id(),
                    phase.as_str(),
                ))
                .await?;

            if round.failing.is_empty() {
                let tasks_done = self
                    .store()
                    .read_tasks()?
                    .iter()
                    .filter(|t| t.status == TaskStatus::Done)
                    .count();
                self.log(
                    LogLevel::Info,
                    phase,
                    format!("execute: all tasks verified after {rounds} round(s)"),
                )?;
                info!(plan_id = %self.plan_id(), rounds, tasks_done, "execute verified");
                return Ok(ExecuteSummary { rounds, tasks_done });
            }

            self.record_failed_round(phase, cap, &round.failing)?;
        }
    }

    /// One pass over the task batches, skipping tasks already done.
    pub(super) async fn run_round(&self, phase: PhaseId, attempt: u32) -> Result<Round, PlanError> {
        let tasks = self.store().read_tasks()?;
        let batches = task_graph(&tasks).parallel_batches()?;
        let by_id: BTreeMap<u32, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

        // Resolve every skill before anything runs.
        let mut skills: BTreeMap<u32, String> = BTreeMap::new();
        for task in tasks.iter().filter(|t| t.status != TaskStatus::Done) {
            let skill = self.resolver().resolve(&task.domain, PhaseId::Execute)?;
            skills.insert(task.id, skill.to_string());
        }

        let mut round = Round::default();
        for (index, batch) in batches.iter().enumerate() {
            let open: Vec<&Task> = batch
                .iter()
                .filter_map(|id| by_id.get(id).copied())
                .filter(|t| t.status != TaskStatus::Done)
                .collect();
            if open.is_empty() {
                continue;
            }
            let ids: Vec<u32> = open.iter().map(|t| t.id).collect();
            log_batch(self.plan_id(), phase, index + 1, &ids);

            let mut set = JoinSet::new();
            let mut spawned: HashMap<tokio::task::Id, u32> = HashMap::new();
            for task in open {
                self.store()
                    .update_task_status(task.id, TaskStatus::InProgress)?;
                let request = TaskRequest {
                    plan_id: self.plan_id().to_string(),
                    workflow_skill: skills.get(&task.id).cloned().unwrap_or_default(),
                    iteration: attempt,
                    task: task.clone(),
                };
                let executor = Arc::clone(&self.executor);
                let handle = set.spawn(async move { executor.run(request).await });
                spawned.insert(handle.id(), task.id);
            }

            while let Some(joined) = set.join_next_with_id().await {
                let (task_id, outcome) = match joined {
                    Ok((id, result)) => (spawned.get(&id).copied().unwrap_or_default(), result),
                    Err(join_error) => {
                        let task_id = spawned.get(&join_error.id()).copied().unwrap_or_default();
                        (
                            task_id,
                            Err(ExecutionError::WorkerAborted {
                                reason: join_error.to_string(),
                            }),
                        )
                    }
                };
                self.settle(phase, task_id, outcome, &mut round)?;
            }

            if !round.failing.is_empty() {
                warn!(
                    plan_id = %self.plan_id(),
                    batch = index + 1,
                    failing = round.failing.len(),
                    "batch failed; later batches not started"
                );
                break;
            }
        }
        Ok(round)
    }

    /// Persist one task's result.
    fn settle(
        &self,
        phase: PhaseId,
        task_id: u32,
        outcome: Result<TaskOutcome, ExecutionError>,
        round: &mut Round,
    ) -> Result<(), PlanError> {
        match outcome {
            Ok(outcome) if outcome.is_success() => {
                self.store().update_task_status(task_id, TaskStatus::Done)?;
                self.log(LogLevel::Info, phase, format!("task {task_id}: verified"))?;
                round.done.push(task_id);
            }
            Ok(outcome) => {
                self.store().update_task_status(task_id, TaskStatus::Failed)?;
                let err = ExecutionError::VerificationFailed {
                    task_id,
                    failing: outcome.failing.clone(),
                };
                self.log(LogLevel::Error, phase, err.to_string())?;
                round
                    .failing
                    .extend(outcome.failing.iter().map(|f| format!("task {task_id}: {f}")));
            }
            Err(err) => {
                self.store().update_task_status(task_id, TaskStatus::Failed)?;
                self.log(LogLevel::Error, phase, err.to_string())?;
                round.failing.push(format!("task {task_id}: {err}"));
            }
        }
        Ok(())
    }
}
