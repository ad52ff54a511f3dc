//! Delegation seams for task execution and review
//!
//! The engine never runs code or tools itself. A [`SkillExecutor`] carries a
//! task to the resolved workflow skill and reports its verification result; a
//! [`FindingSource`] reviews finished work during finalize.

use async_trait::async_trait;
use planwright_store::Task;
use planwright_utils::error::ExecutionError;
use serde::{Deserialize, Serialize};

use crate::resolver::Finding;

/// One task handed to a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub plan_id: String,
    /// Workflow skill resolved for the task's domain and phase
    pub workflow_skill: String,
    /// 1-based attempt number within the phase loop
    pub iteration: u32,
    pub task: Task,
}

/// Verification result for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: u32,
    /// Verification commands or criteria that did not pass; empty on success
    pub failing: Vec<String>,
}

impl TaskOutcome {
    #[must_use]
    pub const fn passed(task_id: u32) -> Self {
        Self {
            task_id,
            failing: Vec::new(),
        }
    }

    #[must_use]
    pub fn failed(task_id: u32, failing: Vec<String>) -> Self {
        Self { task_id, failing }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failing.is_empty()
    }
}

/// What a reviewer is asked to look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub plan_id: String,
    /// Workflow skill resolved for `6-finalize`, per reviewed domain
    pub workflow_skills: Vec<(String, String)>,
    pub iteration: u32,
    pub tasks: Vec<Task>,
}

/// Carries a task to its skill and runs its verification.
#[async_trait]
pub trait SkillExecutor: Send + Sync {
    /// Run one task.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Delegation` when the skill could not be
    /// reached at all. A task that ran but failed verification is an `Ok`
    /// outcome with failing entries.
    async fn run(&self, request: TaskRequest) -> Result<TaskOutcome, ExecutionError>;
}

/// Produces review findings for finished work.
#[async_trait]
pub trait FindingSource: Send + Sync {
    /// Review the plan's tasks.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` when the review itself could not run.
    async fn review(&self, request: ReviewRequest) -> Result<Vec<Finding>, ExecutionError>;
}
