//! The `6-finalize` review loop
//!
//! Each round asks a [`FindingSource`] for findings and triages them with the
//! finding's own domain policy. Fix-required findings become fix tasks, added
//! through the `task-store.add` operation and run in a mini execute cycle.
//! A failed fix cycle counts against the finalize cap, and its open tasks are
//! re-run before the next review. A clean review completes the plan only
//! when every task is done.

use planwright_store::{Task, TaskMode, TaskStatus, Verification, dispatch_address};
use planwright_utils::error::{IssueKind, PlanError, StoreError, ValidationError, ValidationIssue};
use planwright_utils::types::{LogLevel, PhaseId};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PlanCompletion, PlanOrchestrator, REVIEW_CLEAN};
use crate::executor::{FindingSource, ReviewRequest};
use crate::resolver::{Finding, TriageDecision};

const TASK_ADD: &str = "task-store.add";

/// Result of a finalize loop that reached COMPLETE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSummary {
    /// Reviews run by this call, including the clean one
    pub reviews: u32,
    pub fix_tasks: Vec<u32>,
    /// Annotations applied instead of fixes
    pub suppressed: Vec<String>,
    pub accepted: usize,
    pub completion: PlanCompletion,
}

impl PlanOrchestrator {
    /// Review, fix and re-review until clean or the finalize cap blocks the plan.
    ///
    /// # Errors
    ///
    /// - `ExecutionError::IterationCapReached` once the cap is hit
    /// - `ResolutionError` for a finding in an unconfigured domain
    /// - `ValidationError` when a fix task cannot be given skills
    pub async fn finalize(&self, reviewer: &dyn FindingSource) -> Result<FinalizeSummary, PlanError> {
        let phase = PhaseId::Finalize;
        let cap = self.config().finalize_max_iterations();
        let mut reviews = 0;
        let mut fix_tasks = Vec::new();
        let mut suppressed = Vec::new();
        let mut accepted = 0;

        loop {
            let status = self.require_phase(phase)?;
            let attempt = status.phase(phase).map_or(0, |p| p.iteration_count) + 1;
            let tasks = self.store().read_tasks()?;

            if tasks.iter().any(|t| t.status != TaskStatus::Done) {
                self.retry_open_tasks(phase, cap, attempt).await?;
                continue;
            }
            reviews += 1;

            let findings = reviewer.review(self.review_request(attempt, tasks)?).await?;
            let mut fixes: Vec<Finding> = Vec::new();
            for finding in findings {
                match self.resolver().triage(&finding)? {
                    TriageDecision::Fix => fixes.push(finding),
                    TriageDecision::Suppress { annotation } => {
                        self.log(
                            LogLevel::Info,
                            phase,
                            format!("triage: suppress {} with {annotation}", finding.summary()),
                        )?;
                        suppressed.push(annotation);
                    }
                    TriageDecision::Accept => {
                        self.log(
                            LogLevel::Info,
                            phase,
                            format!("triage: accept {}", finding.summary()),
                        )?;
                        accepted += 1;
                    }
                }
            }

            if fixes.is_empty() {
                self.log(LogLevel::Info, phase, REVIEW_CLEAN)?;
                let transition = self.advance()?;
                let Some(completion) = transition.completion else {
                    return Err(StoreError::UnsupportedOperation {
                        operation: format!("finalize ended at {}", transition.to),
                    }
                    .into());
                };
                info!(plan_id = %completion.plan_id, reviews, "finalize complete");
                return Ok(FinalizeSummary {
                    reviews,
                    fix_tasks,
                    suppressed,
                    accepted,
                    completion,
                });
            }

            let failing: Vec<String> = fixes.iter().map(Finding::summary).collect();
            self.log(
                LogLevel::Error,
                phase,
                format!("review: {} fix-required finding(s)", fixes.len()),
            )?;
            self.record_failed_round(phase, cap, &failing)?;

            for finding in &fixes {
                fix_tasks.push(self.add_fix_task(finding)?);
            }
            self.fix_cycle(phase, cap, attempt).await?;
        }
    }

    /// Run the open fix tasks once. A failing cycle is a failed round.
    async fn fix_cycle(&self, phase: PhaseId, cap: u32, attempt: u32) -> Result<(), PlanError> {
        let round = self.run_round(phase, attempt).await?;
        if round.failing.is_empty() {
            self.log(
                LogLevel::Info,
                phase,
                format!("fix cycle: {} task(s) verified", round.done.len()),
            )?;
            return Ok(());
        }
        self.log(
            LogLevel::Error,
            phase,
            format!("fix cycle failed: {}", round.failing.join("; ")),
        )?;
        self.record_failed_round(phase, cap, &round.failing)?;
        Ok(())
    }

    /// Tasks left open by an earlier fix cycle run again before any review.
    async fn retry_open_tasks(&self, phase: PhaseId, cap: u32, attempt: u32) -> Result<(), PlanError> {
        info!(plan_id = %self.plan_id(), attempt, "retrying open fix tasks before review");
        self.fix_cycle(phase, cap, attempt).await
    }

    fn review_request(&self, iteration: u32, tasks: Vec<Task>) -> Result<ReviewRequest, PlanError> {
        let mut domains: Vec<&str> = tasks.iter().map(|t| t.domain.as_str()).collect();
        domains.sort_unstable();
        domains.dedup();
        let workflow_skills = domains
            .into_iter()
            .map(|d| {
                self.resolver()
                    .resolve(d, PhaseId::Finalize)
                    .map(|s| (d.to_string(), s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReviewRequest {
            plan_id: self.plan_id().to_string(),
            workflow_skills,
            iteration,
            tasks,
        })
    }

    /// Build a fix task and add it through the operation surface.
    ///
    /// Skills, profile and deliverable refs are frozen from the originating
    /// task, else from the first task of the finding's domain.
    fn add_fix_task(&self, finding: &Finding) -> Result<u32, PlanError> {
        let tasks = self.store().read_tasks()?;
        let origin = finding
            .task_id
            .and_then(|id| tasks.iter().find(|t| t.id == id))
            .or_else(|| tasks.iter().find(|t| t.domain == finding.domain));
        let Some(origin) = origin else {
            return Err(ValidationError::single(
                "tasks",
                ValidationIssue::new(
                    format!("finding {}", finding.rule),
                    "skills",
                    IssueKind::EmptySkills,
                    format!("no task in domain '{}' to take skills from", finding.domain),
                ),
            )
            .into());
        };

        let mut steps = vec![finding.summary()];
        if let Some(file) = &finding.file {
            steps.push(file.clone());
        }
        let task = Task {
            id: 0,
            title: format!("Fix {}: {}", finding.rule, finding.message),
            deliverable_refs: origin.deliverable_refs.clone(),
            domain: origin.domain.clone(),
            profile: origin.profile.clone(),
            execution_mode: TaskMode::Automated,
            skills: origin.skills.clone(),
            depends_on: vec![origin.id],
            steps,
            verification: Verification {
                commands: origin.verification.commands.clone(),
                criteria: Vec::new(),
            },
            status: TaskStatus::Pending,
        };

        let args = serde_json::to_value(&task).map_err(|e| StoreError::InvalidArguments {
            operation: TASK_ADD.to_string(),
            reason: e.to_string(),
        })?;
        let envelope = dispatch_address(self.store(), TASK_ADD, args);
        if !envelope.is_ok() {
            return Err(StoreError::InvalidArguments {
                operation: TASK_ADD.to_string(),
                reason: envelope.message,
            }
            .into());
        }
        let id = envelope
            .payload
            .as_ref()
            .and_then(|p| p.get("id"))
            .and_then(serde_json::Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| StoreError::InvalidArguments {
                operation: TASK_ADD.to_string(),
                reason: "response carried no task id".to_string(),
            })?;
        info!(plan_id = %self.plan_id(), task_id = id, rule = %finding.rule, "fix task added");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use planwright_store::ArtifactStore;
    use planwright_utils::error::{ExecutionError, PhaseError};
    use planwright_utils::paths::with_isolated_home;
    use planwright_utils::types::{CurrentPhase, PhaseStatus};
    use std::sync::atomic::Ordering;

    async fn at_finalize(orch: &PlanOrchestrator) {
        planned(orch);
        orch.execute().await.unwrap();
        orch.advance().unwrap();
    }

    fn npe(task: u32) -> Finding {
        Finding::new("java", "NullCheck", "error", "possible NPE")
            .in_file("src/main/java/Login.java")
            .from_task(task)
    }

    #[tokio::test]
    async fn test_clean_review_completes_and_archives() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        at_finalize(&orch).await;

        let reviewer = QueuedReviewer::new(vec![vec![
            Finding::new("java", "Style", "info", "long line"),
            Finding::new("java", "unchecked", "warning", "raw type"),
        ]]);
        let summary = orch.finalize(&reviewer).await.unwrap();

        assert_eq!(summary.reviews, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.suppressed, vec!["@SuppressWarnings(\"unchecked\")"]);
        assert!(summary.fix_tasks.is_empty());
        assert_eq!(summary.completion.plan_id, "demo");
        assert_eq!(summary.completion.tasks, 2);
        assert!(summary.completion.archived_to.join("status.json").exists());

        // the archived plan stays readable, and is complete
        assert!(orch.store().is_archived());
        assert_eq!(orch.status().unwrap().current_phase, CurrentPhase::Complete);
        assert!(matches!(
            orch.advance(),
            Err(PlanError::Phase(PhaseError::AlreadyComplete { .. }))
        ));
    }

    #[tokio::test]
    async fn test_fix_findings_become_tasks() {
        let guard = with_isolated_home();
        let executor = ScriptedExecutor::passing();
        let orch = orchestrator(&guard, executor.clone());
        at_finalize(&orch).await;

        let reviewer = QueuedReviewer::new(vec![vec![npe(1)]]);
        let summary = orch.finalize(&reviewer).await.unwrap();

        assert_eq!(summary.reviews, 2);
        assert_eq!(summary.fix_tasks, vec![3]);
        assert_eq!(executor.calls(), 3);

        // the archived plan is gone from plans/
        let reopened = ArtifactStore::open_read_only(&guard.home(), "demo").unwrap();
        assert!(!reopened.exists());
        assert!(orch.store().read_log().unwrap().iter().any(|e| e.message == "task-store.add"));
        let fix = orch.store().get_task(3).unwrap();
        assert_eq!(fix.skills, vec!["java-core"]);
        assert_eq!(fix.depends_on, vec![1]);
        assert_eq!(fix.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_three_fix_rounds_block() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        at_finalize(&orch).await;

        let reviewer = QueuedReviewer::new(vec![vec![npe(1)], vec![npe(1)], vec![npe(2)], vec![]]);
        let err = orch.finalize(&reviewer).await.unwrap_err();
        assert!(matches!(
            err,
            PlanError::Execution(ExecutionError::IterationCapReached { iterations: 3, .. })
        ));
        assert_eq!(reviewer.reviews.load(Ordering::SeqCst), 3);

        let status = orch.status().unwrap();
        assert_eq!(
            status.phase(PhaseId::Finalize).unwrap().status,
            PhaseStatus::Blocked
        );
        assert_eq!(
            status.blocked.unwrap().failing,
            vec!["NullCheck: possible NPE (src/main/java/Login.java)".to_string()]
        );
        assert_eq!(status.current_phase, CurrentPhase::Active(PhaseId::Finalize));
    }

    #[tokio::test]
    async fn test_failing_fix_task_never_completes_the_plan() {
        let guard = with_isolated_home();
        let executor = ScriptedExecutor::failing(3, u32::MAX);
        let orch = orchestrator(&guard, executor.clone());
        at_finalize(&orch).await;

        // the second review would be clean, but task 3 never passes
        let reviewer = QueuedReviewer::new(vec![vec![npe(1)], vec![]]);
        let err = orch.finalize(&reviewer).await.unwrap_err();
        assert!(matches!(
            err,
            PlanError::Execution(ExecutionError::IterationCapReached { iterations: 3, .. })
        ));
        assert_eq!(reviewer.reviews.load(Ordering::SeqCst), 1);

        let status = orch.status().unwrap();
        assert_eq!(status.current_phase, CurrentPhase::Active(PhaseId::Finalize));
        assert_eq!(
            status.blocked.unwrap().failing,
            vec!["task 3: mvn -q test exited 1".to_string()]
        );
        assert!(!orch.store().is_archived());
        assert_ne!(orch.store().get_task(3).unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_failed_fix_cycle_is_retried_before_next_review() {
        let guard = with_isolated_home();
        let executor = ScriptedExecutor::failing(3, 1);
        let orch = orchestrator(&guard, executor.clone());
        at_finalize(&orch).await;

        let reviewer = QueuedReviewer::new(vec![vec![npe(1)]]);
        let summary = orch.finalize(&reviewer).await.unwrap();

        assert_eq!(summary.reviews, 2);
        assert_eq!(summary.fix_tasks, vec![3]);
        // tasks 1 and 2 once each, task 3 failed once then passed
        assert_eq!(executor.calls(), 4);
        assert_eq!(orch.store().get_task(3).unwrap().status, TaskStatus::Done);
        assert_eq!(orch.status().unwrap().current_phase, CurrentPhase::Complete);
        assert!(
            orch.store()
                .read_log()
                .unwrap()
                .iter()
                .any(|e| e.message.starts_with("fix cycle failed: task 3"))
        );
    }

    #[tokio::test]
    async fn test_clean_review_with_open_task_cannot_leave_finalize() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        at_finalize(&orch).await;

        let mut open = orch.store().get_task(1).unwrap();
        open.status = TaskStatus::Failed;
        open.depends_on = vec![1];
        orch.store().add_task(open).unwrap();
        orch.log(LogLevel::Info, PhaseId::Finalize, REVIEW_CLEAN).unwrap();

        assert!(matches!(
            orch.advance(),
            Err(PlanError::Phase(PhaseError::ArtifactInvalid { .. }))
        ));
        assert_eq!(
            orch.status().unwrap().current_phase,
            CurrentPhase::Active(PhaseId::Finalize)
        );
    }

    #[tokio::test]
    async fn test_unconfigured_finding_domain_is_fatal() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        at_finalize(&orch).await;

        let reviewer = QueuedReviewer::new(vec![vec![Finding::new("go", "vet", "error", "x")]]);
        assert!(matches!(
            orch.finalize(&reviewer).await,
            Err(PlanError::Resolution(_))
        ));
    }
}
