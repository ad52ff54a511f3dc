//! Phase state machine for a single plan
//!
//! [`PlanOrchestrator`] walks a plan through
//! `1-init → 2-refine → 3-outline → 4-plan → 5-execute → 6-finalize → COMPLETE`.
//!
//! - Every operation reloads `status.json` through the store; no plan state is
//!   cached between calls.
//! - A phase operation only runs while the plan sits in that phase.
//! - [`advance`](PlanOrchestrator::advance) audits the plan directory, checks the
//!   outgoing phase's artifacts, writes status and the work log, and only then
//!   reports the new phase.
//! - `5-execute` and `6-finalize` re-enter up to their configured caps, then
//!   the plan is blocked until [`unblock`](PlanOrchestrator::unblock).

mod execute;
mod finalize;
mod gates;

pub use execute::ExecuteSummary;
pub use finalize::FinalizeSummary;

use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use planwright_config::Config;
use planwright_store::{
    ArtifactStore, Deliverable, LogEntry, OutlineDocument, Task, TaskStatus,
};
use planwright_utils::error::{PhaseError, PlanError, StoreError};
use planwright_utils::logging::{log_blocked, log_phase_error, log_transition, plan_span};
use planwright_utils::types::{
    BlockedReport, CurrentPhase, LogCategory, LogLevel, PhaseId, PhaseState, PhaseStatus,
    PlanStatus,
};
use planwright_validation::{DeliverableCandidate, DeliverableValidator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::executor::SkillExecutor;
use crate::optimizer::{TaskOptimizer, deliverable_graph};
use crate::resolver::DomainResolver;

/// Work-log message that marks a refine step as recorded.
pub const REFINE_LOG_PREFIX: &str = "refine:";
/// Work-log message written when a review needs no code changes.
pub const REVIEW_CLEAN: &str = "review: no fix-required findings";
const REVIEW_LOG_PREFIX: &str = "review:";

/// Emitted once when a plan reaches COMPLETE. Downstream integrations
/// (commits, pull requests) start from this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCompletion {
    pub plan_id: String,
    pub completed_at: DateTime<Utc>,
    pub archived_to: Utf8PathBuf,
    pub deliverables: usize,
    pub tasks: usize,
}

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: PhaseId,
    pub to: CurrentPhase,
    pub completion: Option<PlanCompletion>,
}

/// The external decision that releases a blocked plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnblockDecision {
    /// Who decided, e.g. a reviewer's handle
    pub decided_by: String,
    pub note: String,
}

/// User-facing view of a plan's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    pub plan_id: String,
    pub current_phase: CurrentPhase,
    pub phases: Vec<PhaseState>,
    pub tasks_total: usize,
    pub tasks_done: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<BlockedReport>,
}

impl std::fmt::Display for PlanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.blocked {
            Some(report) => write!(
                f,
                "Plan '{}' is blocked at {} after {} iteration(s); failing: {}",
                self.plan_id,
                report.phase,
                report.iteration_count,
                report.failing.join("; ")
            ),
            None => write!(
                f,
                "Plan '{}' is at {} ({}/{} tasks done)",
                self.plan_id, self.current_phase, self.tasks_done, self.tasks_total
            ),
        }
    }
}

/// Drives one plan through its phases.
///
/// Owns the store handle; the store serialises every write and, when opened
/// writable, holds the plan's cross-process lock.
pub struct PlanOrchestrator {
    store: Arc<ArtifactStore>,
    config: Config,
    resolver: DomainResolver,
    executor: Arc<dyn SkillExecutor>,
}

impl std::fmt::Debug for PlanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanOrchestrator")
            .field("plan_id", &self.store.plan_id())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl PlanOrchestrator {
    /// Orchestrator with a resolver built from `config`.
    #[must_use]
    pub fn new(store: Arc<ArtifactStore>, config: Config, executor: Arc<dyn SkillExecutor>) -> Self {
        let resolver = DomainResolver::from_config(&config);
        Self {
            store,
            config,
            resolver,
            executor,
        }
    }

    /// Replace the resolver, e.g. one with custom domain extensions.
    #[must_use]
    pub fn with_resolver(mut self, resolver: DomainResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn plan_id(&self) -> &str {
        self.store.plan_id()
    }

    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn resolver(&self) -> &DomainResolver {
        &self.resolver
    }

    /// Fresh copy of the status record.
    pub fn status(&self) -> Result<PlanStatus, PlanError> {
        self.store.read_status()
    }

    /// Reload status and require the plan to be active in `expected`.
    ///
    /// # Errors
    ///
    /// - `PhaseError::AlreadyComplete` after COMPLETE
    /// - `PhaseError::Blocked` while an iteration cap holds the plan
    /// - `PhaseError::InvalidTransition` for any other phase
    pub fn require_phase(&self, expected: PhaseId) -> Result<PlanStatus, PlanError> {
        let status = self.store.read_status()?;
        let current = match status.current_phase {
            CurrentPhase::Complete => {
                return Err(PhaseError::AlreadyComplete {
                    plan_id: status.plan_id,
                }
                .into());
            }
            CurrentPhase::Active(phase) => phase,
        };
        if let Some(report) = &status.blocked {
            return Err(PhaseError::Blocked {
                phase: report.phase.to_string(),
                iteration_count: report.iteration_count,
                failing: report.failing.clone(),
            }
            .into());
        }
        if current != expected {
            return Err(PhaseError::InvalidTransition {
                from: current.to_string(),
                to: expected.to_string(),
            }
            .into());
        }
        Ok(status)
    }

    pub(crate) fn log(&self, level: LogLevel, phase: PhaseId, message: impl Into<String>) -> Result<(), PlanError> {
        let entry = LogEntry::new(level, LogCategory::Work, CurrentPhase::Active(phase), message);
        self.store.append_log(&entry)
    }

    /// Run a phase operation inside its span, logging failures.
    fn traced<T>(&self, phase: PhaseId, op: impl FnOnce() -> Result<T, PlanError>) -> Result<T, PlanError> {
        let span = plan_span(self.plan_id(), phase.as_str());
        let _enter = span.enter();
        op().inspect_err(|e| log_phase_error(self.plan_id(), phase.as_str(), &e.to_string()))
    }

    // ---------------------------------------------------------------------
    // phase operations
    // ---------------------------------------------------------------------

    /// Create the plan at `1-init` from an opaque request.
    pub fn init(&self, request: &str) -> Result<PlanStatus, PlanError> {
        self.traced(PhaseId::Init, || {
            if self.store.exists() {
                return Err(StoreError::AlreadyExists {
                    plan_id: self.plan_id().to_string(),
                }
                .into());
            }
            gates::require_text(PhaseId::Init, planwright_store::REQUEST_FILE, request)?;

            let status = PlanStatus::fresh(self.plan_id(), Utc::now());
            self.store.write_status(&status)?;
            self.store.write_request(request)?;
            self.log(LogLevel::Info, PhaseId::Init, "plan initialized")?;
            info!(plan_id = %self.plan_id(), "plan initialized");
            Ok(status)
        })
    }

    /// Replace the request with its refined form.
    pub fn refine(&self, refined: &str) -> Result<(), PlanError> {
        self.traced(PhaseId::Refine, || {
            self.require_phase(PhaseId::Refine)?;
            gates::require_text(PhaseId::Refine, planwright_store::REQUEST_FILE, refined)?;
            self.store.write_request(refined)?;
            self.log(
                LogLevel::Info,
                PhaseId::Refine,
                format!("{REFINE_LOG_PREFIX} request refined ({} bytes)", refined.len()),
            )
        })
    }

    /// Validate candidates, graph them and persist the outline.
    ///
    /// Nothing is written unless every check passes. Without a narrative, the
    /// outline document is rendered from the deliverables.
    pub fn outline(
        &self,
        candidates: &[DeliverableCandidate],
        narrative: Option<&str>,
    ) -> Result<Vec<Deliverable>, PlanError> {
        self.traced(PhaseId::Outline, || {
            self.require_phase(PhaseId::Outline)?;

            let deliverables = DeliverableValidator::new(&self.config).validate(candidates)?;
            deliverable_graph(&deliverables).validate()?;

            let document = match narrative {
                Some(text) => OutlineDocument::parse(text),
                None => {
                    let request = self.store.read_request()?;
                    let title = request
                        .lines()
                        .map(str::trim)
                        .find(|l| !l.is_empty())
                        .unwrap_or("Solution outline")
                        .trim_start_matches('#')
                        .trim();
                    OutlineDocument::render(title, &deliverables)
                }
            };
            document.check_consistency(&deliverables)?;

            let guidance = self
                .resolver
                .outline_guidance(deliverables.iter().map(|d| d.domain.as_str()))?;
            for g in &guidance {
                debug!(
                    plan_id = %self.plan_id(),
                    domain = %g.domain,
                    priority = g.priority,
                    skill = ?g.analysis.skill,
                    "outline guidance"
                );
            }

            self.store.write_deliverables(&deliverables)?;
            self.store.write_outline(&document.text)?;
            self.log(
                LogLevel::Info,
                PhaseId::Outline,
                format!("outline: {} deliverable(s) accepted", deliverables.len()),
            )?;
            Ok(deliverables)
        })
    }

    /// Compile the persisted deliverables into tasks.
    pub fn plan(&self) -> Result<Vec<Task>, PlanError> {
        self.traced(PhaseId::Plan, || {
            self.require_phase(PhaseId::Plan)?;
            let deliverables = self.store.read_deliverables()?;
            let tasks = TaskOptimizer::new(&self.config, &self.resolver).optimize(&deliverables)?;
            self.store.write_tasks(&tasks)?;
            self.log(
                LogLevel::Info,
                PhaseId::Plan,
                format!(
                    "plan: {} task(s) from {} deliverable(s)",
                    tasks.len(),
                    deliverables.len()
                ),
            )?;
            Ok(tasks)
        })
    }

    // ---------------------------------------------------------------------
    // transitions
    // ---------------------------------------------------------------------

    /// Leave the current phase.
    ///
    /// Order: compliance audit, outgoing artifact checks, status and log
    /// writes, then the new phase is returned. Leaving `6-finalize` reaches
    /// COMPLETE and archives the plan.
    pub fn advance(&self) -> Result<Transition, PlanError> {
        let status = self.store.read_status()?;
        let from = match status.current_phase {
            CurrentPhase::Complete => {
                return Err(PhaseError::AlreadyComplete {
                    plan_id: status.plan_id,
                }
                .into());
            }
            CurrentPhase::Active(phase) => phase,
        };
        self.traced(from, || {
            let mut status = self.require_phase(from)?;
            self.store.audit()?;
            gates::check_exit(self, from)?;

            let to = from.next().map_or(CurrentPhase::Complete, CurrentPhase::Active);
            set_phase_status(&mut status, from, PhaseStatus::Done);
            if let CurrentPhase::Active(next) = to {
                set_phase_status(&mut status, next, PhaseStatus::InProgress);
            }
            status.current_phase = to;
            status.updated_at = Utc::now();
            self.store.write_status(&status)?;
            self.log(LogLevel::Info, from, format!("transition: {from} -> {to}"))?;
            log_transition(self.plan_id(), from.as_str(), &to.to_string());

            let completion = if to == CurrentPhase::Complete {
                Some(self.complete()?)
            } else {
                None
            };
            Ok(Transition {
                from,
                to,
                completion,
            })
        })
    }

    fn complete(&self) -> Result<PlanCompletion, PlanError> {
        let deliverables = self.store.read_deliverables()?.len();
        let tasks = self.store.read_tasks()?.len();
        let archived_to = self.store.archive()?;
        info!(plan_id = %self.plan_id(), archive = %archived_to, "plan complete");
        Ok(PlanCompletion {
            plan_id: self.plan_id().to_string(),
            completed_at: Utc::now(),
            archived_to,
            deliverables,
            tasks,
        })
    }

    /// Count a failed round for a re-entrant phase; block at the cap.
    ///
    /// Returns the new iteration count.
    pub(crate) fn record_failed_round(
        &self,
        phase: PhaseId,
        cap: u32,
        failing: &[String],
    ) -> Result<u32, PlanError> {
        let mut status = self.require_phase(phase)?;
        let count = status
            .phase(phase)
            .map_or(0, |p| p.iteration_count)
            .saturating_add(1);
        if let Some(state) = status.phase_mut(phase) {
            state.iteration_count = count;
        }
        self.log(
            LogLevel::Error,
            phase,
            format!("{phase}: round {count} of {cap} failed: {}", failing.join("; ")),
        )?;

        if count >= cap {
            let report = BlockedReport {
                phase,
                iteration_count: count,
                failing: failing.to_vec(),
            };
            set_phase_status(&mut status, phase, PhaseStatus::Blocked);
            status.blocked = Some(report.clone());
            status.updated_at = Utc::now();
            self.store.write_status(&status)?;
            self.log(
                LogLevel::Error,
                phase,
                format!("blocked: {phase} reached its cap of {cap}; awaiting decision"),
            )?;
            log_blocked(self.plan_id(), &report);
            return Err(planwright_utils::error::ExecutionError::IterationCapReached {
                phase: phase.to_string(),
                iterations: count,
                failing: failing.to_vec(),
            }
            .into());
        }

        status.updated_at = Utc::now();
        self.store.write_status(&status)?;
        Ok(count)
    }

    /// Release a blocked plan: the blocked phase resumes with a zero count.
    pub fn unblock(&self, decision: &UnblockDecision) -> Result<PlanStatus, PlanError> {
        let mut status = self.store.read_status()?;
        let Some(report) = status.blocked.take() else {
            return Err(PhaseError::WrongPhase {
                expected: "blocked".to_string(),
                actual: status.current_phase.to_string(),
            }
            .into());
        };
        if let Some(state) = status.phase_mut(report.phase) {
            state.status = PhaseStatus::InProgress;
            state.iteration_count = 0;
        }
        status.updated_at = Utc::now();
        self.store.write_status(&status)?;
        self.log(
            LogLevel::Info,
            report.phase,
            format!(
                "unblocked by {}: {} (was blocked after {} iteration(s))",
                decision.decided_by, decision.note, report.iteration_count
            ),
        )?;
        info!(plan_id = %self.plan_id(), phase = %report.phase, decided_by = %decision.decided_by, "plan unblocked");
        Ok(status)
    }

    /// Phase, progress and, for a blocked plan, the failing criteria.
    pub fn report(&self) -> Result<PlanReport, PlanError> {
        let status = self.store.read_status()?;
        let tasks = self.store.read_tasks()?;
        Ok(PlanReport {
            plan_id: status.plan_id,
            current_phase: status.current_phase,
            phases: status.phases,
            tasks_total: tasks.len(),
            tasks_done: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
            blocked: status.blocked,
        })
    }
}

fn set_phase_status(status: &mut PlanStatus, phase: PhaseId, value: PhaseStatus) {
    if let Some(state) = status.phase_mut(phase) {
        state.status = value;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the orchestrator tests.

    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use planwright_store::{ProfileSkills, StoreOptions};
    use planwright_utils::error::ExecutionError;
    use planwright_utils::paths::HomeGuard;

    use super::*;
    use crate::executor::{FindingSource, ReviewRequest, TaskOutcome, TaskRequest};
    use crate::resolver::Finding;

    /// Executor that fails each task a set number of times before passing.
    #[derive(Default)]
    pub struct ScriptedExecutor {
        failures: Mutex<BTreeMap<u32, u32>>,
        pub calls: AtomicU32,
    }

    impl ScriptedExecutor {
        pub fn passing() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn failing(task_id: u32, times: u32) -> Arc<Self> {
            let executor = Self::default();
            executor
                .failures
                .lock()
                .unwrap()
                .insert(task_id, times);
            Arc::new(executor)
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SkillExecutor for ScriptedExecutor {
        async fn run(&self, request: TaskRequest) -> Result<TaskOutcome, ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&request.task.id) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    Ok(TaskOutcome::failed(
                        request.task.id,
                        vec!["mvn -q test exited 1".to_string()],
                    ))
                }
                _ => Ok(TaskOutcome::passed(request.task.id)),
            }
        }
    }

    /// Reviewer that returns queued finding lists, then nothing.
    #[derive(Default)]
    pub struct QueuedReviewer {
        rounds: Mutex<Vec<Vec<Finding>>>,
        pub reviews: AtomicU32,
    }

    impl QueuedReviewer {
        pub fn new(rounds: Vec<Vec<Finding>>) -> Self {
            Self {
                rounds: Mutex::new(rounds),
                reviews: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl FindingSource for QueuedReviewer {
        async fn review(&self, _request: ReviewRequest) -> Result<Vec<Finding>, ExecutionError> {
            self.reviews.fetch_add(1, Ordering::SeqCst);
            let mut rounds = self.rounds.lock().unwrap();
            Ok(if rounds.is_empty() {
                Vec::new()
            } else {
                rounds.remove(0)
            })
        }
    }

    pub fn candidate(number: u32, file: &str, depends: &str) -> DeliverableCandidate {
        DeliverableCandidate {
            number: Some(number.to_string()),
            title: Some(format!("Deliverable {number}")),
            change_type: Some("create".to_string()),
            execution_mode: Some("automated".to_string()),
            domain: Some("java".to_string()),
            module: Some("core".to_string()),
            profiles: Some(vec![ProfileSkills {
                profile: "implementation".to_string(),
                skills: vec!["java-core".to_string()],
            }]),
            depends: Some(depends.to_string()),
            affected_files: Some(vec![file.to_string()]),
            verification_commands: Some(vec!["mvn -q test".to_string()]),
            verification_criteria: None,
        }
    }

    pub fn orchestrator(
        guard: &HomeGuard,
        executor: Arc<dyn SkillExecutor>,
    ) -> PlanOrchestrator {
        let store = ArtifactStore::open(&guard.home(), "demo", StoreOptions::default()).unwrap();
        PlanOrchestrator::new(Arc::new(store), Config::minimal_for_testing(), executor)
    }

    /// Walk a fresh plan to `5-execute` with two dependent deliverables.
    pub fn planned(orch: &PlanOrchestrator) -> Vec<Task> {
        orch.init("# Login page\nAdd a login page").unwrap();
        orch.advance().unwrap();
        orch.refine("# Login page\nAdd a login page with remember-me")
            .unwrap();
        orch.advance().unwrap();
        orch.outline(
            &[
                candidate(1, "src/main/java/Login.java", "none"),
                candidate(2, "src/main/java/Session.java", "1"),
            ],
            None,
        )
        .unwrap();
        orch.advance().unwrap();
        let tasks = orch.plan().unwrap();
        orch.advance().unwrap();
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use planwright_utils::error::ComplianceError;
    use planwright_utils::paths::with_isolated_home;

    #[test]
    fn test_fresh_plan_status() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        let status = orch.init("Add a login page").unwrap();

        let reread = orch.status().unwrap();
        assert_eq!(reread, status);
        assert_eq!(reread.current_phase, CurrentPhase::Active(PhaseId::Init));
        for state in &reread.phases {
            let expected = if state.name == PhaseId::Init {
                PhaseStatus::InProgress
            } else {
                PhaseStatus::Pending
            };
            assert_eq!(state.status, expected, "{}", state.name);
        }
    }

    #[test]
    fn test_init_twice_rejected() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();
        assert!(matches!(
            orch.init("again"),
            Err(PlanError::Store(StoreError::AlreadyExists { .. }))
        ));
    }

    #[test]
    fn test_phases_cannot_be_skipped() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();

        let err = orch.plan().unwrap_err();
        assert!(matches!(
            err,
            PlanError::Phase(PhaseError::InvalidTransition { ref from, ref to })
                if from == "1-init" && to == "4-plan"
        ));
        assert!(orch.outline(&[candidate(1, "A.java", "none")], None).is_err());
        assert_eq!(
            orch.status().unwrap().current_phase,
            CurrentPhase::Active(PhaseId::Init)
        );
    }

    #[test]
    fn test_refine_requires_log_entry() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();
        orch.advance().unwrap();

        assert!(matches!(
            orch.advance(),
            Err(PlanError::Phase(PhaseError::MissingArtifact { .. }))
        ));
        orch.refine("Add a login page with SSO").unwrap();
        let t = orch.advance().unwrap();
        assert_eq!(t.from, PhaseId::Refine);
        assert_eq!(t.to, CurrentPhase::Active(PhaseId::Outline));
    }

    #[test]
    fn test_transition_writes_status_and_log() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();
        orch.advance().unwrap();

        let status = orch.status().unwrap();
        assert_eq!(status.phase(PhaseId::Init).unwrap().status, PhaseStatus::Done);
        assert_eq!(
            status.phase(PhaseId::Refine).unwrap().status,
            PhaseStatus::InProgress
        );
        let log = orch.store().read_log().unwrap();
        assert!(
            log.iter()
                .any(|e| e.message == "transition: 1-init -> 2-refine")
        );
    }

    #[test]
    fn test_outline_rejection_persists_nothing() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();
        orch.advance().unwrap();
        orch.refine("Add a login page").unwrap();
        orch.advance().unwrap();

        let mut vague = candidate(2, "all files", "1");
        vague.verification_commands = Some(vec!["manual review".to_string()]);
        let err = orch
            .outline(&[candidate(1, "src/A.java", "none"), vague], None)
            .unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
        assert!(orch.store().read_deliverables().unwrap().is_empty());

        let cyclic = [
            candidate(1, "src/A.java", "2"),
            candidate(2, "src/B.java", "1"),
        ];
        assert!(matches!(
            orch.outline(&cyclic, None),
            Err(PlanError::Graph(_))
        ));
        assert!(orch.store().read_deliverables().unwrap().is_empty());
        assert!(orch.store().read_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_outline_narrative_must_match() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();
        orch.advance().unwrap();
        orch.refine("Add a login page").unwrap();
        orch.advance().unwrap();

        let narrative = "# Login\n\n### 1. Something else\n";
        assert!(matches!(
            orch.outline(&[candidate(1, "src/A.java", "none")], Some(narrative)),
            Err(PlanError::Validation(_))
        ));
        let narrative = "# Login\n\n### 1. Deliverable 1\nBuild the form.\n";
        orch.outline(&[candidate(1, "src/A.java", "none")], Some(narrative))
            .unwrap();
        assert_eq!(orch.store().read_outline().unwrap().text, narrative);
    }

    #[test]
    fn test_planned_tasks_and_immutable_deliverables() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        let tasks = planned(&orch);

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].depends_on, vec![1]);
        assert_eq!(
            orch.status().unwrap().current_phase,
            CurrentPhase::Active(PhaseId::Execute)
        );
        let deliverables = orch.store().read_deliverables().unwrap();
        assert!(matches!(
            orch.store().write_deliverables(&deliverables),
            Err(PlanError::Store(StoreError::Immutable { .. }))
        ));
    }

    #[test]
    fn test_tampering_halts_transition() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();

        let request = orch.store().root().join(planwright_store::REQUEST_FILE);
        std::fs::write(&request, "edited by hand").unwrap();

        assert!(matches!(
            orch.advance(),
            Err(PlanError::Compliance(ComplianceError::HashMismatch { .. }))
        ));
        assert_eq!(
            orch.status().unwrap().current_phase,
            CurrentPhase::Active(PhaseId::Init)
        );
    }

    #[test]
    fn test_execute_cannot_advance_until_done() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        planned(&orch);
        assert!(matches!(
            orch.advance(),
            Err(PlanError::Phase(PhaseError::ArtifactInvalid { .. }))
        ));
    }

    #[test]
    fn test_unblock_requires_blocked_plan() {
        let guard = with_isolated_home();
        let orch = orchestrator(&guard, ScriptedExecutor::passing());
        orch.init("Add a login page").unwrap();
        let decision = UnblockDecision {
            decided_by: "lead".to_string(),
            note: "retry".to_string(),
        };
        assert!(matches!(
            orch.unblock(&decision),
            Err(PlanError::Phase(PhaseError::WrongPhase { .. }))
        ));
    }
}
