//! Exit checks for each phase
//!
//! A phase may only be left when the artifacts it is responsible for exist
//! and are valid. Missing artifacts and invalid ones are distinct errors so a
//! caller can tell "not done yet" from "done wrong".

use planwright_store::{
    ArtifactStore, DELIVERABLES_FILE, OUTLINE_FILE, REQUEST_FILE, TASKS_FILE, TaskStatus,
    WORK_LOG_FILE,
};
use planwright_utils::error::{PhaseError, PlanError, StoreError};
use planwright_utils::types::{CurrentPhase, LogCategory, PhaseId};
use planwright_validation::{DeliverableCandidate, DeliverableValidator, validate_tasks};

use super::{PlanOrchestrator, REFINE_LOG_PREFIX, REVIEW_CLEAN, REVIEW_LOG_PREFIX};
use crate::optimizer::{deliverable_graph, task_graph};

pub(super) fn require_text(phase: PhaseId, artifact: &str, text: &str) -> Result<(), PlanError> {
    if text.trim().is_empty() {
        return Err(invalid(phase, artifact, "must not be empty"));
    }
    Ok(())
}

fn invalid(phase: PhaseId, artifact: &str, reason: impl Into<String>) -> PlanError {
    PhaseError::ArtifactInvalid {
        phase: phase.to_string(),
        artifact: artifact.to_string(),
        reason: reason.into(),
    }
    .into()
}

fn missing(phase: PhaseId, artifact: &str) -> PlanError {
    PhaseError::MissingArtifact {
        phase: phase.to_string(),
        artifact: artifact.to_string(),
    }
    .into()
}

/// Turn a store `NotFound` into the phase's missing-artifact error.
fn required<T>(phase: PhaseId, artifact: &str, result: Result<T, PlanError>) -> Result<T, PlanError> {
    result.map_err(|e| match e {
        PlanError::Store(StoreError::NotFound { .. }) => missing(phase, artifact),
        other => other,
    })
}

/// Run the exit checks for `phase`.
pub(super) fn check_exit(orch: &PlanOrchestrator, phase: PhaseId) -> Result<(), PlanError> {
    let store = orch.store();
    match phase {
        PhaseId::Init => {
            let request = required(phase, REQUEST_FILE, store.read_request())?;
            require_text(phase, REQUEST_FILE, &request)
        }
        PhaseId::Refine => {
            let request = required(phase, REQUEST_FILE, store.read_request())?;
            require_text(phase, REQUEST_FILE, &request)?;
            let refined = store.read_log()?.iter().any(|e| {
                e.category == LogCategory::Work
                    && e.phase == CurrentPhase::Active(PhaseId::Refine)
                    && e.message.starts_with(REFINE_LOG_PREFIX)
            });
            if refined {
                Ok(())
            } else {
                Err(missing(phase, &format!("{WORK_LOG_FILE} refine entry")))
            }
        }
        PhaseId::Outline => {
            let deliverables = store.read_deliverables()?;
            if deliverables.is_empty() {
                return Err(missing(phase, DELIVERABLES_FILE));
            }
            store.validate_deliverables()?;
            let candidates: Vec<DeliverableCandidate> =
                deliverables.iter().map(DeliverableCandidate::from).collect();
            DeliverableValidator::new(orch.config()).validate(&candidates)?;
            deliverable_graph(&deliverables).validate()?;
            required(phase, OUTLINE_FILE, store.validate_outline())
        }
        PhaseId::Plan => {
            let tasks = store.read_tasks()?;
            if tasks.is_empty() {
                return Err(missing(phase, TASKS_FILE));
            }
            let graph = task_graph(&tasks);
            graph.validate()?;
            graph.check_no_forward_references()?;
            validate_tasks(&tasks, &store.read_deliverables()?, orch.config())?;
            Ok(())
        }
        PhaseId::Execute => all_tasks_done(phase, store),
        PhaseId::Finalize => {
            all_tasks_done(phase, store)?;
            let log = store.read_log()?;
            let last_review = log.iter().rev().find(|e| {
                e.phase == CurrentPhase::Active(PhaseId::Finalize)
                    && e.category == LogCategory::Work
                    && e.message.starts_with(REVIEW_LOG_PREFIX)
            });
            match last_review {
                None => Err(missing(phase, &format!("{WORK_LOG_FILE} review entry"))),
                Some(entry) if entry.message == REVIEW_CLEAN => Ok(()),
                Some(entry) => Err(invalid(phase, WORK_LOG_FILE, entry.message.clone())),
            }
        }
    }
}

/// Every task, fix tasks included, has passed verification.
fn all_tasks_done(phase: PhaseId, store: &ArtifactStore) -> Result<(), PlanError> {
    let open: Vec<String> = store
        .read_tasks()?
        .iter()
        .filter(|t| t.status != TaskStatus::Done)
        .map(|t| t.id.to_string())
        .collect();
    if open.is_empty() {
        Ok(())
    } else {
        Err(invalid(
            phase,
            TASKS_FILE,
            format!("task(s) {} not done", open.join(", ")),
        ))
    }
}
