//! planwright - plan lifecycle orchestration
//!
//! planwright takes a request through a fixed sequence of gated phases:
//!
//! ```text
//! 1-init → 2-refine → 3-outline → 4-plan → 5-execute → 6-finalize → COMPLETE
//! ```
//!
//! Along the way it validates deliverables, builds dependency graphs, compiles
//! deliverables into an optimized task list, resolves per-domain workflow
//! skills and runs execute and finalize loops with bounded retries. All plan
//! state lives in an artifact store on disk, so a plan can be resumed by any
//! process that takes the plan lock.
//!
//! planwright never runs code or tools itself. Task execution and review are
//! delegated through the [`SkillExecutor`] and [`FindingSource`] traits.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use planwright::{Config, ExecutionError, SkillExecutor, TaskOutcome, TaskRequest};
//!
//! struct Runner;
//!
//! #[async_trait]
//! impl SkillExecutor for Runner {
//!     async fn run(&self, request: TaskRequest) -> Result<TaskOutcome, ExecutionError> {
//!         // hand request.task to request.workflow_skill here
//!         Ok(TaskOutcome::passed(request.task.id))
//!     }
//! }
//!
//! # fn main() -> Result<(), planwright::PlanError> {
//! let config = Config::builder()
//!     .shared_workflow_defaults()
//!     .domain("java", planwright::DomainConfig::default())
//!     .build()?;
//! let _ = planwright::init_logging(&config);
//! let plan = planwright::open_plan(config, "login-page", Arc::new(Runner))?;
//! plan.init("# Login page\nAdd a login page with remember-me")?;
//! plan.advance()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! The re-exports at the crate root are stable for 1.x releases. The
//! component crates are reachable through the `#[doc(hidden)]` module
//! re-exports below and are not covered by semver.

use std::sync::Arc;

// ============================================================================
// Stable Public API - covered by semver guarantees for 1.x
// ============================================================================

/// Phase identifiers, `1-init` through `6-finalize`.
pub use planwright_utils::types::PhaseId;

/// Plan record persisted as `status.json`, with its phase states and the
/// blocked report.
pub use planwright_utils::types::{
    BlockedReport, CurrentPhase, PhaseState, PhaseStatus, PlanStatus,
};

/// Configuration with discovery and precedence:
/// programmatic > config file > built-in defaults.
///
/// Use [`Config::discover()`] to load `.planwright/config.toml` or
/// [`Config::builder()`] for embedding.
pub use planwright_config::{Config, ConfigBuilder, DomainConfig};

/// Library-level error type and its per-concern parts.
///
/// Library code returns `PlanError`; use
/// [`display_for_user()`](PlanError::display_for_user) for formatted output
/// and [`error_code()`](PlanError::error_code) for the stable code.
pub use planwright_utils::error::{
    ComplianceError, ExecutionError, GraphError, PhaseError, PlanError, ResolutionError, StoreError,
    ValidationError,
};

/// Trait for providing user-friendly error reporting.
pub use planwright_utils::error::{ErrorCategory, UserFriendlyError};

/// Artifact records and the store that persists them.
pub use planwright_store::{
    ArtifactStore, Deliverable, Envelope, StoreOptions, Task, TaskStatus, dispatch_address,
};

/// Raw deliverable input and its validator.
pub use planwright_validation::{DeliverableCandidate, DeliverableValidator};

/// The engine: graphs, optimizer, resolver and the phase state machine.
pub use planwright_engine::{
    DependencyGraph, DomainExtension, DomainResolver, ExecuteSummary, FinalizeSummary, Finding,
    FindingSource, PlanCompletion, PlanOrchestrator, PlanReport, ReviewRequest, SkillExecutor,
    TaskOptimizer, TaskOutcome, TaskRequest, Transition, TriageDecision, UnblockDecision,
};

/// Open a plan for writing under the configured state directory.
///
/// Takes the plan's single-writer lock for the lifetime of the returned
/// orchestrator, honouring the configured lock TTL.
///
/// # Errors
///
/// Returns `PlanError::Lock` when another live writer holds the plan and
/// `PlanError::PlanId` for an id that cannot be used as a directory name.
pub fn open_plan(
    config: Config,
    plan_id: &str,
    executor: Arc<dyn SkillExecutor>,
) -> Result<PlanOrchestrator, PlanError> {
    let options = StoreOptions {
        lock_ttl_seconds: Some(config.lock_ttl_seconds()),
        ..StoreOptions::default()
    };
    let store = ArtifactStore::open(&config.state_dir(), plan_id, options)?;
    Ok(PlanOrchestrator::new(Arc::new(store), config, executor))
}

/// Open a plan without the lock, for status and report queries.
///
/// # Errors
///
/// Returns `PlanError::PlanId` for an invalid id or a compliance error when
/// the plan's manifest cannot be read.
pub fn open_plan_read_only(config: &Config, plan_id: &str) -> Result<ArtifactStore, PlanError> {
    ArtifactStore::open_read_only(&config.state_dir(), plan_id)
}

/// Install the global tracing subscriber, verbose when `defaults.verbose`
/// is set.
///
/// `RUST_LOG` overrides the default filter.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    planwright_utils::logging::init_tracing(config.verbose())
}

/// Install a JSON tracing subscriber for machine consumers.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging_json() -> Result<(), Box<dyn std::error::Error>> {
    planwright_utils::logging::init_tracing_json()
}

/// Returns the planwright version.
#[must_use]
pub fn planwright_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// Internal modules - accessible but not stable
// ============================================================================

#[doc(hidden)]
pub use planwright_utils::{atomic_write, canonicalization, error, logging, paths, plan_id, types};

#[doc(hidden)]
pub use planwright_config as config;

#[doc(hidden)]
pub use planwright_lock as lock;

#[doc(hidden)]
pub use planwright_store as store;

#[doc(hidden)]
pub use planwright_validation as validation;

#[doc(hidden)]
pub use planwright_engine::{executor, graph, optimizer, orchestrator, resolver};
