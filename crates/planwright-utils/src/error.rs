use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use crate::plan_id::PlanIdError;
pub use planwright_lock::LockError;

/// Library-level error type for plan orchestration.
///
/// `PlanError` wraps one error enum per concern. The five orchestration
/// failures map to their own variants:
///
/// | Variant | Raised when | Handling |
/// |---------|-------------|----------|
/// | `Validation` | a deliverable or task record is malformed | rejected atomically, never auto-corrected |
/// | `Graph` | a cycle or forward reference is found | fatal for the outline/plan step |
/// | `Resolution` | a `(domain, phase)` or `(domain, extension)` lookup misses | fatal configuration error |
/// | `Execution` | a delegated task fails verification | retried up to the phase cap, then blocked |
/// | `Compliance` | plan files changed outside the store | always reported, execution halts |
///
/// Use [`display_for_user()`](Self::display_for_user) for formatted output and
/// [`error_code()`](Self::error_code) for the stable code carried in
/// operation envelopes.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Dependency graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Compliance error: {0}")]
    Compliance(#[from] ComplianceError),

    #[error("Phase error: {0}")]
    Phase(#[from] PhaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("Plan lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Plan ID error: {0}")]
    PlanId(#[from] PlanIdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    PhaseExecution,
    Validation,
    DependencyGraph,
    Resolution,
    Compliance,
    FileSystem,
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::PhaseExecution => write!(f, "Phase Execution"),
            Self::Validation => write!(f, "Validation"),
            Self::DependencyGraph => write!(f, "Dependency Graph"),
            Self::Resolution => write!(f, "Resolution"),
            Self::Compliance => write!(f, "Compliance"),
            Self::FileSystem => write!(f, "File System"),
            Self::Concurrency => write!(f, "Concurrency"),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Kind of a single validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingField,
    InvalidEnum,
    UnknownDomain,
    SystemDomain,
    InvalidDepends,
    VagueFileReference,
    VagueVerification,
    EmptySkills,
    DuplicateNumber,
    NonContiguousNumbering,
    InconsistentOutline,
    InconsistentStatus,
    InvalidTask,
}

/// One problem found while validating a deliverable or task set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Entity the issue belongs to, e.g. `deliverable 3`
    pub entity: String,
    pub field: String,
    pub kind: IssueKind,
    pub detail: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(
        entity: impl Into<String>,
        field: impl Into<String>,
        kind: IssueKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.entity, self.field, self.detail)
    }
}

/// A rejected record set. Always carries every issue that was found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{subject} rejected with {} issue(s)", issues.len())]
pub struct ValidationError {
    /// What was being validated, e.g. `deliverables`
    pub subject: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    #[must_use]
    pub fn new(subject: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            subject: subject.into(),
            issues,
        }
    }

    #[must_use]
    pub fn single(subject: impl Into<String>, issue: ValidationIssue) -> Self {
        Self::new(subject, vec![issue])
    }
}

impl UserFriendlyError for ValidationError {
    fn user_message(&self) -> String {
        let details: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        format!(
            "The {} were rejected: {}",
            self.subject,
            details.join("; ")
        )
    }

    fn context(&self) -> Option<String> {
        Some("Validation is atomic: nothing from the rejected set was persisted.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        let mut out = Vec::new();
        let has = |kind: IssueKind| self.issues.iter().any(|i| i.kind == kind);
        if has(IssueKind::VagueFileReference) {
            out.push("List every affected file as an explicit relative path".to_string());
        }
        if has(IssueKind::VagueVerification) {
            out.push(
                "Replace 'manual review' with a runnable verification command".to_string(),
            );
        }
        if has(IssueKind::InvalidDepends) {
            out.push("Use 'none', 'N', 'N. Title' or 'N, M' in the depends field".to_string());
        }
        if has(IssueKind::UnknownDomain) || has(IssueKind::SystemDomain) {
            out.push("Use one of the domains configured for this plan".to_string());
        }
        if out.is_empty() {
            out.push("Fix the listed fields and resubmit the whole set".to_string());
        }
        out
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

// ============================================================================
// Graph
// ============================================================================

/// Dependency graph failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("{node} depends on unknown {missing}")]
    UnknownReference { node: String, missing: String },

    #[error("{node} depends on itself")]
    SelfReference { node: String },

    #[error("{node} depends on {target}, which is created later")]
    ForwardReference { node: String, target: String },
}

impl UserFriendlyError for GraphError {
    fn user_message(&self) -> String {
        match self {
            Self::Cycle { path } => {
                format!("Dependencies form a cycle: {}", path.join(" -> "))
            }
            Self::UnknownReference { node, missing } => {
                format!("{node} refers to {missing}, which does not exist")
            }
            Self::SelfReference { node } => format!("{node} lists itself as a dependency"),
            Self::ForwardReference { node, target } => {
                format!("{node} depends on {target}, which is defined after it")
            }
        }
    }

    fn context(&self) -> Option<String> {
        Some("Cycles and forward references are never resolved automatically; no partial graph was persisted.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Cycle { .. } => vec![
                "Remove one dependency edge on the reported cycle".to_string(),
                "Split the deliverable that both sides need into its own deliverable".to_string(),
            ],
            _ => vec!["Correct the depends field to reference existing, earlier entries".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::DependencyGraph
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Skill and extension lookup failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Domain '{domain}' is not configured")]
    UnknownDomain { domain: String },

    #[error("No workflow skill registered for domain '{domain}' in phase {phase}")]
    NoWorkflowSkill { domain: String, phase: String },

    #[error("Domain '{domain}' is reserved for internal use")]
    ReservedDomain { domain: String },
}

impl UserFriendlyError for ResolutionError {
    fn user_message(&self) -> String {
        match self {
            Self::UnknownDomain { domain } => {
                format!("The domain '{domain}' has no configuration")
            }
            Self::NoWorkflowSkill { domain, phase } => {
                format!("No skill handles phase {phase} for domain '{domain}'")
            }
            Self::ReservedDomain { domain } => {
                format!("The domain '{domain}' cannot be used for plan work")
            }
        }
    }

    fn context(&self) -> Option<String> {
        Some("Skill lookups never fall back to a default; the registry is built from configuration at startup.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::UnknownDomain { domain } | Self::ReservedDomain { domain } => vec![format!(
                "Add a [domains.<name>] section for the intended domain instead of '{domain}'"
            )],
            Self::NoWorkflowSkill { domain, phase } => vec![
                format!("Add \"{phase}\" to [workflow] or [domains.{domain}.workflow]"),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Resolution
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Failures of delegated work
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Task {task_id} failed verification: {}", failing.join("; "))]
    VerificationFailed { task_id: u32, failing: Vec<String> },

    #[error("Skill '{skill}' could not run task {task_id}: {reason}")]
    Delegation {
        task_id: u32,
        skill: String,
        reason: String,
    },

    #[error("Phase {phase} reached its iteration cap ({iterations})")]
    IterationCapReached {
        phase: String,
        iterations: u32,
        failing: Vec<String>,
    },

    #[error("Task worker aborted: {reason}")]
    WorkerAborted { reason: String },
}

impl UserFriendlyError for ExecutionError {
    fn user_message(&self) -> String {
        match self {
            Self::VerificationFailed { task_id, failing } => {
                format!("Task {task_id} did not pass: {}", failing.join("; "))
            }
            Self::Delegation {
                task_id,
                skill,
                reason,
            } => format!("Task {task_id} could not be handed to '{skill}': {reason}"),
            Self::IterationCapReached {
                phase,
                iterations,
                failing,
            } => format!(
                "Phase {phase} is blocked after {iterations} attempt(s); still failing: {}",
                failing.join("; ")
            ),
            Self::WorkerAborted { reason } => format!("A task worker stopped: {reason}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::IterationCapReached { .. } => Some(
                "Blocked plans need an external decision before work resumes.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::IterationCapReached { .. } => vec![
                "Inspect work.log for the failing criteria".to_string(),
                "Unblock the plan once the cause is addressed".to_string(),
            ],
            _ => vec!["Check the delegated skill's output for the failing criteria".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::PhaseExecution
    }
}

// ============================================================================
// Compliance
// ============================================================================

/// Evidence that plan files were changed outside the artifact store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("{file} in plan '{plan_id}' was modified outside the artifact store")]
    HashMismatch { plan_id: String, file: String },

    #[error("{file} in plan '{plan_id}' was removed outside the artifact store")]
    MissingFile { plan_id: String, file: String },

    #[error("{file} in plan '{plan_id}' was created outside the artifact store")]
    UnmanagedFile { plan_id: String, file: String },

    #[error("Manifest for plan '{plan_id}' is unreadable: {reason}")]
    ManifestCorrupt { plan_id: String, reason: String },
}

impl UserFriendlyError for ComplianceError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("All plan state must flow through the store operations; the audit trail can no longer be trusted.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Restore the file from version control or re-run the phase through the store"
                .to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Compliance
    }
}

// ============================================================================
// Phase
// ============================================================================

/// Phase state machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation for phase {expected} invoked while plan is at {actual}")]
    WrongPhase { expected: String, actual: String },

    #[error("Phase {phase} is missing required artifact {artifact}")]
    MissingArtifact { phase: String, artifact: String },

    #[error("Phase {phase} artifact {artifact} is invalid: {reason}")]
    ArtifactInvalid {
        phase: String,
        artifact: String,
        reason: String,
    },

    #[error("Plan is blocked at {phase} after {iteration_count} iteration(s)")]
    Blocked {
        phase: String,
        iteration_count: u32,
        failing: Vec<String>,
    },

    #[error("Plan '{plan_id}' is already complete")]
    AlreadyComplete { plan_id: String },
}

impl UserFriendlyError for PhaseError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidTransition { from, to } => {
                format!("Cannot move from phase {from} to phase {to}")
            }
            Self::WrongPhase { expected, actual } => {
                format!("This step belongs to phase {expected}, but the plan is at {actual}")
            }
            Self::MissingArtifact { phase, artifact } => {
                format!("Phase {phase} cannot finish: {artifact} has not been written")
            }
            Self::ArtifactInvalid {
                phase,
                artifact,
                reason,
            } => format!("Phase {phase} cannot finish: {artifact} is invalid ({reason})"),
            Self::Blocked {
                phase,
                iteration_count,
                failing,
            } => format!(
                "Plan is blocked in phase {phase} after {iteration_count} iteration(s); failing: {}",
                failing.join("; ")
            ),
            Self::AlreadyComplete { plan_id } => format!("Plan '{plan_id}' has completed"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidTransition { .. } | Self::WrongPhase { .. } => Some(
                "Phases advance strictly forward; none can be skipped.".to_string(),
            ),
            Self::Blocked { .. } => {
                Some("A blocked plan waits for an external decision.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingArtifact { artifact, .. } => {
                vec![format!("Write {artifact} through the artifact store")]
            }
            Self::Blocked { .. } => vec!["Unblock the plan after resolving the failures".to_string()],
            _ => vec!["Check the plan status before invoking the next step".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::PhaseExecution
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::ValidationFailed { errors, .. } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        Some("Configuration lives in .planwright/config.toml with [defaults], [optimizer], [loops], [workflow] and [domains.<name>] sections.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } => vec![
                "Create .planwright/config.toml or set PLANWRIGHT_HOME".to_string(),
            ],
            _ => vec!["Check the configuration file against the documented sections".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

// ============================================================================
// Store
// ============================================================================

/// Artifact store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Plan '{plan_id}' has no {artifact}")]
    NotFound { plan_id: String, artifact: String },

    #[error("Plan '{plan_id}' already exists")]
    AlreadyExists { plan_id: String },

    #[error("Store for plan '{plan_id}' was opened read-only")]
    ReadOnly { plan_id: String },

    #[error("Malformed {artifact} at line {line}: {reason}")]
    Codec {
        artifact: String,
        line: usize,
        reason: String,
    },

    #[error("I/O failure on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Unsupported operation '{operation}'")]
    UnsupportedOperation { operation: String },

    #[error("Invalid arguments for '{operation}': {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("{artifact} of plan '{plan_id}' is immutable: {reason}")]
    Immutable {
        plan_id: String,
        artifact: String,
        reason: String,
    },
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ReadOnly { .. } => Some("Only the writer holding the plan lock may mutate a plan.".to_string()),
            Self::Immutable { .. } => Some("Deliverables are referenced by tasks and may not change once tasks exist.".to_string()),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::UnsupportedOperation { .. } => vec![
                "Use one of add, get, list, validate, read, write on a known component".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ReadOnly { .. } => ErrorCategory::Concurrency,
            Self::Codec { .. } | Self::InvalidArguments { .. } | Self::Immutable { .. } => {
                ErrorCategory::Validation
            }
            _ => ErrorCategory::FileSystem,
        }
    }
}

impl UserFriendlyError for LockError {
    fn user_message(&self) -> String {
        match self {
            LockError::ConcurrentExecution {
                plan_id,
                pid,
                created_ago,
            } => format!(
                "Another process (PID {pid}) is writing plan '{plan_id}' (started {created_ago} ago)"
            ),
            LockError::StaleLock {
                plan_id, age_secs, ..
            } => format!("Plan '{plan_id}' has a stale lock ({age_secs}s old)"),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        Some("Each plan has a single writer; readers never take the lock.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            LockError::ConcurrentExecution { .. } => {
                vec!["Wait for the other writer to finish".to_string()]
            }
            LockError::StaleLock { .. } => {
                vec!["Reopen the store with force to take over the stale lock".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Concurrency
    }
}

impl UserFriendlyError for PlanError {
    fn user_message(&self) -> String {
        match self {
            PlanError::Validation(e) => e.user_message(),
            PlanError::Graph(e) => e.user_message(),
            PlanError::Resolution(e) => e.user_message(),
            PlanError::Execution(e) => e.user_message(),
            PlanError::Compliance(e) => e.user_message(),
            PlanError::Phase(e) => e.user_message(),
            PlanError::Config(e) => e.user_message(),
            PlanError::Store(e) => e.user_message(),
            PlanError::Lock(e) => e.user_message(),
            PlanError::PlanId(e) => e.user_message(),
            PlanError::Io(e) => format!("File system operation failed: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            PlanError::Validation(e) => e.context(),
            PlanError::Graph(e) => e.context(),
            PlanError::Resolution(e) => e.context(),
            PlanError::Execution(e) => e.context(),
            PlanError::Compliance(e) => e.context(),
            PlanError::Phase(e) => e.context(),
            PlanError::Config(e) => e.context(),
            PlanError::Store(e) => e.context(),
            PlanError::Lock(e) => e.context(),
            PlanError::PlanId(e) => e.context(),
            PlanError::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            PlanError::Validation(e) => e.suggestions(),
            PlanError::Graph(e) => e.suggestions(),
            PlanError::Resolution(e) => e.suggestions(),
            PlanError::Execution(e) => e.suggestions(),
            PlanError::Compliance(e) => e.suggestions(),
            PlanError::Phase(e) => e.suggestions(),
            PlanError::Config(e) => e.suggestions(),
            PlanError::Store(e) => e.suggestions(),
            PlanError::Lock(e) => e.suggestions(),
            PlanError::PlanId(e) => e.suggestions(),
            PlanError::Io(_) => vec!["Check permissions on the plan directory".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            PlanError::Validation(e) => e.category(),
            PlanError::Graph(e) => e.category(),
            PlanError::Resolution(e) => e.category(),
            PlanError::Execution(e) => e.category(),
            PlanError::Compliance(e) => e.category(),
            PlanError::Phase(e) => e.category(),
            PlanError::Config(e) => e.category(),
            PlanError::Store(e) => e.category(),
            PlanError::Lock(e) => e.category(),
            PlanError::PlanId(e) => e.category(),
            PlanError::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl PlanError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// ```text
    /// Error: <user message>
    ///
    /// Context: <context if available>
    ///
    /// Suggestions:
    ///   • <suggestion 1>
    /// ```
    ///
    /// # Example
    ///
    /// ```rust
    /// use planwright_utils::error::{GraphError, PlanError};
    ///
    /// let err = PlanError::from(GraphError::Cycle {
    ///     path: vec!["deliverable 1".into(), "deliverable 2".into(), "deliverable 1".into()],
    /// });
    /// let message = err.display_for_user();
    /// assert!(message.contains("cycle"));
    /// assert!(message.contains("Suggestions:"));
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Stable machine-readable code, carried in operation envelopes.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            PlanError::Validation(_) => "validation_error",
            PlanError::Graph(_) => "graph_error",
            PlanError::Resolution(_) => "resolution_error",
            PlanError::Execution(_) => "execution_error",
            PlanError::Compliance(_) => "compliance_error",
            PlanError::Phase(_) => "phase_error",
            PlanError::Config(_) => "config_error",
            PlanError::Store(_) => "store_error",
            PlanError::Lock(_) => "lock_error",
            PlanError::PlanId(_) => "plan_id_error",
            PlanError::Io(_) => "io_error",
        }
    }

    /// Whether the error may be retried mechanically within a phase's iteration cap.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlanError::Execution(
                ExecutionError::VerificationFailed { .. } | ExecutionError::Delegation { .. }
            )
        )
    }
}
