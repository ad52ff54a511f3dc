//! Plan engine for planwright
//!
//! This crate turns validated deliverables into an executable plan and drives
//! the plan through its phases:
//!
//! - [`graph`]: dependency graphs with cycle detection, topological order and
//!   parallel-safe batches
//! - [`optimizer`]: deliverables to tasks (split and aggregation passes)
//! - [`resolver`]: `(domain, phase)` workflow skills, domain extensions and
//!   finding triage
//! - [`executor`]: the seams where task execution and review are delegated
//! - [`orchestrator`]: the phase state machine with bounded execute and
//!   finalize loops

pub mod executor;
pub mod graph;
pub mod optimizer;
pub mod orchestrator;
pub mod resolver;

pub use executor::{FindingSource, ReviewRequest, SkillExecutor, TaskOutcome, TaskRequest};
pub use graph::DependencyGraph;
pub use optimizer::TaskOptimizer;
pub use orchestrator::{
    ExecuteSummary, FinalizeSummary, PlanCompletion, PlanOrchestrator, PlanReport,
    Transition, UnblockDecision,
};
pub use resolver::{
    DomainExtension, DomainResolver, ExtensionType, Finding, SkillRegistry, TriageDecision,
};
