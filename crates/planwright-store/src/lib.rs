//! Artifact store for planwright plans
//!
//! Persists a plan's status, request, deliverables, outline, tasks and work
//! log under one directory, with atomic writes, a single-writer lock, a
//! tabular codec for bulk records and a blake3 compliance manifest.

pub mod codec;
pub mod manifest;
pub mod narrative;
pub mod operations;
pub mod records;
mod store;
pub mod worklog;

pub use manifest::ComplianceManifest;
pub use narrative::{OutlineDocument, OutlineSection};
pub use operations::{Envelope, EnvelopeStatus, Operation, dispatch, dispatch_address};
pub use records::{
    ChangeType, Deliverable, ExecutionMode, LogEntry, ProfileSkills, Task, TaskMode, TaskStatus,
    Verification,
};
pub use store::{
    ArtifactStore, DELIVERABLES_FILE, OUTLINE_FILE, REQUEST_FILE, STATUS_FILE, StoreOptions,
    TASKS_FILE, WORK_LOG_FILE,
};
