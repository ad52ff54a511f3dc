use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use planwright_lock::FileLock;
use planwright_utils::atomic_write::{
    append_line, file_hash, read_file_with_crlf_tolerance, write_file_atomic,
};
use planwright_utils::canonicalization::emit_jcs;
use planwright_utils::error::{
    IssueKind, PlanError, StoreError, ValidationError, ValidationIssue,
};
use planwright_utils::paths::{archive_dir, ensure_dir_all, locks_dir, plan_root};
use planwright_utils::plan_id::validate_plan_id;
use planwright_utils::types::{CurrentPhase, PhaseId, PhaseStatus, PlanStatus};

use crate::codec::{TabularRecord, parse_table, serialize_table};
use crate::manifest::ComplianceManifest;
use crate::narrative::OutlineDocument;
use crate::records::{Deliverable, LogEntry, Task, TaskStatus};
use crate::worklog;

pub const STATUS_FILE: &str = "status.json";
pub const REQUEST_FILE: &str = "request.md";
pub const DELIVERABLES_FILE: &str = "deliverables.tsv";
pub const OUTLINE_FILE: &str = "solution_outline.md";
pub const TASKS_FILE: &str = "tasks.tsv";
pub const WORK_LOG_FILE: &str = "work.log";

type StoreResult<T> = Result<T, PlanError>;

/// How a store is opened
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Open without taking the plan lock; every write is refused.
    pub read_only: bool,
    /// Override an existing lock.
    pub force: bool,
    pub lock_ttl_seconds: Option<u64>,
}

impl StoreOptions {
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

struct Inner {
    root: Utf8PathBuf,
    manifest: ComplianceManifest,
    archived: bool,
}

/// Persistent home of one plan's artifacts
///
/// Layout under `<home>/plans/<plan_id>/`:
///
/// ```text
/// status.json            plan record (JCS)
/// request.md             the (refined) request
/// deliverables.tsv       tabular deliverables
/// solution_outline.md    narrative outline
/// tasks.tsv              tabular tasks
/// work.log               append-only audit trail
/// .manifest.json         blake3 hash of every file above
/// ```
///
/// A writable store holds the cross-process plan lock for its lifetime and
/// serializes its own writes through an internal mutex. Read-modify-write
/// operations (`add_task`, `update_task_status`, `add_deliverable`) hold
/// that mutex from the read through the write. A read-only store takes no
/// lock and refuses every write.
pub struct ArtifactStore {
    plan_id: String,
    home: Utf8PathBuf,
    read_only: bool,
    inner: Mutex<Inner>,
    _lock: Option<FileLock>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("plan_id", &self.plan_id)
            .field("home", &self.home)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

fn io_err(path: &Utf8Path, err: &anyhow::Error) -> PlanError {
    StoreError::Io {
        path: path.to_string(),
        reason: format!("{err:#}"),
    }
    .into()
}

impl ArtifactStore {
    /// Open the store for `plan_id` under `home`.
    ///
    /// The plan directory is not created until the first write.
    pub fn open(home: &Utf8Path, plan_id: &str, options: StoreOptions) -> StoreResult<Self> {
        validate_plan_id(plan_id)?;
        let root = plan_root(home, plan_id);

        let lock = if options.read_only {
            None
        } else {
            Some(FileLock::acquire(
                &locks_dir(home),
                plan_id,
                options.force,
                options.lock_ttl_seconds,
            )?)
        };

        let manifest = ComplianceManifest::load(&root, plan_id)?;
        debug!(plan_id = %plan_id, root = %root, read_only = options.read_only, "artifact store opened");

        Ok(Self {
            plan_id: plan_id.to_string(),
            home: home.to_path_buf(),
            read_only: options.read_only,
            inner: Mutex::new(Inner {
                root,
                manifest,
                archived: false,
            }),
            _lock: lock,
        })
    }

    /// Open for writing with default lock settings.
    pub fn open_writable(home: &Utf8Path, plan_id: &str) -> StoreResult<Self> {
        Self::open(home, plan_id, StoreOptions::default())
    }

    pub fn open_read_only(home: &Utf8Path, plan_id: &str) -> StoreResult<Self> {
        Self::open(home, plan_id, StoreOptions::read_only())
    }

    #[must_use]
    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    #[must_use]
    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Current plan directory. Moves under the archive once the plan is archived.
    #[must_use]
    pub fn root(&self) -> Utf8PathBuf {
        self.inner().root.clone()
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.inner().archived
    }

    /// Whether the plan has been initialized.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.root().join(STATUS_FILE).exists()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the store for a mutation, refusing read-only and archived plans.
    fn writer(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        if self.read_only {
            return Err(StoreError::ReadOnly {
                plan_id: self.plan_id.clone(),
            }
            .into());
        }
        let inner = self.inner();
        if inner.archived {
            return Err(StoreError::Immutable {
                plan_id: self.plan_id.clone(),
                artifact: "plan".to_string(),
                reason: "the plan has been archived".to_string(),
            }
            .into());
        }
        Ok(inner)
    }

    /// Atomically replace a managed file and record its hash.
    fn write_managed(&self, file: &str, content: &str) -> StoreResult<()> {
        let mut inner = self.writer()?;
        self.write_held(&mut inner, file, content)
    }

    /// Write under a guard the caller already holds.
    fn write_held(&self, inner: &mut Inner, file: &str, content: &str) -> StoreResult<()> {
        let path = inner.root.join(file);
        let result = write_file_atomic(&path, content).map_err(|e| io_err(&path, &e))?;
        for warning in &result.warnings {
            debug!(plan_id = %self.plan_id, file, warning = %warning, "atomic write warning");
        }
        Self::record(inner, file, result.blake3_hash)?;
        debug!(plan_id = %self.plan_id, file, "artifact written");
        Ok(())
    }

    fn record(inner: &mut Inner, file: &str, blake3_hash: String) -> StoreResult<()> {
        inner.manifest.record(file, blake3_hash);
        let root = inner.root.clone();
        inner.manifest.save(&root).map_err(|e| io_err(&root, &e))
    }

    /// Read a managed file, or `None` when it has not been written yet.
    fn read_optional(&self, file: &str) -> StoreResult<Option<String>> {
        read_optional_at(&self.root().join(file))
    }

    fn read_required(&self, file: &str) -> StoreResult<String> {
        self.read_optional(file)?.ok_or_else(|| {
            StoreError::NotFound {
                plan_id: self.plan_id.clone(),
                artifact: file.to_string(),
            }
            .into()
        })
    }

    /// Raw text of any managed artifact.
    pub fn read_raw(&self, file: &str) -> StoreResult<String> {
        self.read_required(file)
    }

    // ---------------------------------------------------------------------
    // status
    // ---------------------------------------------------------------------

    pub fn read_status(&self) -> StoreResult<PlanStatus> {
        let text = self.read_required(STATUS_FILE)?;
        serde_json::from_str(&text).map_err(|e| {
            StoreError::Codec {
                artifact: STATUS_FILE.to_string(),
                line: e.line(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn write_status(&self, status: &PlanStatus) -> StoreResult<()> {
        if status.plan_id != self.plan_id {
            return Err(StoreError::InvalidArguments {
                operation: "status-store.write".to_string(),
                reason: format!("status belongs to plan '{}'", status.plan_id),
            }
            .into());
        }
        let json = emit_jcs(status).map_err(|e| io_err(&self.root().join(STATUS_FILE), &e))?;
        self.write_managed(STATUS_FILE, &json)
    }

    /// One top-level field of `status.json`.
    pub fn status_field(&self, field: &str) -> StoreResult<serde_json::Value> {
        let status = self.read_status()?;
        let value = serde_json::to_value(&status).map_err(|e| StoreError::Codec {
            artifact: STATUS_FILE.to_string(),
            line: 0,
            reason: e.to_string(),
        })?;
        value.get(field).cloned().ok_or_else(|| {
            StoreError::InvalidArguments {
                operation: "status-store.get".to_string(),
                reason: format!("status has no field '{field}'"),
            }
            .into()
        })
    }

    /// Check the status record for internal consistency.
    pub fn validate_status(&self) -> StoreResult<()> {
        let status = self.read_status()?;
        let issues = status_issues(&self.plan_id, &status);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new("status", issues).into())
        }
    }

    // ---------------------------------------------------------------------
    // request
    // ---------------------------------------------------------------------

    pub fn read_request(&self) -> StoreResult<String> {
        self.read_required(REQUEST_FILE)
    }

    pub fn write_request(&self, request: &str) -> StoreResult<()> {
        self.write_managed(REQUEST_FILE, request)
    }

    // ---------------------------------------------------------------------
    // deliverables
    // ---------------------------------------------------------------------

    /// All deliverables in number order. Empty before the outline exists.
    pub fn read_deliverables(&self) -> StoreResult<Vec<Deliverable>> {
        self.read_records::<Deliverable>(DELIVERABLES_FILE)
    }

    /// Replace the deliverable set.
    ///
    /// Refused once any task exists, since tasks reference deliverables by
    /// number.
    pub fn write_deliverables(&self, deliverables: &[Deliverable]) -> StoreResult<()> {
        let mut inner = self.writer()?;
        self.write_deliverables_held(&mut inner, deliverables)
    }

    fn write_deliverables_held(
        &self,
        inner: &mut Inner,
        deliverables: &[Deliverable],
    ) -> StoreResult<()> {
        let task_count = records_at::<Task>(&inner.root, TASKS_FILE)?.len();
        if task_count > 0 {
            return Err(StoreError::Immutable {
                plan_id: self.plan_id.clone(),
                artifact: DELIVERABLES_FILE.to_string(),
                reason: format!("{task_count} task(s) reference the current deliverables"),
            }
            .into());
        }
        let text = serialize_table(deliverables)?;
        self.write_held(inner, DELIVERABLES_FILE, &text)
    }

    /// Append one deliverable; its number must be the next in sequence.
    pub fn add_deliverable(&self, deliverable: Deliverable) -> StoreResult<u32> {
        let mut inner = self.writer()?;
        let mut all = records_at::<Deliverable>(&inner.root, DELIVERABLES_FILE)?;
        let next = next_number(all.iter().map(|d| d.number));
        if deliverable.number != next {
            return Err(StoreError::InvalidArguments {
                operation: "deliverable-store.add".to_string(),
                reason: format!(
                    "deliverable number must be {next}, got {}",
                    deliverable.number
                ),
            }
            .into());
        }
        all.push(deliverable);
        self.write_deliverables_held(&mut inner, &all)?;
        Ok(next)
    }

    pub fn get_deliverable(&self, number: u32) -> StoreResult<Deliverable> {
        self.read_deliverables()?
            .into_iter()
            .find(|d| d.number == number)
            .ok_or_else(|| self.not_found(format!("deliverable {number}")))
    }

    /// Structural check of the persisted deliverable set.
    pub fn validate_deliverables(&self) -> StoreResult<()> {
        let deliverables = self.read_deliverables()?;
        let issues = deliverable_issues(&deliverables);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new("deliverables", issues).into())
        }
    }

    // ---------------------------------------------------------------------
    // outline
    // ---------------------------------------------------------------------

    pub fn read_outline(&self) -> StoreResult<OutlineDocument> {
        Ok(OutlineDocument::parse(&self.read_required(OUTLINE_FILE)?))
    }

    pub fn write_outline(&self, text: &str) -> StoreResult<()> {
        self.write_managed(OUTLINE_FILE, text)
    }

    /// The outline's headings agree with the persisted deliverables.
    pub fn validate_outline(&self) -> StoreResult<()> {
        let outline = self.read_outline()?;
        outline.check_consistency(&self.read_deliverables()?)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // tasks
    // ---------------------------------------------------------------------

    /// All tasks in id order. Empty before planning.
    pub fn read_tasks(&self) -> StoreResult<Vec<Task>> {
        self.read_records::<Task>(TASKS_FILE)
    }

    pub fn write_tasks(&self, tasks: &[Task]) -> StoreResult<()> {
        let text = serialize_table(tasks)?;
        self.write_managed(TASKS_FILE, &text)
    }

    /// Append a task under the next free id and return that id.
    ///
    /// Dependencies must name existing tasks, so an added task never
    /// references forward.
    pub fn add_task(&self, mut task: Task) -> StoreResult<u32> {
        let mut inner = self.writer()?;
        let mut all = records_at::<Task>(&inner.root, TASKS_FILE)?;
        let id = next_number(all.iter().map(|t| t.id));
        if let Some(missing) = task
            .depends_on
            .iter()
            .find(|dep| !all.iter().any(|t| t.id == **dep))
        {
            return Err(StoreError::InvalidArguments {
                operation: "task-store.add".to_string(),
                reason: format!("task depends on unknown task {missing}"),
            }
            .into());
        }
        if task.skills.is_empty() {
            return Err(ValidationError::single(
                "tasks",
                ValidationIssue::new(
                    format!("task {id}"),
                    "skills",
                    IssueKind::EmptySkills,
                    "a task needs at least one skill",
                ),
            )
            .into());
        }
        task.id = id;
        all.push(task);
        let text = serialize_table(&all)?;
        self.write_held(&mut inner, TASKS_FILE, &text)?;
        Ok(id)
    }

    pub fn get_task(&self, id: u32) -> StoreResult<Task> {
        self.read_tasks()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| self.not_found(format!("task {id}")))
    }

    pub fn update_task_status(&self, id: u32, status: TaskStatus) -> StoreResult<()> {
        let mut inner = self.writer()?;
        let mut tasks = records_at::<Task>(&inner.root, TASKS_FILE)?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| self.not_found(format!("task {id}")))?;
        task.status = status;
        let text = serialize_table(&tasks)?;
        self.write_held(&mut inner, TASKS_FILE, &text)
    }

    /// Structural check of the persisted task set against the deliverables.
    pub fn validate_tasks(&self) -> StoreResult<()> {
        let tasks = self.read_tasks()?;
        let deliverables = self.read_deliverables()?;
        let issues = task_issues(&tasks, &deliverables);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new("tasks", issues).into())
        }
    }

    // ---------------------------------------------------------------------
    // work log
    // ---------------------------------------------------------------------

    pub fn append_log(&self, entry: &LogEntry) -> StoreResult<()> {
        let mut inner = self.writer()?;
        let path = inner.root.join(WORK_LOG_FILE);
        append_line(&path, &entry.to_line()).map_err(|e| io_err(&path, &e))?;
        let hash = file_hash(&path).map_err(|e| io_err(&path, &e))?;
        Self::record(&mut inner, WORK_LOG_FILE, hash)
    }

    /// All log entries, oldest first.
    pub fn read_log(&self) -> StoreResult<Vec<LogEntry>> {
        match self.read_optional(WORK_LOG_FILE)? {
            Some(text) => Ok(worklog::parse_log(&text)?),
            None => Ok(Vec::new()),
        }
    }

    // ---------------------------------------------------------------------
    // compliance and lifecycle
    // ---------------------------------------------------------------------

    /// Verify the plan directory against the manifest.
    ///
    /// Fails with the first violation; the full list is logged.
    pub fn audit(&self) -> StoreResult<()> {
        let inner = self.inner();
        let on_disk = ComplianceManifest::load(&inner.root, &self.plan_id)?;
        if !self.read_only && on_disk != inner.manifest {
            return Err(planwright_utils::error::ComplianceError::ManifestCorrupt {
                plan_id: self.plan_id.clone(),
                reason: "manifest was modified outside the artifact store".to_string(),
            }
            .into());
        }
        let violations = on_disk
            .verify(&inner.root)
            .map_err(|e| io_err(&inner.root, &e))?;
        for violation in &violations {
            tracing::warn!(plan_id = %self.plan_id, violation = %violation, "compliance violation");
        }
        match violations.into_iter().next() {
            Some(first) => Err(first.into()),
            None => Ok(()),
        }
    }

    /// Move the plan directory to `<home>/archive/<plan_id>-<timestamp>`.
    ///
    /// The store stays readable at the new location and refuses writes.
    pub fn archive(&self) -> StoreResult<Utf8PathBuf> {
        let mut inner = self.writer()?;
        let archive_root = archive_dir(&self.home);
        ensure_dir_all(&archive_root).map_err(|e| StoreError::Io {
            path: archive_root.to_string(),
            reason: e.to_string(),
        })?;
        let target = archive_root.join(format!(
            "{}-{}",
            self.plan_id,
            Utc::now().format("%Y%m%dT%H%M%SZ")
        ));
        std::fs::rename(&inner.root, &target).map_err(|e| StoreError::Io {
            path: inner.root.to_string(),
            reason: e.to_string(),
        })?;
        info!(plan_id = %self.plan_id, archive = %target, "plan archived");
        inner.root = target.clone();
        inner.archived = true;
        Ok(target)
    }

    fn read_records<R: TabularRecord>(&self, file: &str) -> StoreResult<Vec<R>> {
        records_at(&self.root(), file)
    }

    fn not_found(&self, artifact: String) -> PlanError {
        StoreError::NotFound {
            plan_id: self.plan_id.clone(),
            artifact,
        }
        .into()
    }
}

fn read_optional_at(path: &Utf8Path) -> StoreResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    read_file_with_crlf_tolerance(path)
        .map(Some)
        .map_err(|e| io_err(path, &e))
}

fn records_at<R: TabularRecord>(root: &Utf8Path, file: &str) -> StoreResult<Vec<R>> {
    match read_optional_at(&root.join(file))? {
        Some(text) => Ok(parse_table(&text)?),
        None => Ok(Vec::new()),
    }
}

fn next_number(existing: impl Iterator<Item = u32>) -> u32 {
    existing.max().unwrap_or(0) + 1
}

fn status_issues(plan_id: &str, status: &PlanStatus) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let issue = |field: &str, detail: String| {
        ValidationIssue::new("status", field, IssueKind::InconsistentStatus, detail)
    };

    if status.plan_id != plan_id {
        issues.push(issue(
            "plan_id",
            format!("expected '{plan_id}', found '{}'", status.plan_id),
        ));
    }

    let names: Vec<PhaseId> = status.phases.iter().map(|p| p.name).collect();
    if names != PhaseId::ALL {
        issues.push(issue(
            "phases",
            "phases must list 1-init through 6-finalize exactly once, in order".to_string(),
        ));
        return issues;
    }

    let current = status.current_phase.phase();
    for state in &status.phases {
        let expected: &[PhaseStatus] = match current {
            None => &[PhaseStatus::Done],
            Some(cur) if state.name < cur => &[PhaseStatus::Done],
            Some(cur) if state.name == cur => &[PhaseStatus::InProgress, PhaseStatus::Blocked],
            Some(_) => &[PhaseStatus::Pending],
        };
        if !expected.contains(&state.status) {
            issues.push(issue(
                "phases",
                format!(
                    "{} is {} while the plan is at {}",
                    state.name, state.status, status.current_phase
                ),
            ));
        }
    }

    let blocked_phase = status
        .phases
        .iter()
        .find(|p| p.status == PhaseStatus::Blocked)
        .map(|p| p.name);
    match (&status.blocked, blocked_phase) {
        (Some(report), Some(phase)) if report.phase != phase => issues.push(issue(
            "blocked",
            format!("report names {} but {phase} is blocked", report.phase),
        )),
        (Some(_), None) => issues.push(issue(
            "blocked",
            "blocked report without a blocked phase".to_string(),
        )),
        (None, Some(phase)) => issues.push(issue(
            "blocked",
            format!("{phase} is blocked without a report"),
        )),
        _ => {}
    }

    if status.current_phase == CurrentPhase::Complete && status.blocked.is_some() {
        issues.push(issue("blocked", "a complete plan cannot be blocked".to_string()));
    }

    issues
}

fn deliverable_issues(deliverables: &[Deliverable]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (idx, d) in deliverables.iter().enumerate() {
        let entity = format!("deliverable {}", d.number);
        let expected = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        if d.number != expected {
            issues.push(ValidationIssue::new(
                &entity,
                "number",
                IssueKind::NonContiguousNumbering,
                format!("expected {expected}"),
            ));
        }
        for dep in &d.depends {
            if *dep == d.number || !deliverables.iter().any(|o| o.number == *dep) {
                issues.push(ValidationIssue::new(
                    &entity,
                    "depends",
                    IssueKind::InvalidDepends,
                    format!("invalid reference to deliverable {dep}"),
                ));
            }
        }
        if d.profiles.is_empty() || d.profiles.iter().any(|p| p.skills.is_empty()) {
            issues.push(ValidationIssue::new(
                &entity,
                "profiles",
                IssueKind::EmptySkills,
                "every profile needs at least one skill",
            ));
        }
    }
    issues
}

fn task_issues(tasks: &[Task], deliverables: &[Deliverable]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (idx, t) in tasks.iter().enumerate() {
        let entity = format!("task {}", t.id);
        let expected = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        if t.id != expected {
            issues.push(ValidationIssue::new(
                &entity,
                "id",
                IssueKind::NonContiguousNumbering,
                format!("expected {expected}"),
            ));
        }
        for dep in &t.depends_on {
            if *dep >= t.id {
                issues.push(ValidationIssue::new(
                    &entity,
                    "depends_on",
                    IssueKind::InvalidTask,
                    format!("references task {dep}, which is not earlier"),
                ));
            }
        }
        if t.skills.is_empty() {
            issues.push(ValidationIssue::new(
                &entity,
                "skills",
                IssueKind::EmptySkills,
                "a task needs at least one skill",
            ));
        }
        for r in &t.deliverable_refs {
            if !deliverables.iter().any(|d| d.number == *r) {
                issues.push(ValidationIssue::new(
                    &entity,
                    "deliverable_refs",
                    IssueKind::InvalidTask,
                    format!("references unknown deliverable {r}"),
                ));
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        ChangeType, ExecutionMode, ProfileSkills, TaskMode, Verification,
    };
    use planwright_utils::error::{ComplianceError, LockError};
    use planwright_utils::paths::with_isolated_home;
    use planwright_utils::types::LogCategory;
    use planwright_utils::types::LogLevel;

    fn deliverable(number: u32, depends: Vec<u32>) -> Deliverable {
        Deliverable {
            number,
            title: format!("Deliverable {number}"),
            change_type: ChangeType::Create,
            execution_mode: ExecutionMode::Automated,
            domain: "java".to_string(),
            module: "core".to_string(),
            profiles: vec![ProfileSkills {
                profile: "implementation".to_string(),
                skills: vec!["java-core".to_string()],
            }],
            depends,
            affected_files: vec![format!("src/main/java/D{number}.java")],
            verification: Verification {
                commands: vec!["mvn -q compile".to_string()],
                criteria: vec![],
            },
        }
    }

    fn task(depends_on: Vec<u32>) -> Task {
        Task {
            id: 0,
            title: "Implement".to_string(),
            deliverable_refs: vec![1],
            domain: "java".to_string(),
            profile: "implementation".to_string(),
            execution_mode: TaskMode::Automated,
            skills: vec!["java-core".to_string()],
            depends_on,
            steps: vec!["src/main/java/D1.java".to_string()],
            verification: Verification::default(),
            status: TaskStatus::Pending,
        }
    }

    #[test]
    fn test_status_round_trip_and_field() {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        assert!(!store.exists());

        let status = PlanStatus::fresh("demo", Utc::now());
        store.write_status(&status).unwrap();
        assert!(store.exists());
        assert_eq!(store.read_status().unwrap(), status);
        assert_eq!(
            store.status_field("current_phase").unwrap(),
            serde_json::json!("1-init")
        );
        assert!(store.status_field("colour").is_err());
        store.validate_status().unwrap();
    }

    #[test]
    fn test_inconsistent_status_rejected() {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        let mut status = PlanStatus::fresh("demo", Utc::now());
        status.current_phase = CurrentPhase::Active(PhaseId::Plan);
        store.write_status(&status).unwrap();

        match store.validate_status() {
            Err(PlanError::Validation(err)) => {
                assert!(err.issues.iter().all(|i| i.kind == IssueKind::InconsistentStatus));
                assert!(!err.issues.is_empty());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_only_store_refuses_writes_and_takes_no_lock() {
        let guard = with_isolated_home();
        let home = guard.home();
        let writer = ArtifactStore::open_writable(&home, "demo").unwrap();
        writer.write_request("Add login").unwrap();

        let reader = ArtifactStore::open_read_only(&home, "demo").unwrap();
        assert_eq!(reader.read_request().unwrap(), "Add login");
        assert!(matches!(
            reader.write_request("x"),
            Err(PlanError::Store(StoreError::ReadOnly { .. }))
        ));
    }

    #[test]
    fn test_second_writer_is_refused() {
        let guard = with_isolated_home();
        let home = guard.home();
        let _writer = ArtifactStore::open_writable(&home, "demo").unwrap();
        assert!(matches!(
            ArtifactStore::open_writable(&home, "demo"),
            Err(PlanError::Lock(LockError::ConcurrentExecution { .. }))
        ));
    }

    #[test]
    fn test_non_canonical_plan_id_rejected() {
        let guard = with_isolated_home();
        assert!(matches!(
            ArtifactStore::open_writable(&guard.home(), "../escape"),
            Err(PlanError::PlanId(_))
        ));
    }

    #[test]
    fn test_deliverables_frozen_once_tasks_exist() {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        store.write_deliverables(&[deliverable(1, vec![])]).unwrap();
        store.add_task(task(vec![])).unwrap();

        assert!(matches!(
            store.write_deliverables(&[deliverable(1, vec![]), deliverable(2, vec![1])]),
            Err(PlanError::Store(StoreError::Immutable { .. }))
        ));
        assert_eq!(store.read_deliverables().unwrap().len(), 1);
    }

    #[test]
    fn test_add_deliverable_requires_next_number() {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        assert_eq!(store.add_deliverable(deliverable(1, vec![])).unwrap(), 1);
        assert!(store.add_deliverable(deliverable(3, vec![])).is_err());
        assert_eq!(store.add_deliverable(deliverable(2, vec![1])).unwrap(), 2);
        assert_eq!(store.get_deliverable(2).unwrap().depends, vec![1]);
        store.validate_deliverables().unwrap();
    }

    #[test]
    fn test_add_task_assigns_ids_and_rejects_unknown_deps() {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        store.write_deliverables(&[deliverable(1, vec![])]).unwrap();

        assert_eq!(store.add_task(task(vec![])).unwrap(), 1);
        assert_eq!(store.add_task(task(vec![1])).unwrap(), 2);
        assert!(store.add_task(task(vec![7])).is_err());

        let mut no_skills = task(vec![]);
        no_skills.skills.clear();
        assert!(matches!(
            store.add_task(no_skills),
            Err(PlanError::Validation(_))
        ));

        store.update_task_status(2, TaskStatus::Done).unwrap();
        assert_eq!(store.get_task(2).unwrap().status, TaskStatus::Done);
        store.validate_tasks().unwrap();
    }

    #[test]
    fn test_concurrent_add_task_keeps_every_task() {
        let guard = with_isolated_home();
        let store = std::sync::Arc::new(
            ArtifactStore::open_writable(&guard.home(), "demo").unwrap(),
        );
        store.write_deliverables(&[deliverable(1, vec![])]).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| store.add_task(task(vec![])).unwrap())
                        .collect::<Vec<u32>>()
                })
            })
            .collect();
        let mut ids: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();

        assert_eq!(ids, (1..=100).collect::<Vec<u32>>());
        let persisted = store.read_tasks().unwrap();
        assert_eq!(persisted.len(), 100);
        assert_eq!(
            persisted.iter().map(|t| t.id).collect::<Vec<_>>(),
            (1..=100).collect::<Vec<u32>>()
        );
        store.audit().unwrap();
    }

    #[test]
    fn test_concurrent_status_updates_are_all_kept() {
        let guard = with_isolated_home();
        let store = std::sync::Arc::new(
            ArtifactStore::open_writable(&guard.home(), "demo").unwrap(),
        );
        store.write_deliverables(&[deliverable(1, vec![])]).unwrap();
        for _ in 0..40 {
            store.add_task(task(vec![])).unwrap();
        }

        let handles: Vec<_> = (0..4u32)
            .map(|worker| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for id in (1..=40).filter(|id| id % 4 == worker) {
                        store.update_task_status(id, TaskStatus::Done).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tasks = store.read_tasks().unwrap();
        assert_eq!(tasks.len(), 40);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Done));
    }

    #[test]
    fn test_log_append_and_read() {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        assert!(store.read_log().unwrap().is_empty());

        let entry = LogEntry::new(
            LogLevel::Info,
            LogCategory::Work,
            CurrentPhase::Active(PhaseId::Init),
            "plan created",
        );
        store.append_log(&entry).unwrap();
        store.append_log(&entry).unwrap();
        assert_eq!(store.read_log().unwrap(), vec![entry.clone(), entry]);
        store.audit().unwrap();
    }

    #[test]
    fn test_audit_detects_tampering() {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        store.write_request("Add login").unwrap();
        store.audit().unwrap();

        std::fs::write(store.root().join(REQUEST_FILE), "Add logout").unwrap();
        assert!(matches!(
            store.audit(),
            Err(PlanError::Compliance(ComplianceError::HashMismatch { .. }))
        ));

        store.write_request("Add login").unwrap();
        std::fs::write(store.root().join("scratch.md"), "notes").unwrap();
        assert!(matches!(
            store.audit(),
            Err(PlanError::Compliance(ComplianceError::UnmanagedFile { .. }))
        ));
    }

    #[test]
    fn test_archive_moves_plan_and_freezes_it() {
        let guard = with_isolated_home();
        let home = guard.home();
        let store = ArtifactStore::open_writable(&home, "demo").unwrap();
        store.write_request("Add login").unwrap();

        let target = store.archive().unwrap();
        assert!(target.starts_with(archive_dir(&home)));
        assert!(!plan_root(&home, "demo").exists());
        assert_eq!(store.read_request().unwrap(), "Add login");
        assert!(store.is_archived());
        assert!(matches!(
            store.write_request("more"),
            Err(PlanError::Store(StoreError::Immutable { .. }))
        ));
    }
}
