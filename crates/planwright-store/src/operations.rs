//! String-addressed operation surface over the artifact store
//!
//! Every query or mutation is addressed as `{component}.{verb}`, e.g.
//! `task-store.add`, and answered with an [`Envelope`]. `dispatch` never
//! returns a Rust error: failures become error envelopes carrying the stable
//! code of the underlying [`PlanError`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::debug;

use planwright_utils::error::{PlanError, StoreError};
use planwright_utils::types::{CurrentPhase, LogCategory, LogLevel, PhaseId, PlanStatus};

use crate::records::{Deliverable, LogEntry, Task};
use crate::store::{ArtifactStore, DELIVERABLES_FILE, TASKS_FILE, WORK_LOG_FILE};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Component {
    StatusStore,
    RequestStore,
    DeliverableStore,
    OutlineStore,
    TaskStore,
    WorkLog,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Verb {
    Read,
    Write,
    Get,
    Add,
    List,
    Validate,
}

impl Component {
    /// Verbs this component answers to.
    #[must_use]
    pub const fn verbs(&self) -> &'static [Verb] {
        match self {
            Self::StatusStore => &[Verb::Read, Verb::Write, Verb::Get, Verb::Validate],
            Self::RequestStore => &[Verb::Read, Verb::Write],
            Self::DeliverableStore | Self::TaskStore => &[
                Verb::Add,
                Verb::Get,
                Verb::List,
                Verb::Validate,
                Verb::Read,
                Verb::Write,
            ],
            Self::OutlineStore => &[Verb::Read, Verb::Write, Verb::Validate],
            Self::WorkLog => &[Verb::Add, Verb::List, Verb::Read],
        }
    }
}

impl Verb {
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Write | Self::Add)
    }
}

/// One addressed request against a plan
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub component: Component,
    pub verb: Verb,
    pub plan_id: String,
    pub args: Value,
}

impl Operation {
    /// Parse a `{component}.{verb}` address.
    ///
    /// ```rust
    /// use planwright_store::operations::{Component, Operation, Verb};
    ///
    /// let op = Operation::parse("task-store.list", "demo", serde_json::Value::Null).unwrap();
    /// assert_eq!(op.component, Component::TaskStore);
    /// assert_eq!(op.verb, Verb::List);
    /// assert!(Operation::parse("task-store.delete", "demo", serde_json::Value::Null).is_err());
    /// ```
    pub fn parse(address: &str, plan_id: &str, args: Value) -> Result<Self, StoreError> {
        let unsupported = || StoreError::UnsupportedOperation {
            operation: address.to_string(),
        };
        let (component, verb) = address.split_once('.').ok_or_else(unsupported)?;
        Ok(Self {
            component: Component::from_str(component).map_err(|_| unsupported())?,
            verb: Verb::from_str(verb).map_err(|_| unsupported())?,
            plan_id: plan_id.to_string(),
            args,
        })
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}.{}", self.component, self.verb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Ok,
    Error,
}

/// Uniform response to an [`Operation`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl Envelope {
    #[must_use]
    pub fn ok(message: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            message: message.into(),
            payload,
            error_code: None,
        }
    }

    #[must_use]
    pub fn error(err: &PlanError) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            message: err.to_string(),
            payload: None,
            error_code: Some(err.error_code().to_string()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == EnvelopeStatus::Ok
    }
}

#[derive(Debug, Deserialize)]
struct ContentArgs {
    content: String,
}

#[derive(Debug, Deserialize)]
struct FieldArgs {
    field: String,
}

#[derive(Debug, Deserialize)]
struct NumberArgs {
    #[serde(alias = "id")]
    number: u32,
}

#[derive(Debug, Deserialize)]
struct LogArgs {
    #[serde(default)]
    level: Option<LogLevel>,
    #[serde(default)]
    category: Option<LogCategory>,
    #[serde(default)]
    phase: Option<CurrentPhase>,
    message: String,
}

/// Execute an operation and wrap the outcome in an envelope.
#[must_use]
pub fn dispatch(store: &ArtifactStore, op: &Operation) -> Envelope {
    let address = op.address();
    match run(store, op) {
        Ok((message, payload)) => {
            debug!(plan_id = %op.plan_id, operation = %address, "operation ok");
            if op.verb.is_mutation() && op.component != Component::WorkLog {
                record_script_entry(store, &address);
            }
            Envelope::ok(message, payload)
        }
        Err(err) => {
            debug!(plan_id = %op.plan_id, operation = %address, error = %err, "operation failed");
            Envelope::error(&err)
        }
    }
}

/// Parse an address and dispatch it in one step.
#[must_use]
pub fn dispatch_address(store: &ArtifactStore, address: &str, args: Value) -> Envelope {
    match Operation::parse(address, store.plan_id(), args) {
        Ok(op) => dispatch(store, &op),
        Err(err) => Envelope::error(&PlanError::from(err)),
    }
}

/// Mutations through the operation surface leave a `script` trail.
fn record_script_entry(store: &ArtifactStore, address: &str) {
    let phase = current_phase(store);
    let entry = LogEntry::new(LogLevel::Info, LogCategory::Script, phase, address.to_string());
    if let Err(err) = store.append_log(&entry) {
        tracing::warn!(plan_id = %store.plan_id(), error = %err, "failed to log operation");
    }
}

fn current_phase(store: &ArtifactStore) -> CurrentPhase {
    store
        .read_status()
        .map(|s| s.current_phase)
        .unwrap_or(CurrentPhase::Active(PhaseId::Init))
}

fn args<T: DeserializeOwned>(op: &Operation) -> Result<T, PlanError> {
    serde_json::from_value(op.args.clone()).map_err(|e| {
        StoreError::InvalidArguments {
            operation: op.address(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn to_payload<T: Serialize>(op: &Operation, value: &T) -> Result<Value, PlanError> {
    serde_json::to_value(value).map_err(|e| {
        StoreError::InvalidArguments {
            operation: op.address(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Accepts either a bare array or `{"<key>": [...]}`.
fn list_args<T: DeserializeOwned>(op: &Operation, key: &str) -> Result<Vec<T>, PlanError> {
    match op.args.get(key) {
        Some(inner) => serde_json::from_value(inner.clone()).map_err(|e| {
            StoreError::InvalidArguments {
                operation: op.address(),
                reason: e.to_string(),
            }
            .into()
        }),
        None => args(op),
    }
}

fn run(store: &ArtifactStore, op: &Operation) -> Result<(String, Option<Value>), PlanError> {
    if op.plan_id != store.plan_id() {
        return Err(StoreError::InvalidArguments {
            operation: op.address(),
            reason: format!(
                "store is open for plan '{}', not '{}'",
                store.plan_id(),
                op.plan_id
            ),
        }
        .into());
    }
    if !op.component.verbs().contains(&op.verb) {
        return Err(StoreError::UnsupportedOperation {
            operation: op.address(),
        }
        .into());
    }

    match (op.component, op.verb) {
        (Component::StatusStore, Verb::Read) => {
            let status = store.read_status()?;
            Ok(("status read".into(), Some(to_payload(op, &status)?)))
        }
        (Component::StatusStore, Verb::Write) => {
            let status: PlanStatus = args(op)?;
            store.write_status(&status)?;
            Ok(("status written".into(), None))
        }
        (Component::StatusStore, Verb::Get) => {
            let FieldArgs { field } = args(op)?;
            let value = store.status_field(&field)?;
            Ok((format!("status field '{field}'"), Some(value)))
        }
        (Component::StatusStore, Verb::Validate) => {
            store.validate_status()?;
            Ok(("status valid".into(), None))
        }

        (Component::RequestStore, Verb::Read) => {
            let content = store.read_request()?;
            Ok(("request read".into(), Some(json!({ "content": content }))))
        }
        (Component::RequestStore, Verb::Write) => {
            let ContentArgs { content } = args(op)?;
            store.write_request(&content)?;
            Ok(("request written".into(), None))
        }

        (Component::DeliverableStore, Verb::Add) => {
            let deliverable: Deliverable = args(op)?;
            let number = store.add_deliverable(deliverable)?;
            Ok((
                format!("deliverable {number} added"),
                Some(json!({ "number": number })),
            ))
        }
        (Component::DeliverableStore, Verb::Get) => {
            let NumberArgs { number } = args(op)?;
            let deliverable = store.get_deliverable(number)?;
            Ok((
                format!("deliverable {number}"),
                Some(to_payload(op, &deliverable)?),
            ))
        }
        (Component::DeliverableStore, Verb::List) => {
            let all = store.read_deliverables()?;
            Ok((
                format!("{} deliverable(s)", all.len()),
                Some(to_payload(op, &all)?),
            ))
        }
        (Component::DeliverableStore, Verb::Validate) => {
            store.validate_deliverables()?;
            Ok(("deliverables valid".into(), None))
        }
        (Component::DeliverableStore, Verb::Read) => {
            let content = store.read_raw(DELIVERABLES_FILE)?;
            Ok(("deliverables read".into(), Some(json!({ "content": content }))))
        }
        (Component::DeliverableStore, Verb::Write) => {
            let all: Vec<Deliverable> = list_args(op, "deliverables")?;
            store.write_deliverables(&all)?;
            Ok((format!("{} deliverable(s) written", all.len()), None))
        }

        (Component::OutlineStore, Verb::Read) => {
            let outline = store.read_outline()?;
            let sections: Vec<Value> = outline
                .sections
                .iter()
                .map(|s| json!({ "number": s.number, "title": s.title }))
                .collect();
            Ok((
                "outline read".into(),
                Some(json!({ "content": outline.text, "sections": sections })),
            ))
        }
        (Component::OutlineStore, Verb::Write) => {
            let ContentArgs { content } = args(op)?;
            store.write_outline(&content)?;
            Ok(("outline written".into(), None))
        }
        (Component::OutlineStore, Verb::Validate) => {
            store.validate_outline()?;
            Ok(("outline consistent".into(), None))
        }

        (Component::TaskStore, Verb::Add) => {
            let task: Task = args(op)?;
            let id = store.add_task(task)?;
            Ok((format!("task {id} added"), Some(json!({ "id": id }))))
        }
        (Component::TaskStore, Verb::Get) => {
            let NumberArgs { number } = args(op)?;
            let task = store.get_task(number)?;
            Ok((format!("task {number}"), Some(to_payload(op, &task)?)))
        }
        (Component::TaskStore, Verb::List) => {
            let all = store.read_tasks()?;
            Ok((format!("{} task(s)", all.len()), Some(to_payload(op, &all)?)))
        }
        (Component::TaskStore, Verb::Validate) => {
            store.validate_tasks()?;
            Ok(("tasks valid".into(), None))
        }
        (Component::TaskStore, Verb::Read) => {
            let content = store.read_raw(TASKS_FILE)?;
            Ok(("tasks read".into(), Some(json!({ "content": content }))))
        }
        (Component::TaskStore, Verb::Write) => {
            let all: Vec<Task> = list_args(op, "tasks")?;
            store.write_tasks(&all)?;
            Ok((format!("{} task(s) written", all.len()), None))
        }

        (Component::WorkLog, Verb::Add) => {
            let LogArgs {
                level,
                category,
                phase,
                message,
            } = args(op)?;
            let entry = LogEntry::new(
                level.unwrap_or(LogLevel::Info),
                category.unwrap_or(LogCategory::Work),
                phase.unwrap_or_else(|| current_phase(store)),
                message,
            );
            store.append_log(&entry)?;
            Ok(("log entry added".into(), None))
        }
        (Component::WorkLog, Verb::List) => {
            let entries = store.read_log()?;
            Ok((
                format!("{} log entr(ies)", entries.len()),
                Some(to_payload(op, &entries)?),
            ))
        }
        (Component::WorkLog, Verb::Read) => {
            let content = store.read_raw(WORK_LOG_FILE)?;
            Ok(("work log read".into(), Some(json!({ "content": content }))))
        }

        _ => Err(StoreError::UnsupportedOperation {
            operation: op.address(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use planwright_utils::paths::with_isolated_home;

    fn store() -> (planwright_utils::paths::HomeGuard, ArtifactStore) {
        let guard = with_isolated_home();
        let store = ArtifactStore::open_writable(&guard.home(), "demo").unwrap();
        (guard, store)
    }

    #[test]
    fn test_address_parsing() {
        let op = Operation::parse("work-log.add", "demo", Value::Null).unwrap();
        assert_eq!(op.address(), "work-log.add");
        for bad in ["work-log", "work-log.delete", "audit-store.read", ""] {
            assert!(
                matches!(
                    Operation::parse(bad, "demo", Value::Null),
                    Err(StoreError::UnsupportedOperation { .. })
                ),
                "{bad} should be unsupported"
            );
        }
    }

    #[test]
    fn test_unsupported_pair_is_error_envelope() {
        let (_g, store) = store();
        let env = dispatch_address(&store, "request-store.list", Value::Null);
        assert_eq!(env.status, EnvelopeStatus::Error);
        assert_eq!(env.error_code.as_deref(), Some("store_error"));

        let env = dispatch_address(&store, "nonsense", Value::Null);
        assert!(!env.is_ok());
    }

    #[test]
    fn test_request_write_then_idempotent_reads() {
        let (_g, store) = store();
        let env = dispatch_address(&store, "request-store.write", json!({ "content": "Add login" }));
        assert!(env.is_ok(), "{env:?}");

        let first = dispatch_address(&store, "request-store.read", Value::Null);
        let second = dispatch_address(&store, "request-store.read", Value::Null);
        assert_eq!(first, second);
        assert_eq!(first.payload, Some(json!({ "content": "Add login" })));
    }

    #[test]
    fn test_status_get_and_validate() {
        let (_g, store) = store();
        let status = PlanStatus::fresh("demo", Utc::now());
        let env = dispatch_address(&store, "status-store.write", serde_json::to_value(&status).unwrap());
        assert!(env.is_ok(), "{env:?}");

        let env = dispatch_address(&store, "status-store.get", json!({ "field": "current_phase" }));
        assert_eq!(env.payload, Some(json!("1-init")));
        assert!(dispatch_address(&store, "status-store.validate", Value::Null).is_ok());
    }

    #[test]
    fn test_task_add_list_and_bad_args() {
        let (_g, store) = store();
        let task = json!({
            "title": "Implement",
            "deliverable_refs": [],
            "domain": "java",
            "profile": "implementation",
            "execution_mode": "automated",
            "skills": ["java-core"],
            "depends_on": [],
            "steps": ["src/main/java/A.java"],
            "verification": { "commands": ["mvn -q compile"] }
        });
        let env = dispatch_address(&store, "task-store.add", task);
        assert_eq!(env.payload, Some(json!({ "id": 1 })));

        let env = dispatch_address(&store, "task-store.list", Value::Null);
        assert_eq!(env.payload.as_ref().and_then(Value::as_array).map(Vec::len), Some(1));

        let env = dispatch_address(&store, "task-store.get", json!({ "id": 9 }));
        assert_eq!(env.error_code.as_deref(), Some("store_error"));

        let env = dispatch_address(&store, "task-store.add", json!({ "title": 3 }));
        assert_eq!(env.status, EnvelopeStatus::Error);
    }

    #[test]
    fn test_mutations_leave_script_entries() {
        let (_g, store) = store();
        dispatch_address(&store, "request-store.write", json!({ "content": "Add login" }));
        dispatch_address(
            &store,
            "work-log.add",
            json!({ "message": "refine: clarified scope" }),
        );

        let entries = store.read_log().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, LogCategory::Script);
        assert_eq!(entries[0].message, "request-store.write");
        assert_eq!(entries[1].category, LogCategory::Work);
    }

    #[test]
    fn test_wrong_plan_is_rejected() {
        let (_g, store) = store();
        let op = Operation::parse("request-store.read", "other", Value::Null).unwrap();
        let env = dispatch(&store, &op);
        assert_eq!(env.error_code.as_deref(), Some("store_error"));
    }
}
