//! Shared fakes and builders for the integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use planwright::store::{ChangeType, ExecutionMode, ProfileSkills, Verification};
use planwright::{
    Deliverable, DeliverableCandidate, ExecutionError, Finding, FindingSource, ReviewRequest,
    SkillExecutor, TaskOutcome, TaskRequest,
};

/// Executor that fails chosen tasks a set number of times, then passes.
#[derive(Default)]
pub struct FlakyExecutor {
    failures: Mutex<BTreeMap<u32, u32>>,
    calls: AtomicU32,
    seen_skills: Mutex<Vec<(u32, String)>>,
}

impl FlakyExecutor {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn failing(task_id: u32, times: u32) -> Self {
        let executor = Self::default();
        executor.failures.lock().unwrap().insert(task_id, times);
        executor
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(task id, workflow skill)` for every run, in completion order.
    pub fn seen_skills(&self) -> Vec<(u32, String)> {
        self.seen_skills.lock().unwrap().clone()
    }
}

#[async_trait]
impl SkillExecutor for FlakyExecutor {
    async fn run(&self, request: TaskRequest) -> Result<TaskOutcome, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_skills
            .lock()
            .unwrap()
            .push((request.task.id, request.workflow_skill.clone()));
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&request.task.id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Ok(TaskOutcome::failed(
                    request.task.id,
                    vec!["mvn -q verify exited 1".to_string()],
                ))
            }
            _ => Ok(TaskOutcome::passed(request.task.id)),
        }
    }
}

/// Reviewer that hands out one queued finding list per review.
#[derive(Default)]
pub struct ScriptedReviewer {
    rounds: Mutex<Vec<Vec<Finding>>>,
}

impl ScriptedReviewer {
    pub fn new(rounds: Vec<Vec<Finding>>) -> Self {
        Self {
            rounds: Mutex::new(rounds),
        }
    }
}

#[async_trait]
impl FindingSource for ScriptedReviewer {
    async fn review(&self, _request: ReviewRequest) -> Result<Vec<Finding>, ExecutionError> {
        let mut rounds = self.rounds.lock().unwrap();
        Ok(if rounds.is_empty() {
            Vec::new()
        } else {
            rounds.remove(0)
        })
    }
}

/// A valid java `create`/`automated` candidate touching `files`.
pub fn java_candidate(number: u32, files: &[&str], depends: &str) -> DeliverableCandidate {
    DeliverableCandidate {
        number: Some(number.to_string()),
        title: Some(format!("Deliverable {number}")),
        change_type: Some("create".to_string()),
        execution_mode: Some("automated".to_string()),
        domain: Some("java".to_string()),
        module: Some("web".to_string()),
        profiles: Some(vec![ProfileSkills {
            profile: "implementation".to_string(),
            skills: vec!["java-core".to_string()],
        }]),
        depends: Some(depends.to_string()),
        affected_files: Some(files.iter().map(|f| (*f).to_string()).collect()),
        verification_commands: Some(vec!["mvn -q verify".to_string()]),
        verification_criteria: None,
    }
}

/// A validated java deliverable, for driving the optimizer directly.
pub fn java_deliverable(number: u32, files: &[&str], depends: &[u32]) -> Deliverable {
    Deliverable {
        number,
        title: format!("Deliverable {number}"),
        change_type: ChangeType::Create,
        execution_mode: ExecutionMode::Automated,
        domain: "java".to_string(),
        module: "web".to_string(),
        profiles: vec![ProfileSkills {
            profile: "implementation".to_string(),
            skills: vec!["java-core".to_string()],
        }],
        depends: depends.to_vec(),
        affected_files: files.iter().map(|f| (*f).to_string()).collect(),
        verification: Verification {
            commands: vec!["mvn -q verify".to_string()],
            criteria: Vec::new(),
        },
    }
}
