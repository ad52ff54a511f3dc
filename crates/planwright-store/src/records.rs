//! Plan records persisted by the artifact store

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use planwright_utils::types::{CurrentPhase, LogCategory, LogLevel};

/// Kind of change a deliverable makes
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChangeType {
    Create,
    Modify,
    Refactor,
    Migrate,
    Delete,
}

/// How a deliverable's work is verified and carried out
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExecutionMode {
    Automated,
    Manual,
    /// Both automated work and manual judgement; always split into two tasks.
    Mixed,
}

/// Execution mode of a single task. Mixed work never survives optimization.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskMode {
    Automated,
    Manual,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Failed,
}

/// Skills attached to one profile of a deliverable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSkills {
    pub profile: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Runnable checks, e.g. `mvn -q test`
    #[serde(default)]
    pub commands: Vec<String>,
    /// Judgement criteria for manual review
    #[serde(default)]
    pub criteria: Vec<String>,
}

impl Verification {
    /// Distinct programs (first token of each command), in first-seen order.
    #[must_use]
    pub fn command_programs(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for program in self
            .commands
            .iter()
            .filter_map(|c| c.split_whitespace().next())
        {
            if !out.contains(&program) {
                out.push(program);
            }
        }
        out
    }
}

/// A validated unit of requested work.
///
/// Created by the outline step and immutable once tasks reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub number: u32,
    pub title: String,
    pub change_type: ChangeType,
    pub execution_mode: ExecutionMode,
    pub domain: String,
    pub module: String,
    /// Ordered; the first profile is the primary one.
    pub profiles: Vec<ProfileSkills>,
    pub depends: Vec<u32>,
    pub affected_files: Vec<String>,
    pub verification: Verification,
}

impl Deliverable {
    /// Skills for `profile`, if the deliverable carries that profile.
    #[must_use]
    pub fn skills_for(&self, profile: &str) -> Option<&[String]> {
        self.profiles
            .iter()
            .find(|p| p.profile == profile)
            .map(|p| p.skills.as_slice())
    }
}

/// A committable, independently verifiable unit of execution.
///
/// `skills` is a snapshot taken when the task was created and is never
/// re-resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Assigned by the store on `add`.
    #[serde(default)]
    pub id: u32,
    pub title: String,
    pub deliverable_refs: Vec<u32>,
    pub domain: String,
    pub profile: String,
    pub execution_mode: TaskMode,
    pub skills: Vec<String>,
    pub depends_on: Vec<u32>,
    pub steps: Vec<String>,
    pub verification: Verification,
    #[serde(default)]
    pub status: TaskStatus,
}

/// One line of the append-only work log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: LogCategory,
    pub phase: CurrentPhase,
    pub message: String,
}

impl LogEntry {
    #[must_use]
    pub fn new(
        level: LogLevel,
        category: LogCategory,
        phase: CurrentPhase,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().trunc_subsecs(0),
            level,
            category,
            phase,
            message: message.into(),
        }
    }

    /// Renders `2026-10-18T10:00:00Z [INFO] (work) [4-plan] message`.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{} [{}] ({}) [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level.as_str(),
            self.category.as_str(),
            self.phase,
            crate::codec::escape_cell(&self.message),
        )
    }
}
