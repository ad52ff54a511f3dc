use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase identifiers for the plan lifecycle.
///
/// A plan walks these phases strictly forward:
///
/// ```text
/// 1-init → 2-refine → 3-outline → 4-plan → 5-execute → 6-finalize → COMPLETE
/// ```
///
/// Only `5-execute` and `6-finalize` may be re-entered, and only up to the
/// iteration caps held in configuration.
///
/// # Example
///
/// ```rust
/// use planwright_utils::types::PhaseId;
///
/// let phase = PhaseId::Outline;
/// assert_eq!(phase.as_str(), "3-outline");
/// assert_eq!(phase.next(), Some(PhaseId::Plan));
/// assert_eq!(PhaseId::Finalize.next(), None);
/// ```
///
/// # Serialization
///
/// `PhaseId` serializes to its numbered string form (e.g. `"4-plan"`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PhaseId {
    /// Plan created from an opaque request.
    #[serde(rename = "1-init")]
    Init,
    /// Request clarified and refined.
    #[serde(rename = "2-refine")]
    Refine,
    /// Deliverables extracted, validated and graphed.
    #[serde(rename = "3-outline")]
    Outline,
    /// Deliverables compiled into tasks.
    #[serde(rename = "4-plan")]
    Plan,
    /// Tasks delegated to skills in parallel-safe batches.
    #[serde(rename = "5-execute")]
    Execute,
    /// Review findings triaged and fixed.
    #[serde(rename = "6-finalize")]
    Finalize,
}

impl PhaseId {
    /// All phases in lifecycle order.
    pub const ALL: [PhaseId; 6] = [
        Self::Init,
        Self::Refine,
        Self::Outline,
        Self::Plan,
        Self::Execute,
        Self::Finalize,
    ];

    /// Returns the canonical string form used in status records and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "1-init",
            Self::Refine => "2-refine",
            Self::Outline => "3-outline",
            Self::Plan => "4-plan",
            Self::Execute => "5-execute",
            Self::Finalize => "6-finalize",
        }
    }

    /// 1-based ordinal of the phase.
    #[must_use]
    pub const fn ordinal(&self) -> u8 {
        match self {
            Self::Init => 1,
            Self::Refine => 2,
            Self::Outline => 3,
            Self::Plan => 4,
            Self::Execute => 5,
            Self::Finalize => 6,
        }
    }

    /// The phase that follows this one, or `None` when the plan completes.
    #[must_use]
    pub const fn next(&self) -> Option<PhaseId> {
        match self {
            Self::Init => Some(Self::Refine),
            Self::Refine => Some(Self::Outline),
            Self::Outline => Some(Self::Plan),
            Self::Plan => Some(Self::Execute),
            Self::Execute => Some(Self::Finalize),
            Self::Finalize => None,
        }
    }

    /// Whether the phase supports bounded re-entry.
    #[must_use]
    pub const fn is_reentrant(&self) -> bool {
        matches!(self, Self::Execute | Self::Finalize)
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| {
                p.as_str() == trimmed || p.as_str().split_once('-').map(|(_, n)| n) == Some(trimmed)
            })
            .ok_or_else(|| format!("unknown phase '{trimmed}'"))
    }
}

/// Where a plan currently sits in its lifecycle.
///
/// Serialized as the phase string, or `"COMPLETE"` once finalize is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CurrentPhase {
    Active(PhaseId),
    Complete,
}

impl CurrentPhase {
    pub const COMPLETE: &'static str = "COMPLETE";

    #[must_use]
    pub const fn phase(&self) -> Option<PhaseId> {
        match self {
            Self::Active(p) => Some(*p),
            Self::Complete => None,
        }
    }
}

impl fmt::Display for CurrentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active(p) => f.write_str(p.as_str()),
            Self::Complete => f.write_str(Self::COMPLETE),
        }
    }
}

impl From<CurrentPhase> for String {
    fn from(value: CurrentPhase) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for CurrentPhase {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == Self::COMPLETE {
            Ok(Self::Complete)
        } else {
            value.parse().map(Self::Active)
        }
    }
}

/// Status of a single phase within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Done,
    /// Iteration cap reached; waiting on an external decision.
    Blocked,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Per-phase record inside [`PlanStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub name: PhaseId,
    pub status: PhaseStatus,
    pub iteration_count: u32,
}

/// Why a plan stopped at an iteration cap.
///
/// Carries the specific failing verification so a blocked plan never reports
/// a generic failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedReport {
    pub phase: PhaseId,
    pub iteration_count: u32,
    pub failing: Vec<String>,
}

/// The persisted plan record (`status.json`).
///
/// Owned by the phase state machine and only ever mutated through the
/// artifact store's status write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatus {
    pub plan_id: String,
    pub current_phase: CurrentPhase,
    pub phases: Vec<PhaseState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<BlockedReport>,
}

impl PlanStatus {
    /// Status of a freshly initialized plan: `1-init` in progress, all else pending.
    #[must_use]
    pub fn fresh(plan_id: &str, now: DateTime<Utc>) -> Self {
        let phases = PhaseId::ALL
            .into_iter()
            .map(|name| PhaseState {
                name,
                status: if name == PhaseId::Init {
                    PhaseStatus::InProgress
                } else {
                    PhaseStatus::Pending
                },
                iteration_count: 0,
            })
            .collect();

        Self {
            plan_id: plan_id.to_string(),
            current_phase: CurrentPhase::Active(PhaseId::Init),
            phases,
            created_at: now,
            updated_at: now,
            blocked: None,
        }
    }

    #[must_use]
    pub fn phase(&self, id: PhaseId) -> Option<&PhaseState> {
        self.phases.iter().find(|p| p.name == id)
    }

    pub fn phase_mut(&mut self, id: PhaseId) -> Option<&mut PhaseState> {
        self.phases.iter_mut().find(|p| p.name == id)
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }
}

/// Severity of a persisted work-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Error => "ERROR",
        }
    }
}

/// Category of a persisted work-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    /// Orchestration progress.
    Work,
    /// Store operations and other scripted actions.
    Script,
}

impl LogCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Script => "script",
        }
    }
}

/// Source of a configuration value, for attribution in `effective_config()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}
