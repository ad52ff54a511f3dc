//! Review findings and their per-domain triage

use serde::{Deserialize, Serialize};

/// One issue reported by an external review of the plan's work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub domain: String,
    /// Rule or check identifier, used in suppression annotations
    pub rule: String,
    pub severity: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Task whose work produced the finding, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u32>,
}

impl Finding {
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        rule: impl Into<String>,
        severity: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            rule: rule.into(),
            severity: severity.into(),
            message: message.into(),
            file: None,
            task_id: None,
        }
    }

    #[must_use]
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    #[must_use]
    pub fn from_task(mut self, task_id: u32) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// `rule: message (file)` form used in task steps and blocked reports.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.file {
            Some(file) => format!("{}: {} ({file})", self.rule, self.message),
            None => format!("{}: {}", self.rule, self.message),
        }
    }
}

/// What to do about a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TriageDecision {
    /// Code must change; becomes a fix task.
    Fix,
    /// Silence in code with the domain's annotation.
    Suppress { annotation: String },
    /// Leave as is.
    Accept,
}

impl TriageDecision {
    #[must_use]
    pub const fn requires_fix(&self) -> bool {
        matches!(self, Self::Fix)
    }
}
