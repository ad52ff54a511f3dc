use serde::{Deserialize, Serialize};

use planwright_store::{Deliverable, ProfileSkills};

/// A deliverable as extracted from free text, before validation.
///
/// Scalar fields arrive as raw strings; nothing is trusted until
/// [`crate::DeliverableValidator::validate`] accepts the whole set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverableCandidate {
    pub number: Option<String>,
    pub title: Option<String>,
    pub change_type: Option<String>,
    pub execution_mode: Option<String>,
    pub domain: Option<String>,
    pub module: Option<String>,
    pub profiles: Option<Vec<ProfileSkills>>,
    /// `none`, `N`, `N. Title` or `N, M, ...`
    pub depends: Option<String>,
    pub affected_files: Option<Vec<String>>,
    pub verification_commands: Option<Vec<String>>,
    pub verification_criteria: Option<Vec<String>>,
}

impl From<&Deliverable> for DeliverableCandidate {
    fn from(d: &Deliverable) -> Self {
        let depends = if d.depends.is_empty() {
            "none".to_string()
        } else {
            d.depends
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self {
            number: Some(d.number.to_string()),
            title: Some(d.title.clone()),
            change_type: Some(d.change_type.to_string()),
            execution_mode: Some(d.execution_mode.to_string()),
            domain: Some(d.domain.clone()),
            module: Some(d.module.clone()),
            profiles: Some(d.profiles.clone()),
            depends: Some(depends),
            affected_files: Some(d.affected_files.clone()),
            verification_commands: Some(d.verification.commands.clone()),
            verification_criteria: Some(d.verification.criteria.clone()),
        }
    }
}
