//! Split pass: deliverables into work units
//!
//! Every `(deliverable, profile)` pair yields at least one unit. Mixed
//! deliverables always split into an automated and a manual half; oversized
//! units split by file concern when enabled.

use planwright_store::{ChangeType, Deliverable, ExecutionMode, TaskMode, Verification};

use crate::resolver::{DeliverablePatterns, FileConcern};

const CONCERN_ORDER: [FileConcern; 4] = [
    FileConcern::Source,
    FileConcern::Test,
    FileConcern::Resource,
    FileConcern::Documentation,
];

/// A slice of one deliverable for one profile, before aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unit {
    pub deliverable: u32,
    pub title: String,
    pub change_type: ChangeType,
    pub domain: String,
    pub profile: String,
    pub mode: TaskMode,
    pub files: Vec<String>,
    /// Manual-judgement steps; empty means the files are the steps
    pub manual_steps: Vec<String>,
    pub verification: Verification,
    /// Produced by a split; split units are never aggregated
    pub split: bool,
    /// Units of the same deliverable this one must follow
    pub after: Vec<usize>,
}

impl Unit {
    pub fn steps(&self) -> Vec<String> {
        if self.manual_steps.is_empty() {
            self.files.clone()
        } else {
            self.manual_steps.clone()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitRules {
    pub split_oversized: bool,
    pub ceiling: usize,
}

/// Append the units of one deliverable to `units`.
pub(crate) fn expand(
    deliverable: &Deliverable,
    patterns: &DeliverablePatterns,
    rules: SplitRules,
    units: &mut Vec<Unit>,
) {
    let multi_profile = deliverable.profiles.len() > 1;
    let mut primary: Vec<usize> = Vec::new();

    for (index, profile) in deliverable.profiles.iter().enumerate() {
        let title = if multi_profile {
            format!("{} [{}]", deliverable.title, profile.profile)
        } else {
            deliverable.title.clone()
        };
        let base = Unit {
            deliverable: deliverable.number,
            title,
            change_type: deliverable.change_type,
            domain: deliverable.domain.clone(),
            profile: profile.profile.clone(),
            mode: TaskMode::Automated,
            files: deliverable.affected_files.clone(),
            manual_steps: Vec::new(),
            verification: deliverable.verification.clone(),
            split: false,
            after: primary.clone(),
        };

        let start = units.len();
        match deliverable.execution_mode {
            ExecutionMode::Automated => push_sized(base, patterns, rules, units),
            ExecutionMode::Manual => push_sized(
                Unit {
                    mode: TaskMode::Manual,
                    ..base
                },
                patterns,
                rules,
                units,
            ),
            ExecutionMode::Mixed => push_mixed(base, patterns, rules, units),
        }
        if index == 0 {
            primary = (start..units.len()).collect();
        }
    }
}

fn push_mixed(base: Unit, patterns: &DeliverablePatterns, rules: SplitRules, units: &mut Vec<Unit>) {
    let criteria = base.verification.criteria.clone();
    let manual_steps = if criteria.is_empty() {
        vec![format!("Manual judgement: confirm {}", base.title)]
    } else {
        criteria
            .iter()
            .map(|c| format!("Manual judgement: {c}"))
            .collect()
    };
    let manual_title = format!("{} (manual judgement)", base.title);

    let automated = Unit {
        title: format!("{} (automated)", base.title),
        verification: Verification {
            commands: base.verification.commands.clone(),
            criteria: Vec::new(),
        },
        split: true,
        ..base.clone()
    };
    let start = units.len();
    push_sized(automated, patterns, rules, units);
    let automated_units: Vec<usize> = (start..units.len()).collect();

    let mut after = base.after;
    after.extend(automated_units);
    units.push(Unit {
        title: manual_title,
        mode: TaskMode::Manual,
        files: Vec::new(),
        manual_steps,
        verification: Verification {
            commands: Vec::new(),
            criteria,
        },
        split: true,
        after,
        ..base
    });
}

/// Push `unit`, splitting it by concern when it exceeds the ceiling.
fn push_sized(unit: Unit, patterns: &DeliverablePatterns, rules: SplitRules, units: &mut Vec<Unit>) {
    if !rules.split_oversized || unit.files.len() <= rules.ceiling {
        units.push(unit);
        return;
    }

    let ceiling = rules.ceiling.max(1);
    let mut source_units: Vec<usize> = Vec::new();
    for concern in CONCERN_ORDER {
        let files: Vec<String> = unit
            .files
            .iter()
            .filter(|f| patterns.classify(f) == concern)
            .cloned()
            .collect();
        if files.is_empty() {
            continue;
        }
        let chunks: Vec<&[String]> = files.chunks(ceiling).collect();
        let total = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            let title = if total > 1 {
                format!("{} ({concern} {}/{total})", unit.title, i + 1)
            } else {
                format!("{} ({concern})", unit.title)
            };
            let mut after = unit.after.clone();
            if concern == FileConcern::Test {
                after.extend(source_units.iter().copied());
            }
            if concern == FileConcern::Source {
                source_units.push(units.len());
            }
            units.push(Unit {
                title,
                files: chunk.to_vec(),
                split: true,
                after,
                ..unit.clone()
            });
        }
    }
}
