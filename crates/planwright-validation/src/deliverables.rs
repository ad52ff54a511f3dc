use std::collections::BTreeSet;
use std::str::FromStr;

use planwright_config::{Config, SYSTEM_DOMAIN};
use planwright_store::{ChangeType, Deliverable, ExecutionMode, ProfileSkills, Verification};
use planwright_utils::error::{IssueKind, ValidationError, ValidationIssue};

use crate::candidate::DeliverableCandidate;
use crate::rules::{file_reference_problem, is_vague_verification, parse_depends};

/// Validates extracted deliverable candidates as one atomic set.
///
/// Every candidate is checked against every rule and all issues are
/// collected; a single issue rejects the whole set.
#[derive(Debug, Clone)]
pub struct DeliverableValidator {
    domains: BTreeSet<String>,
}

/// Per-candidate accumulator
struct Checker<'a> {
    entity: String,
    issues: &'a mut Vec<ValidationIssue>,
}

impl Checker<'_> {
    fn push(&mut self, field: &str, kind: IssueKind, detail: impl Into<String>) {
        self.issues
            .push(ValidationIssue::new(&self.entity, field, kind, detail));
    }

    /// Trimmed, non-blank value of a required scalar field.
    fn required<'c>(&mut self, field: &str, value: Option<&'c String>) -> Option<&'c str> {
        match value.map(|v| v.trim()) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.push(field, IssueKind::MissingField, format!("{field} is required"));
                None
            }
        }
    }

    fn enumerated<T: FromStr>(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) -> Option<T> {
        let raw = value?;
        T::from_str(raw).ok().or_else(|| {
            self.push(
                field,
                IssueKind::InvalidEnum,
                format!("'{raw}' is not one of {}", allowed.join(", ")),
            );
            None
        })
    }
}

impl DeliverableValidator {
    /// Validator accepting the domains configured in `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_domains(config.domain_names())
    }

    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate the candidate set and return the deliverables in number order.
    pub fn validate(
        &self,
        candidates: &[DeliverableCandidate],
    ) -> Result<Vec<Deliverable>, ValidationError> {
        let mut issues = Vec::new();
        let numbers = self.check_numbering(candidates, &mut issues);

        let mut accepted = Vec::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            if let Some(d) = self.check_candidate(idx, candidate, &numbers, &mut issues) {
                accepted.push(d);
            }
        }

        if issues.is_empty() {
            accepted.sort_by_key(|d| d.number);
            tracing::debug!(count = accepted.len(), "deliverable set accepted");
            Ok(accepted)
        } else {
            tracing::debug!(issues = issues.len(), "deliverable set rejected");
            Err(ValidationError::new("deliverables", issues))
        }
    }

    /// Numbers must parse, be unique, and run 1..=n.
    fn check_numbering(
        &self,
        candidates: &[DeliverableCandidate],
        issues: &mut Vec<ValidationIssue>,
    ) -> BTreeSet<u32> {
        let mut seen = BTreeSet::new();
        for (idx, c) in candidates.iter().enumerate() {
            let Some(raw) = c.number.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            match raw.trim_end_matches('.').parse::<u32>() {
                Ok(n) if n > 0 => {
                    if !seen.insert(n) {
                        issues.push(ValidationIssue::new(
                            format!("deliverable {n}"),
                            "number",
                            IssueKind::DuplicateNumber,
                            format!("number {n} is used more than once"),
                        ));
                    }
                }
                _ => issues.push(ValidationIssue::new(
                    format!("candidate {}", idx + 1),
                    "number",
                    IssueKind::NonContiguousNumbering,
                    format!("'{raw}' is not a positive integer"),
                )),
            }
        }

        let expected: BTreeSet<u32> = (1..=u32::try_from(seen.len()).unwrap_or(u32::MAX)).collect();
        if seen != expected {
            let missing: Vec<String> = expected.difference(&seen).map(u32::to_string).collect();
            issues.push(ValidationIssue::new(
                "deliverables",
                "number",
                IssueKind::NonContiguousNumbering,
                format!(
                    "numbers must run from 1 without gaps; missing {}",
                    missing.join(", ")
                ),
            ));
        }
        seen
    }

    fn check_candidate(
        &self,
        idx: usize,
        c: &DeliverableCandidate,
        numbers: &BTreeSet<u32>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Deliverable> {
        let number = c
            .number
            .as_deref()
            .and_then(|n| n.trim().trim_end_matches('.').parse::<u32>().ok());
        let entity = number.map_or_else(
            || format!("candidate {}", idx + 1),
            |n| format!("deliverable {n}"),
        );
        let mut ck = Checker { entity, issues };

        if c.number.as_deref().is_none_or(|n| n.trim().is_empty()) {
            ck.push("number", IssueKind::MissingField, "number is required");
        }
        let title = ck.required("title", c.title.as_ref());
        let change_raw = ck.required("change_type", c.change_type.as_ref());
        let mode_raw = ck.required("execution_mode", c.execution_mode.as_ref());
        let domain = ck.required("domain", c.domain.as_ref());
        let module = ck.required("module", c.module.as_ref());
        let depends_raw = ck.required("depends", c.depends.as_ref());

        let change_type: Option<ChangeType> = ck.enumerated(
            "change_type",
            change_raw,
            <ChangeType as strum::VariantNames>::VARIANTS,
        );
        let execution_mode: Option<ExecutionMode> = ck.enumerated(
            "execution_mode",
            mode_raw,
            <ExecutionMode as strum::VariantNames>::VARIANTS,
        );

        if let Some(domain) = domain {
            if domain.eq_ignore_ascii_case(SYSTEM_DOMAIN) {
                ck.push(
                    "domain",
                    IssueKind::SystemDomain,
                    format!("'{domain}' is reserved for internal use"),
                );
            } else if !self.domains.contains(domain) {
                ck.push(
                    "domain",
                    IssueKind::UnknownDomain,
                    format!(
                        "'{domain}' is not a configured domain ({})",
                        self.domains.iter().cloned().collect::<Vec<_>>().join(", ")
                    ),
                );
            }
        }

        let depends = depends_raw.and_then(|raw| match parse_depends(raw) {
            Ok(deps) => Some(deps),
            Err(reason) => {
                ck.push("depends", IssueKind::InvalidDepends, reason);
                None
            }
        });
        if let Some(deps) = &depends {
            for dep in deps {
                if Some(*dep) == number {
                    ck.push(
                        "depends",
                        IssueKind::InvalidDepends,
                        format!("deliverable {dep} depends on itself"),
                    );
                } else if !numbers.contains(dep) {
                    ck.push(
                        "depends",
                        IssueKind::InvalidDepends,
                        format!("deliverable {dep} does not exist"),
                    );
                }
            }
        }

        let profiles = check_profiles(&mut ck, c.profiles.as_deref());
        let files = check_files(&mut ck, c.affected_files.as_deref());
        let verification = check_verification(&mut ck, c, execution_mode);

        Some(Deliverable {
            number: number?,
            title: title?.to_string(),
            change_type: change_type?,
            execution_mode: execution_mode?,
            domain: domain?.to_string(),
            module: module?.to_string(),
            profiles: profiles?,
            depends: depends?,
            affected_files: files?,
            verification: verification?,
        })
    }
}

fn check_profiles(ck: &mut Checker<'_>, profiles: Option<&[ProfileSkills]>) -> Option<Vec<ProfileSkills>> {
    let Some(profiles) = profiles.filter(|p| !p.is_empty()) else {
        ck.push("profiles", IssueKind::MissingField, "at least one profile is required");
        return None;
    };
    let mut ok = true;
    for p in profiles {
        if p.profile.trim().is_empty() {
            ck.push("profiles", IssueKind::MissingField, "profile name is blank");
            ok = false;
        }
        if p.skills.iter().all(|s| s.trim().is_empty()) {
            ck.push(
                "profiles",
                IssueKind::EmptySkills,
                format!("profile '{}' has no skills", p.profile),
            );
            ok = false;
        }
    }
    ok.then(|| profiles.to_vec())
}

fn check_files(ck: &mut Checker<'_>, files: Option<&[String]>) -> Option<Vec<String>> {
    let Some(files) = files.filter(|f| !f.is_empty()) else {
        ck.push(
            "affected_files",
            IssueKind::MissingField,
            "at least one affected file is required",
        );
        return None;
    };
    let mut ok = true;
    for file in files {
        if let Some(problem) = file_reference_problem(file) {
            ck.push("affected_files", IssueKind::VagueFileReference, problem);
            ok = false;
        }
    }
    ok.then(|| files.iter().map(|f| f.trim().to_string()).collect())
}

fn check_verification(
    ck: &mut Checker<'_>,
    c: &DeliverableCandidate,
    mode: Option<ExecutionMode>,
) -> Option<Verification> {
    let commands: Vec<String> = c
        .verification_commands
        .iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let criteria: Vec<String> = c
        .verification_criteria
        .iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if commands.is_empty() && criteria.is_empty() {
        ck.push("verification", IssueKind::MissingField, "verification is required");
        return None;
    }

    let mut ok = true;
    match mode {
        Some(ExecutionMode::Automated | ExecutionMode::Mixed) => {
            if commands.is_empty() {
                ck.push(
                    "verification",
                    IssueKind::VagueVerification,
                    "automated work needs at least one verification command",
                );
                ok = false;
            }
            for text in commands.iter().chain(&criteria) {
                if is_vague_verification(text) {
                    ck.push(
                        "verification",
                        IssueKind::VagueVerification,
                        format!("'{text}' is not acceptable for automatable work"),
                    );
                    ok = false;
                }
            }
        }
        Some(ExecutionMode::Manual) => {
            if criteria.is_empty() {
                ck.push(
                    "verification",
                    IssueKind::MissingField,
                    "manual work needs at least one judgement criterion",
                );
                ok = false;
            }
        }
        None => ok = false,
    }

    ok.then_some(Verification { commands, criteria })
}
