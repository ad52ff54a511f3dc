//! The `solution_outline.md` narrative document
//!
//! The outline is free-form markdown, but every deliverable owns exactly one
//! numbered `### N. Title` heading. Only those headings are structural.

use regex::Regex;
use std::sync::LazyLock;

use planwright_utils::error::{IssueKind, ValidationError, ValidationIssue};

use crate::records::Deliverable;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^###\s+(\d+)\.\s+(.+?)\s*$").expect("valid heading regex"));

/// One numbered deliverable heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineSection {
    pub number: u32,
    pub title: String,
    /// 1-based line of the heading
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineDocument {
    pub text: String,
    pub sections: Vec<OutlineSection>,
}

impl OutlineDocument {
    /// Parse headings out of an outline. Non-heading text is kept verbatim.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let sections = text
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let caps = HEADING.captures(line)?;
                let number = caps[1].parse().ok()?;
                Some(OutlineSection {
                    number,
                    title: caps[2].to_string(),
                    line: idx + 1,
                })
            })
            .collect();
        Self {
            text: text.to_string(),
            sections,
        }
    }

    /// Render a skeleton outline with one section per deliverable.
    #[must_use]
    pub fn render(title: &str, deliverables: &[Deliverable]) -> Self {
        let mut text = format!("# {title}\n");
        for d in deliverables {
            text.push_str(&format!("\n### {}. {}\n\n", d.number, d.title));
            text.push_str(&format!(
                "- Change: {} ({})\n- Domain: {} / {}\n",
                d.change_type, d.execution_mode, d.domain, d.module
            ));
            if !d.affected_files.is_empty() {
                text.push_str("- Files:\n");
                for file in &d.affected_files {
                    text.push_str(&format!("  - `{file}`\n"));
                }
            }
        }
        Self::parse(&text)
    }

    /// Check the headings against the deliverable set.
    ///
    /// Heading numbers must run 1..=n without gaps and agree with the
    /// deliverables on number and title.
    pub fn check_consistency(&self, deliverables: &[Deliverable]) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let issue = |entity: String, detail: String| {
            ValidationIssue::new(entity, "solution_outline", IssueKind::InconsistentOutline, detail)
        };

        for (idx, section) in self.sections.iter().enumerate() {
            let expected = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            if section.number != expected {
                issues.push(issue(
                    format!("heading at line {}", section.line),
                    format!("expected section {expected}, found {}", section.number),
                ));
            }
        }

        if self.sections.len() != deliverables.len() {
            issues.push(issue(
                "outline".to_string(),
                format!(
                    "{} section(s) for {} deliverable(s)",
                    self.sections.len(),
                    deliverables.len()
                ),
            ));
        }

        for d in deliverables {
            match self.sections.iter().find(|s| s.number == d.number) {
                None => issues.push(issue(
                    format!("deliverable {}", d.number),
                    "has no outline section".to_string(),
                )),
                Some(section) if section.title.trim() != d.title.trim() => issues.push(issue(
                    format!("deliverable {}", d.number),
                    format!(
                        "outline titles it '{}', deliverable says '{}'",
                        section.title, d.title
                    ),
                )),
                Some(_) => {}
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new("solution outline", issues))
        }
    }
}
