use planwright_config::{Config, SYSTEM_DOMAIN};
use planwright_store::{Deliverable, Task};
use planwright_utils::error::{IssueKind, ValidationError, ValidationIssue};

/// Order-preserving union of the skills `profile` carries across `refs`.
#[must_use]
pub fn union_skills(deliverables: &[Deliverable], refs: &[u32], profile: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for number in refs {
        let Some(skills) = deliverables
            .iter()
            .find(|d| d.number == *number)
            .and_then(|d| d.skills_for(profile))
        else {
            continue;
        };
        for skill in skills {
            if !out.contains(skill) {
                out.push(skill.clone());
            }
        }
    }
    out
}

/// Check a task set against its deliverables and the configured domains.
///
/// Graph properties (acyclicity, ordering) are checked by the engine; this
/// covers coverage, references, domains and the frozen skill snapshot.
pub fn validate_tasks(
    tasks: &[Task],
    deliverables: &[Deliverable],
    config: &Config,
) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    if tasks.is_empty() {
        issues.push(ValidationIssue::new(
            "tasks",
            "tasks",
            IssueKind::InvalidTask,
            "the task set is empty",
        ));
    }

    for d in deliverables {
        if !tasks.iter().any(|t| t.deliverable_refs.contains(&d.number)) {
            issues.push(ValidationIssue::new(
                format!("deliverable {}", d.number),
                "deliverable_refs",
                IssueKind::InvalidTask,
                "no task covers this deliverable",
            ));
        }
    }

    for t in tasks {
        let entity = format!("task {}", t.id);
        if t.domain == SYSTEM_DOMAIN {
            issues.push(ValidationIssue::new(
                &entity,
                "domain",
                IssueKind::SystemDomain,
                "tasks may not run in the system domain",
            ));
        } else if !config.is_configured_domain(&t.domain) {
            issues.push(ValidationIssue::new(
                &entity,
                "domain",
                IssueKind::UnknownDomain,
                format!("'{}' is not a configured domain", t.domain),
            ));
        }

        if t.skills.is_empty() {
            issues.push(ValidationIssue::new(
                &entity,
                "skills",
                IssueKind::EmptySkills,
                "a task needs at least one skill",
            ));
        }

        if let Some(missing) = t
            .deliverable_refs
            .iter()
            .find(|r| !deliverables.iter().any(|d| d.number == **r))
        {
            issues.push(ValidationIssue::new(
                &entity,
                "deliverable_refs",
                IssueKind::InvalidTask,
                format!("references unknown deliverable {missing}"),
            ));
            continue;
        }

        let expected = union_skills(deliverables, &t.deliverable_refs, &t.profile);
        if !t.deliverable_refs.is_empty() && !t.skills.is_empty() && t.skills != expected {
            issues.push(ValidationIssue::new(
                &entity,
                "skills",
                IssueKind::InvalidTask,
                format!(
                    "skills [{}] differ from the deliverable skills [{}] for profile '{}'",
                    t.skills.join(", "),
                    expected.join(", "),
                    t.profile
                ),
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("tasks", issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planwright_store::{
        ChangeType, ExecutionMode, ProfileSkills, TaskMode, TaskStatus, Verification,
    };

    fn deliverable(number: u32, skills: &[&str]) -> Deliverable {
        Deliverable {
            number,
            title: format!("D{number}"),
            change_type: ChangeType::Create,
            execution_mode: ExecutionMode::Automated,
            domain: "java".to_string(),
            module: "core".to_string(),
            profiles: vec![ProfileSkills {
                profile: "implementation".to_string(),
                skills: skills.iter().map(ToString::to_string).collect(),
            }],
            depends: vec![],
            affected_files: vec![format!("src/D{number}.java")],
            verification: Verification::default(),
        }
    }

    fn task(id: u32, refs: Vec<u32>, skills: &[&str]) -> Task {
        Task {
            id,
            title: format!("T{id}"),
            deliverable_refs: refs,
            domain: "java".to_string(),
            profile: "implementation".to_string(),
            execution_mode: TaskMode::Automated,
            skills: skills.iter().map(ToString::to_string).collect(),
            depends_on: vec![],
            steps: vec![],
            verification: Verification::default(),
            status: TaskStatus::Pending,
        }
    }

    #[test]
    fn test_union_preserves_order() {
        let ds = vec![deliverable(1, &["a", "b"]), deliverable(2, &["c", "a"])];
        assert_eq!(union_skills(&ds, &[1, 2], "implementation"), vec!["a", "b", "c"]);
        assert!(union_skills(&ds, &[1], "testing").is_empty());
    }

    #[test]
    fn test_valid_set() {
        let config = Config::minimal_for_testing();
        let ds = vec![deliverable(1, &["a"]), deliverable(2, &["b"])];
        let ts = vec![task(1, vec![1, 2], &["a", "b"])];
        validate_tasks(&ts, &ds, &config).unwrap();
    }

    #[test]
    fn test_coverage_domain_and_snapshot_issues() {
        let config = Config::minimal_for_testing();
        let ds = vec![deliverable(1, &["a"]), deliverable(2, &["b"])];
        let mut system = task(1, vec![1], &["a"]);
        system.domain = SYSTEM_DOMAIN.to_string();
        let drifted = task(2, vec![1], &["a", "z"]);

        let err = validate_tasks(&[system, drifted], &ds, &config).unwrap_err();
        let kinds: Vec<IssueKind> = err.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::InvalidTask, IssueKind::SystemDomain, IssueKind::InvalidTask]
        );
        assert!(err.issues[0].entity == "deliverable 2");
    }

    #[test]
    fn test_empty_set_rejected() {
        let config = Config::minimal_for_testing();
        assert!(validate_tasks(&[], &[], &config).is_err());
    }
}
