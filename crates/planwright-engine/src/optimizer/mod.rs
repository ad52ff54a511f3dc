//! Task optimizer: validated deliverables into an ordered task set
//!
//! The optimizer runs in four steps:
//!
//! 1. **Split**: one unit per `(deliverable, profile)`; mixed deliverables
//!    always become an automated and a manual unit, oversized units split
//!    by file concern.
//! 2. **Aggregate**: compatible units with no dependency path between their
//!    deliverables share one task.
//! 3. **Project**: deliverable dependencies become task dependencies.
//! 4. **Emit**: tasks are numbered in topological order, so no task ever
//!    references a later one.
//!
//! Skills are copied from the source deliverables, never re-resolved.

mod aggregate;
mod split;

use planwright_config::Config;
use planwright_store::{Deliverable, Task, TaskStatus, Verification};
use planwright_utils::error::{IssueKind, PlanError, ValidationError, ValidationIssue};
use planwright_utils::types::PhaseId;
use planwright_validation::{union_skills, validate_tasks};
use tracing::debug;

use crate::graph::DependencyGraph;
use crate::resolver::DomainResolver;

use aggregate::{Aggregator, group_graph};
use split::{SplitRules, Unit};

/// Compiles deliverables into tasks using configured thresholds.
pub struct TaskOptimizer<'a> {
    config: &'a Config,
    resolver: &'a DomainResolver,
}

impl<'a> TaskOptimizer<'a> {
    #[must_use]
    pub const fn new(config: &'a Config, resolver: &'a DomainResolver) -> Self {
        Self { config, resolver }
    }

    /// Compile `deliverables` into tasks numbered from 1.
    ///
    /// # Errors
    ///
    /// - [`GraphError`](planwright_utils::error::GraphError) when the
    ///   deliverable graph is cyclic or references unknown deliverables
    /// - [`ResolutionError`](planwright_utils::error::ResolutionError) when a
    ///   task domain has no `5-execute` workflow skill
    /// - [`ValidationError`] when a task would carry no skills
    pub fn optimize(&self, deliverables: &[Deliverable]) -> Result<Vec<Task>, PlanError> {
        let mut ordered = deliverables.to_vec();
        ordered.sort_by_key(|d| d.number);

        let deliverable_graph = deliverable_graph(&ordered);
        deliverable_graph.validate()?;

        let rules = SplitRules {
            split_oversized: self.config.split_oversized(),
            ceiling: self.config.split_ceiling(),
        };
        let mut units: Vec<Unit> = Vec::new();
        for deliverable in &ordered {
            let patterns = self.resolver.deliverable_patterns(&deliverable.domain)?;
            split::expand(deliverable, &patterns, rules, &mut units);
        }

        let unit_deps = unit_dependencies(&units, &ordered);
        let groups = Aggregator {
            units: &units,
            unit_deps: &unit_deps,
            deliverables: &deliverable_graph,
            threshold: self.config.aggregation_threshold(),
        }
        .group();

        let order = group_graph(&groups, &unit_deps).topological_order()?;
        let mut task_id_of_group = vec![0u32; groups.len()];
        for (position, group) in order.iter().enumerate() {
            task_id_of_group[*group] = task_number(position);
        }
        let mut group_of_unit = vec![0usize; units.len()];
        for (g, members) in groups.iter().enumerate() {
            for m in members {
                group_of_unit[*m] = g;
            }
        }

        let mut tasks = Vec::with_capacity(groups.len());
        for group in &order {
            let members: Vec<&Unit> = groups[*group].iter().map(|m| &units[*m]).collect();
            let mut depends_on: Vec<u32> = groups[*group]
                .iter()
                .flat_map(|m| unit_deps[*m].iter())
                .map(|d| task_id_of_group[group_of_unit[*d]])
                .filter(|id| *id != task_id_of_group[*group])
                .collect();
            depends_on.sort_unstable();
            depends_on.dedup();
            tasks.push(build_task(
                task_id_of_group[*group],
                &members,
                depends_on,
                &ordered,
            )?);
        }

        self.check(&tasks, &ordered)?;
        debug!(
            deliverables = ordered.len(),
            units = units.len(),
            tasks = tasks.len(),
            "deliverables compiled into tasks"
        );
        Ok(tasks)
    }

    /// Re-check the emitted set: ordering, execute skills and the frozen
    /// skill snapshot.
    fn check(&self, tasks: &[Task], deliverables: &[Deliverable]) -> Result<(), PlanError> {
        let graph = task_graph(tasks);
        graph.validate()?;
        graph.check_no_forward_references()?;

        for task in tasks {
            self.resolver.resolve(&task.domain, PhaseId::Execute)?;
        }
        validate_tasks(tasks, deliverables, self.config)?;
        Ok(())
    }
}

/// Deliverable graph in number order.
#[must_use]
pub fn deliverable_graph(deliverables: &[Deliverable]) -> DependencyGraph<u32> {
    DependencyGraph::from_pairs(
        "deliverable",
        deliverables.iter().map(|d| (d.number, d.depends.clone())),
    )
}

/// Task graph in id order.
#[must_use]
pub fn task_graph(tasks: &[Task]) -> DependencyGraph<u32> {
    DependencyGraph::from_pairs("task", tasks.iter().map(|t| (t.id, t.depends_on.clone())))
}

fn task_number(position: usize) -> u32 {
    u32::try_from(position + 1).unwrap_or(u32::MAX)
}

/// Per unit: its intra-deliverable predecessors plus every unit of every
/// deliverable its deliverable depends on.
fn unit_dependencies(units: &[Unit], deliverables: &[Deliverable]) -> Vec<Vec<usize>> {
    units
        .iter()
        .map(|unit| {
            let depends = deliverables
                .iter()
                .find(|d| d.number == unit.deliverable)
                .map(|d| d.depends.as_slice())
                .unwrap_or_default();
            let mut deps = unit.after.clone();
            deps.extend(
                units
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| depends.contains(&other.deliverable))
                    .map(|(i, _)| i),
            );
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect()
}

fn push_unique(out: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
}

fn build_task(
    id: u32,
    members: &[&Unit],
    depends_on: Vec<u32>,
    deliverables: &[Deliverable],
) -> Result<Task, PlanError> {
    let Some(first) = members.first() else {
        return Err(ValidationError::single(
            "tasks",
            ValidationIssue::new(
                format!("task {id}"),
                "deliverable_refs",
                IssueKind::InvalidTask,
                "task has no source deliverable",
            ),
        )
        .into());
    };

    let mut deliverable_refs: Vec<u32> = Vec::new();
    let mut steps = Vec::new();
    let mut verification = Verification::default();
    let mut titles: Vec<&str> = Vec::new();
    for unit in members {
        if !deliverable_refs.contains(&unit.deliverable) {
            deliverable_refs.push(unit.deliverable);
        }
        push_unique(&mut steps, &unit.steps());
        push_unique(&mut verification.commands, &unit.verification.commands);
        push_unique(&mut verification.criteria, &unit.verification.criteria);
        titles.push(&unit.title);
    }

    let skills = union_skills(deliverables, &deliverable_refs, &first.profile);
    if skills.is_empty() {
        return Err(ValidationError::single(
            "tasks",
            ValidationIssue::new(
                format!("task {id}"),
                "skills",
                IssueKind::EmptySkills,
                format!(
                    "deliverables {deliverable_refs:?} carry no skills for profile '{}'",
                    first.profile
                ),
            ),
        )
        .into());
    }

    Ok(Task {
        id,
        title: titles.join(" + "),
        deliverable_refs,
        domain: first.domain.clone(),
        profile: first.profile.clone(),
        execution_mode: first.mode,
        skills,
        depends_on,
        steps,
        verification,
        status: TaskStatus::Pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use planwright_store::{ChangeType, ExecutionMode, ProfileSkills, TaskMode};
    use planwright_utils::error::{GraphError, ResolutionError};

    fn deliverable(number: u32, files: &[&str], depends: &[u32]) -> Deliverable {
        Deliverable {
            number,
            title: format!("Deliverable {number}"),
            change_type: ChangeType::Create,
            execution_mode: ExecutionMode::Automated,
            domain: "java".to_string(),
            module: "core".to_string(),
            profiles: vec![ProfileSkills {
                profile: "implementation".to_string(),
                skills: vec!["java-core".to_string()],
            }],
            depends: depends.to_vec(),
            affected_files: files.iter().map(|f| (*f).to_string()).collect(),
            verification: Verification {
                commands: vec!["mvn -q test".to_string()],
                criteria: Vec::new(),
            },
        }
    }

    fn optimize(config: &Config, deliverables: &[Deliverable]) -> Result<Vec<Task>, PlanError> {
        let resolver = DomainResolver::from_config(config);
        TaskOptimizer::new(config, &resolver).optimize(deliverables)
    }

    #[test]
    fn test_independent_compatible_deliverables_aggregate() {
        let config = Config::minimal_for_testing();
        let tasks = optimize(
            &config,
            &[deliverable(1, &["A.java"], &[]), deliverable(2, &["B.java"], &[])],
        )
        .unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, 1);
        assert_eq!(tasks[0].deliverable_refs, vec![1, 2]);
        assert_eq!(tasks[0].steps, vec!["A.java", "B.java"]);
        assert_eq!(tasks[0].skills, vec!["java-core"]);
        assert_eq!(tasks[0].verification.commands, vec!["mvn -q test"]);
    }

    #[test]
    fn test_dependent_deliverables_never_aggregate() {
        let config = Config::minimal_for_testing();
        let tasks = optimize(
            &config,
            &[
                deliverable(1, &["A.java", "A2.java", "A3.java"], &[]),
                deliverable(2, &["B.java", "B2.java", "B3.java"], &[1]),
            ],
        )
        .unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].deliverable_refs, vec![1]);
        assert_eq!(tasks[1].deliverable_refs, vec![2]);
        assert_eq!(tasks[1].depends_on, vec![1]);
    }

    #[test]
    fn test_transitive_dependency_blocks_aggregation() {
        let config = Config::minimal_for_testing();
        let mut three = deliverable(3, &["C.java"], &[2]);
        three.change_type = ChangeType::Create;
        let mut two = deliverable(2, &["B.java"], &[1]);
        two.change_type = ChangeType::Modify;
        let tasks = optimize(&config, &[deliverable(1, &["A.java"], &[]), two, three]).unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.deliverable_refs.len() == 1));
    }

    #[test]
    fn test_mixed_deliverable_yields_two_tasks() {
        let config = Config::minimal_for_testing();
        let mut mixed = deliverable(3, &["C.java", "C_test.java"], &[]);
        mixed.number = 1;
        mixed.change_type = ChangeType::Modify;
        mixed.execution_mode = ExecutionMode::Mixed;
        mixed.verification.criteria = vec!["Error copy reviewed by product".to_string()];

        let tasks = optimize(&config, &[mixed]).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.deliverable_refs == vec![1]));
        assert_eq!(tasks[0].execution_mode, TaskMode::Automated);
        assert_eq!(tasks[1].execution_mode, TaskMode::Manual);
        assert_eq!(tasks[1].depends_on, vec![1]);
        assert_eq!(
            tasks[1].steps,
            vec!["Manual judgement: Error copy reviewed by product"]
        );
    }

    #[test]
    fn test_threshold_is_strict_and_configurable() {
        let mut config = Config::minimal_for_testing();
        config.optimizer.aggregation_threshold = Some(2);
        let tasks = optimize(
            &config,
            &[deliverable(1, &["A.java"], &[]), deliverable(2, &["B.java"], &[])],
        )
        .unwrap();
        // combined count 2 is not below 2
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_different_verification_programs_do_not_merge() {
        let config = Config::minimal_for_testing();
        let mut two = deliverable(2, &["B.java"], &[]);
        two.verification.commands = vec!["gradle test".to_string()];
        let tasks = optimize(&config, &[deliverable(1, &["A.java"], &[]), two]).unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_aggregation_keeps_order_and_projects_edges() {
        let config = Config::minimal_for_testing();
        let mut three = deliverable(3, &["C.java"], &[1]);
        three.change_type = ChangeType::Modify;
        let tasks = optimize(
            &config,
            &[
                deliverable(1, &["A.java"], &[]),
                deliverable(2, &["B.java"], &[]),
                three,
            ],
        )
        .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].deliverable_refs, vec![1, 2]);
        assert_eq!(tasks[1].deliverable_refs, vec![3]);
        assert_eq!(tasks[1].depends_on, vec![1]);
    }

    #[test]
    fn test_forward_deliverable_reference_orders_tasks() {
        let config = Config::minimal_for_testing();
        let mut one = deliverable(1, &["A.java"], &[2]);
        one.change_type = ChangeType::Modify;
        let tasks = optimize(&config, &[one, deliverable(2, &["B.java"], &[])]).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].deliverable_refs, vec![2]);
        assert_eq!(tasks[1].deliverable_refs, vec![1]);
        assert_eq!(tasks[1].depends_on, vec![1]);
    }

    #[test]
    fn test_cycle_rejected_before_tasks() {
        let config = Config::minimal_for_testing();
        let result = optimize(
            &config,
            &[deliverable(1, &["A.java"], &[2]), deliverable(2, &["B.java"], &[1])],
        );
        assert!(matches!(result, Err(PlanError::Graph(GraphError::Cycle { .. }))));
    }

    #[test]
    fn test_missing_execute_skill_is_resolution_error() {
        let mut config = Config::minimal_for_testing();
        config.workflow.remove("5-execute");
        let result = optimize(&config, &[deliverable(1, &["A.java"], &[])]);
        assert!(matches!(
            result,
            Err(PlanError::Resolution(ResolutionError::NoWorkflowSkill { .. }))
        ));
    }

    #[test]
    fn test_empty_profile_skills_rejected() {
        let config = Config::minimal_for_testing();
        let mut one = deliverable(1, &["A.java"], &[]);
        one.profiles[0].skills.clear();
        let result = optimize(&config, &[one]);
        assert!(matches!(result, Err(PlanError::Validation(_))));
    }

    #[test]
    fn test_skill_union_across_profiles() {
        let config = Config::minimal_for_testing();
        let mut one = deliverable(1, &["A.java"], &[]);
        one.profiles[0].skills = vec!["java-core".to_string(), "java-web".to_string()];
        let mut two = deliverable(2, &["B.java"], &[]);
        two.profiles[0].skills = vec!["java-web".to_string(), "java-jpa".to_string()];
        two.profiles.push(ProfileSkills {
            profile: "testing".to_string(),
            skills: vec!["junit".to_string()],
        });

        let tasks = optimize(&config, &[one, two]).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].skills, vec!["java-core", "java-web", "java-jpa"]);
        assert_eq!(tasks[1].profile, "testing");
        assert_eq!(tasks[1].skills, vec!["junit"]);
        assert_eq!(tasks[1].depends_on, vec![1]);
    }
}
