//! Aggregation pass: compatible independent units share one task

use std::collections::BTreeSet;

use crate::graph::DependencyGraph;

use super::split::Unit;

/// Offset for ungrouped units in the tentative group graph.
const UNGROUPED: usize = usize::MAX / 2;

pub(crate) struct Aggregator<'a> {
    pub units: &'a [Unit],
    /// Per unit, the units it depends on
    pub unit_deps: &'a [Vec<usize>],
    pub deliverables: &'a DependencyGraph<u32>,
    pub threshold: usize,
}

impl Aggregator<'_> {
    /// Partition units into groups, first fit, in unit order.
    ///
    /// Groups are numbered by their first unit, and members stay in unit
    /// order, so aggregation never reorders work.
    pub fn group(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of: Vec<Option<usize>> = vec![None; self.units.len()];

        for (u, unit) in self.units.iter().enumerate() {
            let target = if unit.split {
                None
            } else {
                (0..groups.len()).find(|g| {
                    self.compatible(&groups[*g], u) && self.acyclic_with(&group_of, u, *g)
                })
            };
            match target {
                Some(g) => {
                    groups[g].push(u);
                    group_of[u] = Some(g);
                }
                None => {
                    group_of[u] = Some(groups.len());
                    groups.push(vec![u]);
                }
            }
        }
        groups
    }

    fn compatible(&self, group: &[usize], u: usize) -> bool {
        let candidate = &self.units[u];
        let Some(first) = group.first().map(|m| &self.units[*m]) else {
            return false;
        };
        if group.iter().any(|m| self.units[*m].split)
            || first.change_type != candidate.change_type
            || first.domain != candidate.domain
            || first.profile != candidate.profile
            || first.mode != candidate.mode
        {
            return false;
        }

        let files: BTreeSet<&str> = group
            .iter()
            .flat_map(|m| self.units[*m].files.iter())
            .chain(candidate.files.iter())
            .map(String::as_str)
            .collect();
        if files.len() >= self.threshold {
            return false;
        }

        let programs = |unit: &Unit| -> BTreeSet<String> {
            unit.verification
                .command_programs()
                .into_iter()
                .map(str::to_string)
                .collect()
        };
        if programs(first) != programs(candidate) {
            return false;
        }

        group.iter().all(|m| {
            let member = self.units[*m].deliverable;
            member != candidate.deliverable
                && !self.deliverables.reaches(member, candidate.deliverable)
                && !self.deliverables.reaches(candidate.deliverable, member)
        })
    }

    /// Whether the group graph stays acyclic if `u` joins group `g`.
    fn acyclic_with(&self, group_of: &[Option<usize>], u: usize, g: usize) -> bool {
        let node = |unit: usize| -> usize {
            if unit == u {
                g
            } else {
                group_of[unit].unwrap_or(UNGROUPED + unit)
            }
        };
        let mut graph = DependencyGraph::new("task group");
        for (unit, deps) in self.unit_deps.iter().enumerate() {
            let from = node(unit);
            let targets: Vec<usize> = deps
                .iter()
                .map(|d| node(*d))
                .filter(|t| *t != from)
                .collect();
            graph.add_node(from, targets);
        }
        graph.detect_cycle().is_none()
    }
}

/// Group-level graph: a group depends on every group holding a unit that one
/// of its members depends on.
pub(crate) fn group_graph(groups: &[Vec<usize>], unit_deps: &[Vec<usize>]) -> DependencyGraph<usize> {
    let mut group_of = vec![0usize; unit_deps.len()];
    for (g, members) in groups.iter().enumerate() {
        for m in members {
            group_of[*m] = g;
        }
    }
    let mut graph = DependencyGraph::new("task group");
    for (g, members) in groups.iter().enumerate() {
        let deps: Vec<usize> = members
            .iter()
            .flat_map(|m| unit_deps[*m].iter())
            .map(|d| group_of[*d])
            .filter(|t| *t != g)
            .collect();
        graph.add_node(g, deps);
    }
    graph
}
