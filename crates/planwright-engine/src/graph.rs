//! Dependency graphs over deliverables and tasks
//!
//! Edges point from a node to the nodes it depends on. Node order is the
//! order nodes were added; every traversal breaks ties by it, so all output
//! is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use planwright_utils::error::GraphError;

#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    kind: &'static str,
    nodes: Vec<K>,
    deps: BTreeMap<K, Vec<K>>,
}

impl<K: Ord + Copy + Display> DependencyGraph<K> {
    /// Empty graph whose nodes are reported as `{kind} {id}`.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            deps: BTreeMap::new(),
        }
    }

    /// Build from `(node, dependencies)` pairs, in node order.
    ///
    /// ```rust
    /// use planwright_engine::graph::DependencyGraph;
    ///
    /// let graph = DependencyGraph::from_pairs("deliverable", [(1, vec![]), (2, vec![1]), (3, vec![1])]);
    /// assert_eq!(graph.parallel_batches().unwrap(), vec![vec![1], vec![2, 3]]);
    /// ```
    pub fn from_pairs<I>(kind: &'static str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<K>)>,
    {
        let mut graph = Self::new(kind);
        for (node, deps) in pairs {
            graph.add_node(node, deps);
        }
        graph
    }

    /// Add a node, merging dependencies if it already exists.
    pub fn add_node(&mut self, node: K, deps: Vec<K>) {
        if !self.deps.contains_key(&node) {
            self.nodes.push(node);
        }
        let entry = self.deps.entry(node).or_default();
        for dep in deps {
            if !entry.contains(&dep) {
                entry.push(dep);
            }
        }
    }

    pub fn add_edge(&mut self, node: K, dep: K) {
        self.add_node(node, vec![dep]);
    }

    #[must_use]
    pub fn nodes(&self) -> &[K] {
        &self.nodes
    }

    #[must_use]
    pub fn dependencies(&self, node: K) -> &[K] {
        self.deps.get(&node).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, node: K) -> bool {
        self.deps.contains_key(&node)
    }

    fn label(&self, node: K) -> String {
        format!("{} {node}", self.kind)
    }

    /// First cycle found by depth-first search, as a closed path.
    ///
    /// The path starts and ends with the same node, e.g. `[1, 2, 1]`.
    #[must_use]
    pub fn detect_cycle(&self) -> Option<Vec<K>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<K: Ord + Copy>(
            node: K,
            deps: &BTreeMap<K, Vec<K>>,
            marks: &mut BTreeMap<K, Mark>,
            stack: &mut Vec<K>,
        ) -> Option<Vec<K>> {
            match marks.get(&node) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                    let mut path = stack[start..].to_vec();
                    path.push(node);
                    return Some(path);
                }
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            stack.push(node);
            for dep in deps.get(&node).into_iter().flatten() {
                if !deps.contains_key(dep) {
                    continue;
                }
                if let Some(cycle) = visit(*dep, deps, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        self.nodes
            .iter()
            .find_map(|node| visit(*node, &self.deps, &mut marks, &mut stack))
    }

    /// Unknown references, self references and cycles, in that order.
    pub fn validate(&self) -> Result<(), GraphError> {
        for node in &self.nodes {
            for dep in self.dependencies(*node) {
                if dep == node {
                    return Err(GraphError::SelfReference {
                        node: self.label(*node),
                    });
                }
                if !self.deps.contains_key(dep) {
                    return Err(GraphError::UnknownReference {
                        node: self.label(*node),
                        missing: self.label(*dep),
                    });
                }
            }
        }
        if let Some(cycle) = self.detect_cycle() {
            return Err(GraphError::Cycle {
                path: cycle.into_iter().map(|n| self.label(n)).collect(),
            });
        }
        Ok(())
    }

    /// Kahn layers: each batch holds nodes whose dependencies all sit in
    /// earlier batches. Members of a batch are mutually independent.
    pub fn parallel_batches(&self) -> Result<Vec<Vec<K>>, GraphError> {
        self.validate()?;

        let mut remaining: Vec<K> = self.nodes.clone();
        let mut placed: BTreeSet<K> = BTreeSet::new();
        let mut batches = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<K>, Vec<K>) = remaining
                .into_iter()
                .partition(|n| self.dependencies(*n).iter().all(|d| placed.contains(d)));
            if ready.is_empty() {
                // validate() rules this out; report the leftover as a cycle.
                return Err(GraphError::Cycle {
                    path: blocked.iter().map(|n| self.label(*n)).collect(),
                });
            }
            placed.extend(ready.iter().copied());
            batches.push(ready);
            remaining = blocked;
        }
        Ok(batches)
    }

    /// Deterministic topological order: dependencies first, ties by node order.
    pub fn topological_order(&self) -> Result<Vec<K>, GraphError> {
        self.validate()?;

        let mut emitted: BTreeSet<K> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let next = self.nodes.iter().copied().find(|n| {
                !emitted.contains(n) && self.dependencies(*n).iter().all(|d| emitted.contains(d))
            });
            match next {
                Some(node) => {
                    emitted.insert(node);
                    order.push(node);
                }
                None => {
                    return Err(GraphError::Cycle {
                        path: self
                            .nodes
                            .iter()
                            .filter(|n| !emitted.contains(n))
                            .map(|n| self.label(*n))
                            .collect(),
                    });
                }
            }
        }
        Ok(order)
    }

    /// Whether `from` depends on `to`, directly or transitively.
    #[must_use]
    pub fn reaches(&self, from: K, to: K) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            for dep in self.dependencies(node) {
                if *dep == to {
                    return true;
                }
                if seen.insert(*dep) {
                    stack.push(*dep);
                }
            }
        }
        false
    }

    /// Every dependency must appear earlier in node order.
    pub fn check_no_forward_references(&self) -> Result<(), GraphError> {
        let position: BTreeMap<K, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, i))
            .collect();
        for (idx, node) in self.nodes.iter().enumerate() {
            for dep in self.dependencies(*node) {
                match position.get(dep) {
                    Some(p) if *p < idx => {}
                    Some(_) => {
                        return Err(GraphError::ForwardReference {
                            node: self.label(*node),
                            target: self.label(*dep),
                        });
                    }
                    None => {
                        return Err(GraphError::UnknownReference {
                            node: self.label(*node),
                            missing: self.label(*dep),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn graph(pairs: &[(u32, &[u32])]) -> DependencyGraph<u32> {
        DependencyGraph::from_pairs("task", pairs.iter().map(|(n, d)| (*n, d.to_vec())))
    }

    #[test]
    fn test_detects_cycle_path() {
        let g = graph(&[(1, &[3]), (2, &[1]), (3, &[2])]);
        let cycle = g.detect_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        match g.validate() {
            Err(GraphError::Cycle { path }) => assert_eq!(path[0], "task 1"),
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(g.parallel_batches().is_err());
        assert!(g.topological_order().is_err());
    }

    #[test]
    fn test_unknown_and_self_references() {
        assert!(matches!(
            graph(&[(1, &[9])]).validate(),
            Err(GraphError::UnknownReference { .. })
        ));
        assert!(matches!(
            graph(&[(1, &[1])]).validate(),
            Err(GraphError::SelfReference { .. })
        ));
    }

    #[test]
    fn test_batches_and_order_are_deterministic() {
        let g = graph(&[(1, &[]), (2, &[]), (3, &[1, 2]), (4, &[1]), (5, &[3, 4])]);
        assert_eq!(
            g.parallel_batches().unwrap(),
            vec![vec![1, 2], vec![3, 4], vec![5]]
        );
        assert_eq!(g.topological_order().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_topological_order_respects_node_order_ties() {
        let g = graph(&[(3, &[]), (1, &[3]), (2, &[])]);
        assert_eq!(g.topological_order().unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn test_reaches() {
        let g = graph(&[(1, &[]), (2, &[1]), (3, &[2]), (4, &[])]);
        assert!(g.reaches(3, 1));
        assert!(!g.reaches(1, 3));
        assert!(!g.reaches(4, 1));
    }

    #[test]
    fn test_forward_references() {
        assert!(graph(&[(1, &[]), (2, &[1])]).check_no_forward_references().is_ok());
        assert!(matches!(
            graph(&[(1, &[2]), (2, &[])]).check_no_forward_references(),
            Err(GraphError::ForwardReference { .. })
        ));
    }

    fn config() -> ProptestConfig {
        let cases = std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64);
        ProptestConfig {
            cases,
            ..ProptestConfig::default()
        }
    }

    /// DAGs where every node depends only on lower-numbered nodes.
    fn arb_dag() -> impl Strategy<Value = Vec<(u32, Vec<u32>)>> {
        (1usize..12).prop_flat_map(|n| {
            let per_node: Vec<_> = (1..=n)
                .map(|i| prop::collection::vec(1..=u32::try_from(i).unwrap_or(1), 0..3))
                .collect();
            per_node.prop_map(|deps| {
                deps.into_iter()
                    .enumerate()
                    .map(|(i, d)| {
                        let node = u32::try_from(i + 1).unwrap();
                        (node, d.into_iter().filter(|x| *x < node).collect())
                    })
                    .collect()
            })
        })
    }

    proptest! {
        #![proptest_config(config())]

        #[test]
        fn prop_batches_respect_dependencies(pairs in arb_dag()) {
            let g = DependencyGraph::from_pairs("task", pairs);
            prop_assert!(g.detect_cycle().is_none());
            let batches = g.parallel_batches().unwrap();
            let mut batch_of = BTreeMap::new();
            for (i, batch) in batches.iter().enumerate() {
                for n in batch {
                    batch_of.insert(*n, i);
                }
            }
            prop_assert_eq!(batch_of.len(), g.nodes().len());
            for n in g.nodes() {
                for d in g.dependencies(*n) {
                    prop_assert!(batch_of[d] < batch_of[n]);
                }
            }
            let order = g.topological_order().unwrap();
            for (i, n) in order.iter().enumerate() {
                for d in g.dependencies(*n) {
                    prop_assert!(order[..i].contains(d));
                }
            }
        }

        #[test]
        fn prop_back_edge_creates_cycle(pairs in arb_dag()) {
            let mut g = DependencyGraph::from_pairs("task", pairs);
            let last = *g.nodes().last().unwrap();
            if last > 1 && g.reaches(last, 1) {
                g.add_edge(1, last);
                prop_assert!(g.detect_cycle().is_some());
                prop_assert!(g.validate().is_err());
            }
        }
    }
}
