//! Dependency closure and wave planning.
//!
//! Resolves the registered units reachable from a set of roots into a
//! directed graph (edges run from dependency to dependent) and groups them
//! into waves: a unit's wave is one more than the deepest wave among its
//! registered dependencies, so units within a wave never depend on each
//! other.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::BuildError;
use crate::registry::Registry;
use crate::unit::BuildUnit;

/// The registered dependency closure of one or more root units.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<Arc<BuildUnit>, ()>,
    nodes: HashMap<String, NodeIndex>,
    /// Registration index per node, used to order units within a wave.
    order: HashMap<NodeIndex, usize>,
}

impl DependencyGraph {
    /// Resolves the closure of `roots` through `registry`.
    ///
    /// Roots must be registered. Dependencies that are not registered are
    /// external artifacts and are left out of the graph.
    pub fn resolve(registry: &Registry, roots: &[&str]) -> Result<Self, BuildError> {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        let mut order = HashMap::new();
        let mut queue = VecDeque::new();

        for root in roots {
            let unit = registry.get(root)?;
            if !nodes.contains_key(*root) {
                let idx = graph.add_node(Arc::clone(&unit));
                nodes.insert(root.to_string(), idx);
                order.insert(idx, registry.position(root).unwrap_or(usize::MAX));
                queue.push_back(unit);
            }
        }

        while let Some(unit) = queue.pop_front() {
            let dependent = nodes[unit.name()];
            for dep in &unit.spec().dependencies {
                let idx = match nodes.get(dep) {
                    Some(idx) => *idx,
                    None => match registry.lookup(dep) {
                        Some(dep_unit) => {
                            let idx = graph.add_node(Arc::clone(&dep_unit));
                            nodes.insert(dep.clone(), idx);
                            order.insert(idx, registry.position(dep).unwrap_or(usize::MAX));
                            queue.push_back(dep_unit);
                            idx
                        }
                        None => {
                            tracing::debug!(unit = %unit.name(), dependency = %dep, "external dependency");
                            continue;
                        }
                    },
                };
                graph.update_edge(idx, dependent, ());
            }
        }

        let dag = Self { graph, nodes, order };
        dag.verify_acyclic()?;
        Ok(dag)
    }

    fn verify_acyclic(&self) -> Result<(), BuildError> {
        let Err(cycle) = toposort(&self.graph, None) else {
            return Ok(());
        };
        let culprit = cycle.node_id();
        let mut units: Vec<String> = kosaraju_scc(&self.graph)
            .into_iter()
            .find(|component| component.contains(&culprit))
            .unwrap_or_else(|| vec![culprit])
            .into_iter()
            .map(|idx| self.graph[idx].name().to_string())
            .collect();
        units.sort();
        Err(BuildError::Cycle { units })
    }

    /// Number of units in the closure.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the closure is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns `true` if `name` is part of the closure.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Groups the closure into dependency waves.
    ///
    /// Every unit appears in exactly one wave, after all of its registered
    /// dependencies. Within a wave units are in registration order.
    pub fn waves(&self) -> Vec<Vec<Arc<BuildUnit>>> {
        let mut level: HashMap<NodeIndex, usize> = HashMap::new();
        // The graph is acyclic, checked at construction.
        let sorted = toposort(&self.graph, None).unwrap_or_default();
        for idx in &sorted {
            let depth = self
                .graph
                .neighbors_directed(*idx, Direction::Incoming)
                .filter_map(|dep| level.get(&dep))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level.insert(*idx, depth);
        }

        let depth = level.values().copied().max().map_or(0, |m| m + 1);
        let mut waves: Vec<Vec<NodeIndex>> = vec![Vec::new(); depth];
        for (idx, l) in level {
            waves[l].push(idx);
        }
        waves
            .into_iter()
            .map(|mut wave| {
                wave.sort_by_key(|idx| (self.order[idx], self.graph[*idx].name().to_string()));
                wave.into_iter().map(|idx| Arc::clone(&self.graph[idx])).collect()
            })
            .collect()
    }
}
