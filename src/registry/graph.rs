// src/registry/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

/// Module dependency graph built from the `requires` declarations.
///
/// Edge direction: required -> requiring. For a module `b` declaring
/// `requires = ["a"]` the graph holds `a -> b`, so the outgoing neighbours
/// of a module are the modules that depend on it.
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    graph: DiGraphMap<&'a str, ()>,
}

impl<'a> DependencyGraph<'a> {
    pub fn build(requires: &'a BTreeMap<String, Vec<String>>) -> Self {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in requires.keys() {
            graph.add_node(name.as_str());
        }
        for (name, deps) in requires {
            for dep in deps {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        Self { graph }
    }

    /// Required module names that are not in `loaded`, sorted and distinct.
    pub fn missing(&self, loaded: impl Fn(&str) -> bool) -> Vec<String> {
        self.graph
            .nodes()
            .filter(|node| !loaded(node))
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Modules that directly require `module`, sorted.
    pub fn dependents_of(&self, module: &str) -> Vec<String> {
        let Some(node) = self.graph.nodes().find(|n| *n == module) else {
            return Vec::new();
        };
        let mut dependents: Vec<String> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(str::to_string)
            .collect();
        dependents.sort();
        dependents
    }

    /// A dependency-first ordering of every module, or `None` on a cycle.
    pub fn load_order(&self) -> Option<Vec<String>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(str::to_string).collect())
    }
}
