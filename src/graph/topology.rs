//! petgraph-based directed view over a pipeline graph.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use super::types::PipelineGraph;

/// Component-level topology. Bindings naming unknown components are skipped;
/// callers that care about those check `PipelineGraph::binding_resolves`.
pub struct GraphTopology {
    pub graph: DiGraph<String, (String, String)>,
    pub node_indices: HashMap<String, NodeIndex>,
}

impl GraphTopology {
    pub fn build(pipeline: &PipelineGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for component in &pipeline.components {
            let idx = graph.add_node(component.name.clone());
            node_indices.entry(component.name.clone()).or_insert(idx);
        }

        for binding in &pipeline.bindings {
            let source = node_indices.get(&binding.from_component);
            let target = node_indices.get(&binding.to_component);
            if let (Some(&s), Some(&t)) = (source, target) {
                graph.add_edge(s, t, (binding.from_port.clone(), binding.to_port.clone()));
            }
        }

        GraphTopology {
            graph,
            node_indices,
        }
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.degree(name, Direction::Incoming)
    }

    pub fn out_degree(&self, name: &str) -> usize {
        self.degree(name, Direction::Outgoing)
    }

    fn degree(&self, name: &str, dir: Direction) -> usize {
        self.node_indices
            .get(name)
            .map(|&idx| self.graph.edges_directed(idx, dir).count())
            .unwrap_or(0)
    }

    /// True if `to` is reachable from `from` along bindings.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        match (self.node_indices.get(from), self.node_indices.get(to)) {
            (Some(&a), Some(&b)) => has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// A component on some cycle, if any.
    pub fn cycle_member(&self) -> Option<&str> {
        match toposort(&self.graph, None) {
            Ok(_) => None,
            Err(cycle) => Some(self.graph[cycle.node_id()].as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Binding, Component, ComponentKind};

    fn chain(bindings: Vec<Binding>) -> PipelineGraph {
        PipelineGraph {
            components: ["a", "b", "c"]
                .into_iter()
                .map(|n| Component::new(n, ComponentKind::Transformer))
                .collect(),
            bindings,
            ..Default::default()
        }
    }

    #[test]
    fn test_degrees_and_reachability() {
        let g = chain(vec![
            Binding::new("a", "out", "b", "in"),
            Binding::new("b", "out", "c", "in"),
            Binding::new("a", "out", "ghost", "in"),
        ]);
        let t = GraphTopology::build(&g);
        assert_eq!(t.out_degree("a"), 1);
        assert_eq!(t.in_degree("c"), 1);
        assert!(t.reaches("a", "c"));
        assert!(!t.reaches("c", "a"));
        assert!(!t.is_cyclic());
        assert_eq!(t.cycle_member(), None);
    }

    #[test]
    fn test_cycle_detected() {
        let g = chain(vec![
            Binding::new("a", "out", "b", "in"),
            Binding::new("b", "out", "a", "in"),
        ]);
        let t = GraphTopology::build(&g);
        assert!(t.is_cyclic());
        assert!(matches!(t.cycle_member(), Some("a") | Some("b")));
    }
}
