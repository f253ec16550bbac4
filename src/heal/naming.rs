//! Naming pass: canonical identifiers for components and ports, with every
//! rename cascaded through the bindings.

use std::collections::{HashMap, HashSet};

use super::text::canonical_identifier;
use super::{HealingOperation, OperationKind, OperationLog};
use crate::graph::{PipelineGraph, Port};

/// Give later duplicates a numeric suffix. Bindings keep pointing at the
/// first holder of the name.
pub fn disambiguate_duplicates(graph: &mut PipelineGraph, log: &mut OperationLog) {
    let mut taken: HashSet<String> = HashSet::new();
    let all: HashSet<String> = graph.components.iter().map(|c| c.name.clone()).collect();

    for component in graph.components.iter_mut() {
        if taken.insert(component.name.clone()) {
            continue;
        }
        let renamed = unique_name(&component.name, |n| taken.contains(n) || all.contains(n));
        log.record(
            HealingOperation::new(
                OperationKind::ComponentRenamed,
                &renamed,
                format!("renamed duplicate component '{}' to '{}'", component.name, renamed),
            )
            .change(component.name.clone(), renamed.clone()),
        );
        taken.insert(renamed.clone());
        component.name = renamed;
    }
}

pub fn normalize_names(graph: &mut PipelineGraph, log: &mut OperationLog) {
    rename_components(graph, log);
    rename_ports(graph, log);
}

fn rename_components(graph: &mut PipelineGraph, log: &mut OperationLog) {
    // names that are already canonical keep priority over renamed ones
    let mut taken: HashSet<String> = graph
        .components
        .iter()
        .filter(|c| canonical_identifier(&c.name) == c.name)
        .map(|c| c.name.clone())
        .collect();

    let mut renames: HashMap<String, String> = HashMap::new();
    for component in graph.components.iter_mut() {
        let canonical = canonical_identifier(&component.name);
        if canonical == component.name {
            continue;
        }
        let target = unique_name(&canonical, |n| taken.contains(n));
        taken.insert(target.clone());
        log.record(
            HealingOperation::new(
                OperationKind::ComponentRenamed,
                &target,
                format!("renamed component '{}' to '{}'", component.name, target),
            )
            .change(component.name.clone(), target.clone()),
        );
        renames.insert(component.name.clone(), target.clone());
        component.name = target;
    }

    if renames.is_empty() {
        return;
    }
    for binding in graph.bindings.iter_mut() {
        if let Some(n) = renames.get(&binding.from_component) {
            binding.from_component = n.clone();
        }
        if let Some(n) = renames.get(&binding.to_component) {
            binding.to_component = n.clone();
        }
    }
}

fn rename_ports(graph: &mut PipelineGraph, log: &mut OperationLog) {
    for i in 0..graph.components.len() {
        let component = graph.components[i].name.clone();
        let out_renames = canonicalize_ports(&mut graph.components[i].outputs, &component, log);
        let in_renames = canonicalize_ports(&mut graph.components[i].inputs, &component, log);

        for binding in graph.bindings.iter_mut() {
            if binding.from_component == component {
                if let Some(n) = out_renames.get(&binding.from_port) {
                    binding.from_port = n.clone();
                }
            }
            if binding.to_component == component {
                if let Some(n) = in_renames.get(&binding.to_port) {
                    binding.to_port = n.clone();
                }
            }
        }
    }
}

/// Canonicalize one direction's port list. Only the first port holding an
/// old name is recorded in the returned rename map, and only when no port
/// kept that name.
fn canonicalize_ports(
    ports: &mut [Port],
    component: &str,
    log: &mut OperationLog,
) -> HashMap<String, String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut first_seen: HashSet<String> = HashSet::new();
    for p in ports.iter() {
        if canonical_identifier(&p.name) == p.name && first_seen.insert(p.name.clone()) {
            taken.insert(p.name.clone());
        }
    }

    let mut renames = HashMap::new();
    let mut kept: HashSet<String> = HashSet::new();
    let mut stayed: HashSet<String> = HashSet::new();
    for port in ports.iter_mut() {
        let canonical = canonical_identifier(&port.name);
        if canonical == port.name && kept.insert(port.name.clone()) {
            stayed.insert(port.name.clone());
            continue;
        }
        let target = unique_name(&canonical, |n| taken.contains(n));
        taken.insert(target.clone());
        kept.insert(target.clone());
        log.record(
            HealingOperation::new(
                OperationKind::PortRenamed,
                component,
                format!("renamed port '{}' to '{}'", port.name, target),
            )
            .change(port.name.clone(), target.clone()),
        );
        // bindings on a name that stayed put keep pointing at that port
        if !stayed.contains(&port.name) {
            renames.entry(port.name.clone()).or_insert_with(|| target.clone());
        }
        port.name = target;
    }
    renames
}

/// `base`, or `base_2`, `base_3`… whichever is free first.
fn unique_name<F>(base: &str, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Binding, Component, ComponentKind, PortType};

    #[test]
    fn test_renames_cascade_through_bindings() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("OrderAPI", ComponentKind::ApiEndpoint)
                    .with_output("outStream", PortType::Object),
                Component::new("order store", ComponentKind::Store)
                    .with_input("in", PortType::Object),
            ],
            bindings: vec![Binding::new("OrderAPI", "outStream", "order store", "in")],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        normalize_names(&mut g, &mut log);
        assert_eq!(g.names(), vec!["order_api", "order_store"]);
        assert_eq!(
            g.bindings,
            vec![Binding::new("order_api", "out_stream", "order_store", "in")]
        );
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_collision_keeps_canonical_holder() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("UserData", ComponentKind::Source),
                Component::new("user_data", ComponentKind::Sink),
            ],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        normalize_names(&mut g, &mut log);
        assert_eq!(g.names(), vec!["user_data_2", "user_data"]);
    }

    #[test]
    fn test_duplicates_disambiguated() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("feed", ComponentKind::Source),
                Component::new("feed", ComponentKind::Sink),
            ],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        disambiguate_duplicates(&mut g, &mut log);
        assert_eq!(g.names(), vec!["feed", "feed_2"]);
    }

    #[test]
    fn test_duplicate_port_does_not_steal_bindings() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("reader", ComponentKind::Source).with_output("out", PortType::Object),
                Component::new("writer", ComponentKind::Sink)
                    .with_input("in", PortType::Object)
                    .with_input("in", PortType::Object),
            ],
            bindings: vec![Binding::new("reader", "out", "writer", "in")],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        normalize_names(&mut g, &mut log);

        let inputs: Vec<&str> = g.components[1].inputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(inputs, vec!["in", "in_2"]);
        assert_eq!(g.bindings, vec![Binding::new("reader", "out", "writer", "in")]);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_duplicate_non_canonical_ports_follow_first_holder() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("reader", ComponentKind::Source)
                    .with_output("Out", PortType::Object)
                    .with_output("Out", PortType::Object),
                Component::new("writer", ComponentKind::Sink).with_input("in", PortType::Object),
            ],
            bindings: vec![Binding::new("reader", "Out", "writer", "in")],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        normalize_names(&mut g, &mut log);

        let outputs: Vec<&str> = g.components[0].outputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(outputs, vec!["out", "out_2"]);
        assert_eq!(g.bindings, vec![Binding::new("reader", "out", "writer", "in")]);
    }

    #[test]
    fn test_canonical_graph_untouched() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("reader", ComponentKind::Source).with_output("out", PortType::Object),
            ],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        normalize_names(&mut g, &mut log);
        assert!(log.is_empty());
    }
}
