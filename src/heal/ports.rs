//! Port pass: make every binding endpoint resolve to a real, direction-correct
//! port, or drop the binding.

use std::collections::HashSet;

use super::text::best_fuzzy_match;
use super::{HealingOperation, OperationKind, OperationLog};
use crate::graph::{Binding, Component, PipelineGraph, Port, PortType};

enum Resolution {
    Exact,
    Matched(String),
    Unresolved,
}

fn resolve(wanted: &str, ports: &[Port]) -> Resolution {
    if ports.iter().any(|p| p.name == wanted) {
        return Resolution::Exact;
    }
    if let Some(p) = ports.iter().find(|p| p.name.eq_ignore_ascii_case(wanted)) {
        return Resolution::Matched(p.name.clone());
    }
    match best_fuzzy_match(wanted, ports.iter().map(|p| p.name.as_str())) {
        Some(name) => Resolution::Matched(name.to_string()),
        None => Resolution::Unresolved,
    }
}

pub fn heal_ports(graph: &mut PipelineGraph, log: &mut OperationLog) {
    let bindings = std::mem::take(&mut graph.bindings);
    let mut kept: Vec<Binding> = Vec::with_capacity(bindings.len());
    let mut seen: HashSet<Binding> = HashSet::new();

    for mut binding in bindings {
        if graph.component(&binding.from_component).is_none()
            || graph.component(&binding.to_component).is_none()
        {
            let owner = binding.from_component.clone();
            log.record(HealingOperation::new(
                OperationKind::BindingDropped,
                &owner,
                format!("dropped binding {} naming an unknown component", binding),
            ));
            continue;
        }

        if binding.from_component == binding.to_component {
            log.record(HealingOperation::new(
                OperationKind::BindingDropped,
                &binding.from_component.clone(),
                format!("dropped self-loop {}", binding),
            ));
            continue;
        }

        if !heal_from_port(graph, &mut binding, log) {
            continue;
        }
        heal_to_port(graph, &mut binding, log);

        if !seen.insert(binding.clone()) {
            log.record(HealingOperation::new(
                OperationKind::BindingDropped,
                &binding.from_component.clone(),
                format!("dropped duplicate binding {}", binding),
            ));
            continue;
        }
        kept.push(binding);
    }

    graph.bindings = kept;
}

/// Returns false when the binding had to be dropped.
fn heal_from_port(graph: &mut PipelineGraph, binding: &mut Binding, log: &mut OperationLog) -> bool {
    let Some(source) = graph.component_mut(&binding.from_component) else {
        return false;
    };

    match resolve(&binding.from_port, &source.outputs) {
        Resolution::Exact => true,
        Resolution::Matched(name) => {
            log.record(
                HealingOperation::new(
                    OperationKind::PortMatched,
                    &source.name,
                    format!("binding output '{}' matched to '{}'", binding.from_port, name),
                )
                .change(binding.from_port.clone(), name.clone()),
            );
            binding.from_port = name;
            true
        }
        Resolution::Unresolved if source.kind.is_terminal() => {
            log.record(HealingOperation::new(
                OperationKind::BindingDropped,
                &source.name,
                format!(
                    "dropped {}: terminal {} component cannot gain outputs",
                    binding, source.kind
                ),
            ));
            false
        }
        Resolution::Unresolved => {
            synthesize(source, &binding.from_port, Direction::Output, log);
            true
        }
    }
}

fn heal_to_port(graph: &mut PipelineGraph, binding: &mut Binding, log: &mut OperationLog) {
    let Some(target) = graph.component_mut(&binding.to_component) else {
        return;
    };

    match resolve(&binding.to_port, &target.inputs) {
        Resolution::Exact => {}
        Resolution::Matched(name) => {
            log.record(
                HealingOperation::new(
                    OperationKind::PortMatched,
                    &target.name,
                    format!("binding input '{}' matched to '{}'", binding.to_port, name),
                )
                .change(binding.to_port.clone(), name.clone()),
            );
            binding.to_port = name;
        }
        Resolution::Unresolved => synthesize(target, &binding.to_port, Direction::Input, log),
    }
}

#[derive(Clone, Copy)]
pub enum Direction {
    Input,
    Output,
}

/// Add an `object` port named `name` to `component`.
pub fn synthesize(component: &mut Component, name: &str, dir: Direction, log: &mut OperationLog) {
    let (ports, label) = match dir {
        Direction::Input => (&mut component.inputs, "input"),
        Direction::Output => (&mut component.outputs, "output"),
    };
    ports.push(Port::new(name, PortType::Object));
    log.record(
        HealingOperation::new(
            OperationKind::PortSynthesized,
            &component.name,
            format!("synthesized {} port '{}' (object)", label, name),
        )
        .change("", name),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ComponentKind;

    fn graph(bindings: Vec<Binding>) -> PipelineGraph {
        PipelineGraph {
            name: "t".into(),
            description: None,
            components: vec![
                Component::new("reader", ComponentKind::Source)
                    .with_output("user_records", PortType::Object),
                Component::new("writer", ComponentKind::Sink).with_input("Input", PortType::Object),
                Component::new("archive", ComponentKind::Store).with_input("in", PortType::Object),
            ],
            bindings,
        }
    }

    #[test]
    fn test_case_insensitive_and_fuzzy_match() {
        let mut g = graph(vec![Binding::new("reader", "records", "writer", "input")]);
        let mut log = OperationLog::default();
        heal_ports(&mut g, &mut log);
        assert_eq!(g.bindings, vec![Binding::new("reader", "user_records", "writer", "Input")]);
        assert_eq!(
            log.iter().filter(|o| o.kind == OperationKind::PortMatched).count(),
            2
        );
    }

    #[test]
    fn test_unresolved_output_on_terminal_drops_binding() {
        let mut g = graph(vec![Binding::new("archive", "out", "writer", "Input")]);
        let mut log = OperationLog::default();
        heal_ports(&mut g, &mut log);
        assert!(g.bindings.is_empty());
        assert!(g.component("archive").unwrap().outputs.is_empty());
    }

    #[test]
    fn test_unknown_component_and_self_loop_dropped() {
        let mut g = graph(vec![
            Binding::new("ghost", "out", "writer", "Input"),
            Binding::new("reader", "user_records", "reader", "user_records"),
        ]);
        let mut log = OperationLog::default();
        heal_ports(&mut g, &mut log);
        assert!(g.bindings.is_empty());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_duplicate_after_repair_dropped() {
        let mut g = graph(vec![
            Binding::new("reader", "user_records", "writer", "Input"),
            Binding::new("reader", "USER_RECORDS", "writer", "input"),
        ]);
        let mut log = OperationLog::default();
        heal_ports(&mut g, &mut log);
        assert_eq!(g.bindings.len(), 1);
    }
}
