//! Orphan pass: wire components that declare ports but take part in no binding.

use super::ports::{Direction, synthesize};
use super::schema::coerce_binding;
use super::text::semantically_related;
use super::{HealingOperation, OperationKind, OperationLog};
use crate::graph::{Binding, ComponentKind, GraphTopology, PipelineGraph};

pub fn reconnect_orphans(graph: &mut PipelineGraph, log: &mut OperationLog) {
    let orphans: Vec<(String, ComponentKind)> = graph
        .components
        .iter()
        .filter(|c| c.has_ports() && !c.kind.is_reconnect_exempt())
        .filter(|c| !graph.has_binding_touching(&c.name))
        .map(|c| (c.name.clone(), c.kind.clone()))
        .collect();

    for (name, kind) in orphans {
        // an earlier orphan may have wired this one already
        if graph.has_binding_touching(&name) {
            continue;
        }
        if kind.is_storage() {
            connect_storage(graph, &name, log);
        } else if kind.is_transform() {
            if !splice_transform(graph, &name, log) {
                connect_generic(graph, &name, log);
            }
        } else {
            connect_generic(graph, &name, log);
        }
    }
}

/// Storage receives an inbound edge from a related producer.
fn connect_storage(graph: &mut PipelineGraph, orphan: &str, log: &mut OperationLog) -> bool {
    let producer = related(graph, orphan, |k| !k.is_terminal());
    match producer {
        Some(producer) => connect(graph, &producer, orphan, orphan, log),
        None => false,
    }
}

/// Transform goes between a related source and a related terminal. Either
/// side alone is still wired.
fn splice_transform(graph: &mut PipelineGraph, orphan: &str, log: &mut OperationLog) -> bool {
    let source = related(graph, orphan, |k| {
        matches!(
            k,
            ComponentKind::Source | ComponentKind::ApiEndpoint | ComponentKind::Queue
        )
    });
    let terminal = related(graph, orphan, |k| k.is_terminal());

    let mut wired = false;
    if let Some(source) = source {
        wired |= connect(graph, &source, orphan, orphan, log);
    }
    if let Some(terminal) = terminal {
        let topology = GraphTopology::build(graph);
        if !topology.reaches(&terminal, orphan) {
            wired |= connect(graph, orphan, &terminal, orphan, log);
        }
    }
    wired
}

/// First related component, in whichever direction the kinds allow.
fn connect_generic(graph: &mut PipelineGraph, orphan: &str, log: &mut OperationLog) -> bool {
    let Some(peer) = related(graph, orphan, |_| true) else {
        return false;
    };
    let peer_terminal = graph
        .component(&peer)
        .is_some_and(|c| c.kind.is_terminal());
    let orphan_terminal = graph
        .component(orphan)
        .is_some_and(|c| c.kind.is_terminal());

    match (peer_terminal, orphan_terminal) {
        (true, true) => false,
        (true, false) => connect(graph, orphan, &peer, orphan, log),
        (false, _) => connect(graph, &peer, orphan, orphan, log),
    }
}

/// First component (declaration order) other than `orphan` whose name is
/// semantically related and whose kind passes `accept`.
fn related<F>(graph: &PipelineGraph, orphan: &str, accept: F) -> Option<String>
where
    F: Fn(&ComponentKind) -> bool,
{
    graph
        .components
        .iter()
        .filter(|c| c.name != orphan && accept(&c.kind))
        .find(|c| semantically_related(&c.name, orphan))
        .map(|c| c.name.clone())
}

fn connect(
    graph: &mut PipelineGraph,
    from: &str,
    to: &str,
    orphan: &str,
    log: &mut OperationLog,
) -> bool {
    let Some(from_port) = attach_port(graph, from, Direction::Output, log) else {
        return false;
    };
    let Some(to_port) = attach_port(graph, to, Direction::Input, log) else {
        return false;
    };

    let binding = Binding::new(from, &from_port, to, &to_port);
    if graph.bindings.contains(&binding) {
        return false;
    }
    log.record(HealingOperation::new(
        OperationKind::OrphanConnected,
        orphan,
        format!("connected {}", binding),
    ));
    graph.bindings.push(binding.clone());
    coerce_binding(graph, &binding, log);
    true
}

/// Name of the first port in `dir`, synthesizing `in`/`out` when there is
/// none. Terminals never gain outputs.
fn attach_port(
    graph: &mut PipelineGraph,
    component: &str,
    dir: Direction,
    log: &mut OperationLog,
) -> Option<String> {
    let c = graph.component_mut(component)?;
    match dir {
        Direction::Output => {
            if let Some(p) = c.outputs.first() {
                return Some(p.name.clone());
            }
            if c.kind.is_terminal() {
                return None;
            }
            synthesize(c, "out", Direction::Output, log);
            Some("out".to_string())
        }
        Direction::Input => {
            if let Some(p) = c.inputs.first() {
                return Some(p.name.clone());
            }
            synthesize(c, "in", Direction::Input, log);
            Some("in".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Component, PortType};

    #[test]
    fn test_storage_orphan_gets_inbound_from_related_producer() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("login_api", ComponentKind::ApiEndpoint)
                    .with_output("out", PortType::Object),
                Component::new("weather_feed", ComponentKind::Source)
                    .with_output("out", PortType::Object),
                Component::new("profile_store", ComponentKind::Store)
                    .with_input("in", PortType::Object),
            ],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        reconnect_orphans(&mut g, &mut log);
        assert_eq!(g.bindings, vec![Binding::new("login_api", "out", "profile_store", "in")]);
    }

    #[test]
    fn test_transform_spliced_between_source_and_terminal() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("order_source", ComponentKind::Source)
                    .with_output("orders", PortType::Array),
                Component::new("order_enricher", ComponentKind::Transformer)
                    .with_input("in", PortType::String),
                Component::new("checkout_sink", ComponentKind::Sink)
                    .with_input("in", PortType::Object),
            ],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        reconnect_orphans(&mut g, &mut log);
        assert_eq!(
            g.bindings,
            vec![
                Binding::new("order_source", "orders", "order_enricher", "in"),
                Binding::new("order_enricher", "out", "checkout_sink", "in"),
            ]
        );
        // array into string input is widened on the spot
        let enricher = g.component("order_enricher").unwrap();
        assert_eq!(enricher.inputs[0].port_type, PortType::Object);
    }

    #[test]
    fn test_unrelated_orphan_left_alone() {
        let mut g = PipelineGraph {
            components: vec![
                Component::new("weather_feed", ComponentKind::Source)
                    .with_output("out", PortType::Object),
                Component::new("payment_store", ComponentKind::Store)
                    .with_input("in", PortType::Object),
            ],
            ..Default::default()
        };
        let mut log = OperationLog::default();
        reconnect_orphans(&mut g, &mut log);
        assert!(g.bindings.is_empty());
        assert!(log.is_empty());
    }
}
