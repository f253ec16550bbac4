//! Terminal enforcement and kind re-classification.

use super::text::has_keyword;
use super::{HealingOperation, OperationKind, OperationLog};
use crate::graph::{ComponentKind, GraphTopology, PipelineGraph};

pub const STORAGE_KEYWORDS: &[&str] = &[
    "store",
    "storage",
    "db",
    "database",
    "repository",
    "repo",
    "persist",
    "warehouse",
    "table",
];

pub const SINK_KEYWORDS: &[&str] = &[
    "sink",
    "output",
    "writer",
    "export",
    "logger",
    "notifier",
    "publisher",
];

pub const API_KEYWORDS: &[&str] = &["api", "endpoint", "gateway", "route", "http", "rest"];

/// Store/Sink never keep outputs, and nothing binds out of them.
pub fn enforce_terminals(graph: &mut PipelineGraph, log: &mut OperationLog) {
    let mut terminals = Vec::new();
    for component in graph.components.iter_mut() {
        if !component.kind.is_terminal() {
            continue;
        }
        terminals.push(component.name.clone());
        if component.outputs.is_empty() {
            continue;
        }
        let before: Vec<String> = component.outputs.iter().map(|p| p.name.clone()).collect();
        component.outputs.clear();
        log.record(
            HealingOperation::new(
                OperationKind::OutputsCleared,
                &component.name,
                format!("cleared outputs of terminal {} component", component.kind),
            )
            .change(before.join(","), ""),
        );
    }

    let mut dropped = Vec::new();
    graph.bindings.retain(|b| {
        if terminals.contains(&b.from_component) {
            dropped.push(b.clone());
            false
        } else {
            true
        }
    });
    for b in dropped {
        log.record(HealingOperation::new(
            OperationKind::BindingDropped,
            &b.from_component,
            format!("dropped {} sourced from a terminal component", b),
        ));
    }
}

/// Corrected kind for `name`, or None to keep `current`.
///
/// Precedence: storage keyword > Controller retention > sink keyword >
/// API keyword > Source from zero-in/nonzero-out. Keyword moves to a terminal
/// kind only apply to components with no outgoing bindings; entry kinds
/// (Source, APIEndpoint, Queue) are never re-inferred from degree.
pub fn infer_kind(
    name: &str,
    current: &ComponentKind,
    in_degree: usize,
    out_degree: usize,
    output_ports: usize,
) -> Option<ComponentKind> {
    let storage = has_keyword(name, STORAGE_KEYWORDS);
    let no_outgoing = out_degree == 0;

    if storage && no_outgoing && *current != ComponentKind::Controller {
        return Some(ComponentKind::Store);
    }
    if *current == ComponentKind::Controller {
        return (output_ports == 0 && no_outgoing && storage).then_some(ComponentKind::Store);
    }
    if no_outgoing && has_keyword(name, SINK_KEYWORDS) {
        return Some(ComponentKind::Sink);
    }
    if has_keyword(name, API_KEYWORDS) {
        return Some(ComponentKind::ApiEndpoint);
    }
    let entry_kind = matches!(
        current,
        ComponentKind::Source | ComponentKind::ApiEndpoint | ComponentKind::Queue
    );
    if in_degree == 0 && out_degree > 0 && !entry_kind {
        return Some(ComponentKind::Source);
    }
    None
}

pub fn reclassify_kinds(graph: &mut PipelineGraph, log: &mut OperationLog) {
    let topology = GraphTopology::build(graph);
    let mut changed_to_terminal = false;

    for component in graph.components.iter_mut() {
        let inferred = infer_kind(
            &component.name,
            &component.kind,
            topology.in_degree(&component.name),
            topology.out_degree(&component.name),
            component.outputs.len(),
        );
        let Some(kind) = inferred else { continue };
        if kind == component.kind {
            continue;
        }
        log.record(
            HealingOperation::new(
                OperationKind::KindReclassified,
                &component.name,
                format!("reclassified from {} to {}", component.kind, kind),
            )
            .change(component.kind.as_str(), kind.as_str()),
        );
        changed_to_terminal |= kind.is_terminal();
        component.kind = kind;
    }

    if changed_to_terminal {
        enforce_terminals(graph, log);
    }
}
