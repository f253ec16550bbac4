//! Schema pass: make the receiving port of every binding accept the sender's
//! element type.

use super::{HealingOperation, OperationKind, OperationLog};
use crate::graph::{Binding, PipelineGraph, PortType};

/// (sender, receiver) pairs that are compatible without rewriting.
const COMPATIBLE: &[(PortType, PortType)] = &[
    (PortType::Array, PortType::Object),
    (PortType::Object, PortType::Array),
    (PortType::String, PortType::Object),
    (PortType::Number, PortType::Object),
    (PortType::Boolean, PortType::Object),
    (PortType::Integer, PortType::Number),
];

/// `object` receives anything.
pub fn compatible(from: PortType, to: PortType) -> bool {
    from == to || to == PortType::Object || COMPATIBLE.contains(&(from, to))
}

/// The receiver type to rewrite to: the sender's type when it is the more
/// permissive of the pair, `object` otherwise.
pub fn widened(from: PortType, to: PortType) -> PortType {
    if COMPATIBLE.contains(&(to, from)) {
        from
    } else {
        PortType::Object
    }
}

pub fn coerce_port_types(graph: &mut PipelineGraph, log: &mut OperationLog) {
    let bindings = graph.bindings.clone();
    for binding in &bindings {
        coerce_binding(graph, binding, log);
    }
}

/// Coerce a single binding. Unresolvable endpoints are left for the final
/// defect check.
pub fn coerce_binding(graph: &mut PipelineGraph, binding: &Binding, log: &mut OperationLog) {
    let Some(from_type) = graph
        .component(&binding.from_component)
        .and_then(|c| c.output(&binding.from_port))
        .map(|p| p.port_type)
    else {
        return;
    };
    let Some(target) = graph.component_mut(&binding.to_component) else {
        return;
    };
    let target_name = target.name.clone();
    let Some(port) = target.input_mut(&binding.to_port) else {
        return;
    };
    if compatible(from_type, port.port_type) {
        return;
    }

    let before = port.port_type;
    port.port_type = widened(from_type, before);
    log.record(
        HealingOperation::new(
            OperationKind::PortTypeCoerced,
            &target_name,
            format!(
                "input '{}' widened from {} to {} to accept {} from {}",
                port.name, before, port.port_type, from_type, binding.from_component
            ),
        )
        .change(before.as_str(), port.port_type.as_str()),
    );
}
