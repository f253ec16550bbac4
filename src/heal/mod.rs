//! Structural healing: repair ports, bindings, kinds and names on a raw graph.
//!
//! Passes run in a fixed order because each one assumes the invariants the
//! earlier ones establish:
//!
//! 1. `ports`: resolve binding endpoints, synthesizing or dropping as a last resort
//! 2. `schema`: coerce incompatible port types
//! 3. terminal: Store/Sink lose their outputs and outgoing bindings
//! 4. `orphans`: wire components that have ports but no bindings
//! 5. `inject`: minimal config for well-known kinds
//! 6. `kinds`: reclassify mislabelled components
//! 7. `naming`: canonical identifiers, cascaded through bindings
//!
//! The sequence repeats until a round applies nothing, so healing an already
//! healed graph is a no-op.

pub mod inject;
pub mod kinds;
pub mod naming;
pub mod orphans;
pub mod ports;
pub mod schema;
pub mod text;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::StructuralError;
use crate::graph::{GraphTopology, PipelineGraph};

/// Upper bound on pass rounds. Real graphs settle in two.
pub const DEFAULT_MAX_ROUNDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PortMatched,
    PortSynthesized,
    BindingDropped,
    PortTypeCoerced,
    OutputsCleared,
    OrphanConnected,
    ConfigInjected,
    KindReclassified,
    ComponentRenamed,
    PortRenamed,
}

/// Audit entry for one structural change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingOperation {
    pub kind: OperationKind,
    pub component: String,
    pub description: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl HealingOperation {
    pub fn new(kind: OperationKind, component: &str, description: impl Into<String>) -> Self {
        HealingOperation {
            kind,
            component: component.to_string(),
            description: description.into(),
            before: None,
            after: None,
        }
    }

    pub fn change(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self.after = Some(after.into());
        self
    }
}

/// Result of a structural heal. `success` is false iff `unresolved` is
/// non-empty; the graph is returned either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealReport {
    pub success: bool,
    pub graph: PipelineGraph,
    pub operations: Vec<HealingOperation>,
    pub unresolved: Vec<StructuralError>,
}

/// Appends operations and mirrors each one to the trace log.
#[derive(Debug, Default)]
pub struct OperationLog {
    operations: Vec<HealingOperation>,
}

impl OperationLog {
    pub fn record(&mut self, op: HealingOperation) {
        debug!(
            kind = ?op.kind,
            component = %op.component,
            "{}",
            op.description
        );
        self.operations.push(op);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn into_vec(self) -> Vec<HealingOperation> {
        self.operations
    }

    pub fn iter(&self) -> impl Iterator<Item = &HealingOperation> {
        self.operations.iter()
    }
}

#[derive(Debug, Clone)]
pub struct StructuralHealer {
    max_rounds: usize,
}

impl Default for StructuralHealer {
    fn default() -> Self {
        StructuralHealer {
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl StructuralHealer {
    pub fn new(max_rounds: usize) -> Self {
        StructuralHealer {
            max_rounds: max_rounds.max(1),
        }
    }

    /// Heal a copy of `graph`. Never fails on a single bad element; anything
    /// left unrepaired is listed in `unresolved`.
    #[instrument(level = "debug", skip_all, fields(graph = %graph.name, components = graph.components.len()))]
    pub fn heal(&self, graph: &PipelineGraph) -> HealReport {
        let mut graph = graph.clone();
        let mut log = OperationLog::default();

        naming::disambiguate_duplicates(&mut graph, &mut log);

        let mut settled = false;
        for round in 0..self.max_rounds {
            let before = log.len();
            ports::heal_ports(&mut graph, &mut log);
            schema::coerce_port_types(&mut graph, &mut log);
            kinds::enforce_terminals(&mut graph, &mut log);
            orphans::reconnect_orphans(&mut graph, &mut log);
            inject::inject_config(&mut graph, &mut log);
            kinds::reclassify_kinds(&mut graph, &mut log);
            naming::normalize_names(&mut graph, &mut log);
            if log.len() == before {
                debug!(round, "structural healing settled");
                settled = true;
                break;
            }
        }
        if !settled {
            warn!(
                max_rounds = self.max_rounds,
                "structural healing did not settle"
            );
        }

        let unresolved = remaining_defects(&graph);
        for defect in &unresolved {
            warn!(code = defect.code(), "unresolved structural defect: {}", defect);
        }

        HealReport {
            success: unresolved.is_empty(),
            graph,
            operations: log.into_vec(),
            unresolved,
        }
    }
}

/// Invariants checked after all passes.
pub fn remaining_defects(graph: &PipelineGraph) -> Vec<StructuralError> {
    let mut defects = Vec::new();

    let mut seen = HashSet::new();
    for c in &graph.components {
        if !seen.insert(c.name.as_str()) {
            defects.push(StructuralError::DuplicateComponent(c.name.clone()));
        }
        if c.kind.is_terminal() && !c.outputs.is_empty() {
            defects.push(StructuralError::TerminalOutputs(c.name.clone()));
        }
    }

    for b in &graph.bindings {
        if !graph.binding_resolves(b) {
            defects.push(StructuralError::DanglingBinding {
                from_component: b.from_component.clone(),
                from_port: b.from_port.clone(),
                to_component: b.to_component.clone(),
                to_port: b.to_port.clone(),
            });
        }
    }

    let topology = GraphTopology::build(graph);
    if topology.is_cyclic() {
        let member = topology.cycle_member().unwrap_or_default();
        defects.push(StructuralError::Cycle(member.to_string()));
    }

    defects
}
