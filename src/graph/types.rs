//! Canonical pipeline graph types.
//!
//! These are the serde targets for the canonical graph encoding. Loosely
//! shaped producer output goes through `graph::contract` first.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// KINDS
// =============================================================================

/// Closed set of component kinds. `Unknown` keeps unrecognised tags intact so a
/// graph round-trips without losing the producer's intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentKind {
    Source,
    Transformer,
    Accumulator,
    Store,
    Controller,
    Sink,
    StreamProcessor,
    Model,
    ApiEndpoint,
    Router,
    Queue,
    Cache,
    Unknown(String),
}

impl ComponentKind {
    /// Parse a kind tag, ignoring case, `_` and `-`.
    pub fn parse(tag: &str) -> Self {
        let folded: String = tag
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(|c| c.to_lowercase())
            .collect();
        match folded.as_str() {
            "source" => ComponentKind::Source,
            "transformer" | "transform" => ComponentKind::Transformer,
            "accumulator" => ComponentKind::Accumulator,
            "store" => ComponentKind::Store,
            "controller" => ComponentKind::Controller,
            "sink" => ComponentKind::Sink,
            "streamprocessor" => ComponentKind::StreamProcessor,
            "model" => ComponentKind::Model,
            "apiendpoint" | "endpoint" => ComponentKind::ApiEndpoint,
            "router" => ComponentKind::Router,
            "queue" => ComponentKind::Queue,
            "cache" => ComponentKind::Cache,
            _ => ComponentKind::Unknown(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::Source => "Source",
            ComponentKind::Transformer => "Transformer",
            ComponentKind::Accumulator => "Accumulator",
            ComponentKind::Store => "Store",
            ComponentKind::Controller => "Controller",
            ComponentKind::Sink => "Sink",
            ComponentKind::StreamProcessor => "StreamProcessor",
            ComponentKind::Model => "Model",
            ComponentKind::ApiEndpoint => "APIEndpoint",
            ComponentKind::Router => "Router",
            ComponentKind::Queue => "Queue",
            ComponentKind::Cache => "Cache",
            ComponentKind::Unknown(tag) => tag,
        }
    }

    /// Store and Sink may never have outputs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComponentKind::Store | ComponentKind::Sink)
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            ComponentKind::Store | ComponentKind::Accumulator | ComponentKind::Cache
        )
    }

    pub fn is_transform(&self) -> bool {
        matches!(
            self,
            ComponentKind::Transformer
                | ComponentKind::StreamProcessor
                | ComponentKind::Model
                | ComponentKind::Router
        )
    }

    pub fn is_realtime(&self) -> bool {
        matches!(self, ComponentKind::StreamProcessor | ComponentKind::Queue)
    }

    /// Kinds that are never force-wired by orphan reconnection.
    pub fn is_reconnect_exempt(&self) -> bool {
        matches!(
            self,
            ComponentKind::Source | ComponentKind::Sink | ComponentKind::ApiEndpoint
        )
    }
}

impl From<String> for ComponentKind {
    fn from(tag: String) -> Self {
        ComponentKind::parse(&tag)
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// PORTS
// =============================================================================

/// Element-type tag carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PortType {
    #[default]
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
}

impl PortType {
    /// Parse a type tag. Unknown tags widen to `Object`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "array" | "list" | "vec" | "sequence" => PortType::Array,
            "string" | "str" | "text" => PortType::String,
            "number" | "float" | "double" | "decimal" => PortType::Number,
            "integer" | "int" | "long" => PortType::Integer,
            "boolean" | "bool" => PortType::Boolean,
            _ => PortType::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortType::Object => "object",
            PortType::Array => "array",
            PortType::String => "string",
            PortType::Number => "number",
            PortType::Integer => "integer",
            PortType::Boolean => "boolean",
        }
    }
}

impl From<String> for PortType {
    fn from(tag: String) -> Self {
        PortType::parse(&tag)
    }
}

impl From<PortType> for String {
    fn from(t: PortType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(rename = "type", default)]
    pub port_type: PortType,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl Port {
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Port {
            name: name.into(),
            port_type,
            required: true,
        }
    }
}

// =============================================================================
// COMPONENTS & BINDINGS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Component {
            name: name.into(),
            kind,
            inputs: vec![],
            outputs: vec![],
            config: Map::new(),
        }
    }

    pub fn with_input(mut self, name: &str, port_type: PortType) -> Self {
        self.inputs.push(Port::new(name, port_type));
        self
    }

    pub fn with_output(mut self, name: &str, port_type: PortType) -> Self {
        self.outputs.push(Port::new(name, port_type));
        self
    }

    pub fn with_config(mut self, key: &str, value: Value) -> Self {
        self.config.insert(key.to_string(), value);
        self
    }

    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.inputs.iter_mut().find(|p| p.name == name)
    }

    pub fn has_ports(&self) -> bool {
        !self.inputs.is_empty() || !self.outputs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub from_component: String,
    pub from_port: String,
    pub to_component: String,
    pub to_port: String,
}

impl Binding {
    pub fn new(from_component: &str, from_port: &str, to_component: &str, to_port: &str) -> Self {
        Binding {
            from_component: from_component.to_string(),
            from_port: from_port.to_string(),
            to_component: to_component.to_string(),
            to_port: to_port.to_string(),
        }
    }

    pub fn touches(&self, component: &str) -> bool {
        self.from_component == component || self.to_component == component
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from_component, self.from_port, self.to_component, self.to_port
        )
    }
}

// =============================================================================
// GRAPH
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineGraph {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub components: Vec<Component>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl PipelineGraph {
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn bindings_from<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a Binding> {
        self.bindings
            .iter()
            .filter(move |b| b.from_component == component)
    }

    pub fn bindings_into<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a Binding> {
        self.bindings.iter().filter(move |b| b.to_component == component)
    }

    pub fn has_binding_touching(&self, component: &str) -> bool {
        self.bindings.iter().any(|b| b.touches(component))
    }

    /// True when both endpoints exist and the ports are direction-correct.
    pub fn binding_resolves(&self, binding: &Binding) -> bool {
        let from_ok = self
            .component(&binding.from_component)
            .is_some_and(|c| c.output(&binding.from_port).is_some());
        let to_ok = self
            .component(&binding.to_component)
            .is_some_and(|c| c.input(&binding.to_port).is_some());
        from_ok && to_ok
    }
}
