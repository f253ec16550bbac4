//! Shape-tolerant graph reader.
//!
//! Producers emit the same graph in several encodings: components as a list
//! or a name-keyed map, ports as bare strings or objects, bindings as objects,
//! dotted `from`/`to` pairs or `"a.out -> b.in"` strings. Everything here
//! funnels into the canonical `PipelineGraph`.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::instrument;

use super::types::{Binding, Component, ComponentKind, PipelineGraph, Port, PortType};
use crate::error::StructuralError;

/// Deserialize and normalize a graph JSON string.
pub fn parse_graph(json: &str) -> Result<PipelineGraph, StructuralError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| StructuralError::Parse(e.to_string()))?;
    normalize(&value)
}

/// Normalize an already-decoded JSON value into a canonical graph.
#[instrument(level = "debug", skip_all)]
pub fn normalize(value: &Value) -> Result<PipelineGraph, StructuralError> {
    let root = value
        .as_object()
        .ok_or_else(|| StructuralError::Shape("graph root must be an object".into()))?;

    let components = read_components(root)?;
    let bindings = read_bindings(root)?;

    let mut seen = HashSet::new();
    for c in &components {
        if !seen.insert(c.name.as_str()) {
            return Err(StructuralError::DuplicateComponent(c.name.clone()));
        }
    }

    Ok(PipelineGraph {
        name: str_field(root, &["name", "system", "title"]).unwrap_or_default(),
        description: str_field(root, &["description"]),
        components,
        bindings,
    })
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

fn read_components(root: &Map<String, Value>) -> Result<Vec<Component>, StructuralError> {
    let Some(raw) = first_of(root, &["components", "nodes"]) else {
        return Err(StructuralError::Shape(
            "graph has no `components` collection".into(),
        ));
    };

    match raw {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let obj = item.as_object().ok_or_else(|| {
                    StructuralError::Shape(format!("component #{} is not an object", i))
                })?;
                let name = str_field(obj, &["name", "id"]).ok_or_else(|| {
                    StructuralError::Shape(format!("component #{} has no name", i))
                })?;
                read_component(name, obj)
            })
            .collect(),
        Value::Object(by_name) => by_name
            .iter()
            .map(|(name, item)| {
                let obj = item.as_object().ok_or_else(|| {
                    StructuralError::Shape(format!("component '{}' is not an object", name))
                })?;
                read_component(name.clone(), obj)
            })
            .collect(),
        _ => Err(StructuralError::Shape(
            "`components` must be an array or an object".into(),
        )),
    }
}

fn read_component(name: String, obj: &Map<String, Value>) -> Result<Component, StructuralError> {
    let kind = str_field(obj, &["kind", "type", "component_type"])
        .map(|k| ComponentKind::parse(&k))
        .unwrap_or_else(|| ComponentKind::Unknown(String::new()));

    let inputs = read_ports(&name, first_of(obj, &["inputs", "input_ports"]))?;
    let outputs = read_ports(&name, first_of(obj, &["outputs", "output_ports"]))?;

    let config = match first_of(obj, &["config", "configuration"]) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(m)) => m.clone(),
        Some(_) => {
            return Err(StructuralError::Shape(format!(
                "config of '{}' must be an object",
                name
            )));
        }
    };

    Ok(Component {
        name,
        kind,
        inputs,
        outputs,
        config,
    })
}

fn read_ports(component: &str, raw: Option<&Value>) -> Result<Vec<Port>, StructuralError> {
    let Some(raw) = raw else {
        return Ok(vec![]);
    };
    let items = match raw {
        Value::Null => return Ok(vec![]),
        Value::Array(items) => items,
        _ => {
            return Err(StructuralError::Shape(format!(
                "ports of '{}' must be an array",
                component
            )));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(name) => Ok(Port::new(name.clone(), PortType::Object)),
            Value::Object(obj) => {
                let name = str_field(obj, &["name", "id"]).ok_or_else(|| {
                    StructuralError::Shape(format!("a port of '{}' has no name", component))
                })?;
                let port_type = str_field(obj, &["type", "schema", "data_type"])
                    .map(|t| PortType::parse(&t))
                    .unwrap_or_default();
                let required = obj.get("required").and_then(Value::as_bool).unwrap_or(true);
                Ok(Port {
                    name,
                    port_type,
                    required,
                })
            }
            _ => Err(StructuralError::Shape(format!(
                "a port of '{}' is neither a string nor an object",
                component
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

fn read_bindings(root: &Map<String, Value>) -> Result<Vec<Binding>, StructuralError> {
    let Some(raw) = first_of(root, &["bindings", "connections", "edges"]) else {
        return Ok(vec![]);
    };
    let items = match raw {
        Value::Null => return Ok(vec![]),
        Value::Array(items) => items,
        _ => return Err(StructuralError::Shape("`bindings` must be an array".into())),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let binding = match item {
                Value::String(s) => parse_arrow(s),
                Value::Object(obj) => read_binding_object(obj),
                _ => None,
            };
            binding.ok_or_else(|| {
                StructuralError::Shape(format!("binding #{} is not in a recognised form", i))
            })
        })
        .collect()
}

fn read_binding_object(obj: &Map<String, Value>) -> Option<Binding> {
    let explicit = (
        str_field(obj, &["from_component", "source", "from_node"]),
        str_field(obj, &["from_port", "source_port", "source_handle"]),
        str_field(obj, &["to_component", "target", "to_node"]),
        str_field(obj, &["to_port", "target_port", "target_handle"]),
    );
    if let (Some(fc), Some(fp), Some(tc), Some(tp)) = explicit {
        return Some(Binding {
            from_component: fc,
            from_port: fp,
            to_component: tc,
            to_port: tp,
        });
    }

    let (from_component, from_port) = split_endpoint(&str_field(obj, &["from"])?)?;
    let (to_component, to_port) = split_endpoint(&str_field(obj, &["to"])?)?;
    Some(Binding {
        from_component,
        from_port,
        to_component,
        to_port,
    })
}

/// `"a.out -> b.in"`
fn parse_arrow(s: &str) -> Option<Binding> {
    let (lhs, rhs) = s.split_once("->")?;
    let (from_component, from_port) = split_endpoint(lhs.trim())?;
    let (to_component, to_port) = split_endpoint(rhs.trim())?;
    Some(Binding {
        from_component,
        from_port,
        to_component,
        to_port,
    })
}

fn split_endpoint(s: &str) -> Option<(String, String)> {
    let (component, port) = s.rsplit_once('.')?;
    if component.is_empty() || port.is_empty() {
        return None;
    }
    Some((component.to_string(), port.to_string()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyed_components_and_arrow_bindings() {
        let graph = normalize(&json!({
            "name": "orders",
            "components": {
                "reader": { "type": "source", "outputs": ["out"] },
                "writer": { "kind": "Sink", "inputs": [{ "name": "in", "type": "list" }] }
            },
            "connections": ["reader.out -> writer.in"]
        }))
        .unwrap();

        assert_eq!(graph.name, "orders");
        assert_eq!(graph.components.len(), 2);
        let writer = graph.component("writer").unwrap();
        assert_eq!(writer.kind, ComponentKind::Sink);
        assert_eq!(writer.inputs[0].port_type, PortType::Array);
        assert_eq!(graph.bindings, vec![Binding::new("reader", "out", "writer", "in")]);
    }

    #[test]
    fn test_dotted_from_to_bindings() {
        let graph = normalize(&json!({
            "components": [
                { "name": "api", "kind": "api_endpoint", "outputs": ["req"] },
                { "name": "svc", "kind": "Transformer", "inputs": ["in"] }
            ],
            "bindings": [{ "from": "api.req", "to": "svc.in" }]
        }))
        .unwrap();
        assert_eq!(graph.components[0].kind, ComponentKind::ApiEndpoint);
        assert!(graph.binding_resolves(&graph.bindings[0]));
    }

    #[test]
    fn test_unknown_kind_round_trips() {
        let graph = normalize(&json!({
            "components": [{ "name": "x", "kind": "Teleporter" }]
        }))
        .unwrap();
        assert_eq!(graph.components[0].kind, ComponentKind::Unknown("Teleporter".into()));
        let json = serde_json::to_string(&graph).unwrap();
        let back: PipelineGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let err = normalize(&json!({
            "components": [{ "name": "a", "kind": "Source" }, { "name": "a", "kind": "Sink" }]
        }))
        .unwrap_err();
        assert_eq!(err, StructuralError::DuplicateComponent("a".into()));
    }

    #[test]
    fn test_non_object_config_rejected() {
        let err = normalize(&json!({
            "components": [{ "name": "a", "kind": "Source", "config": [1, 2] }]
        }))
        .unwrap_err();
        assert_eq!(err.code(), "S002");
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_graph("{not json"), Err(StructuralError::Parse(_))));
    }
}
