//! Config injection: deterministic minimal settings for well-known kinds.
//! Existing keys are never overwritten.

use std::collections::HashSet;

use serde_json::Value;

use super::text::{has_keyword, stable_hash, tokenize};
use super::{HealingOperation, OperationKind, OperationLog};
use crate::graph::{ComponentKind, PipelineGraph};

const PORT_BASE: u64 = 8000;
const PORT_SPAN: u64 = 1000;

const CACHE_HINTS: &[&str] = &["cache", "redis", "session", "kv"];

pub fn inject_config(graph: &mut PipelineGraph, log: &mut OperationLog) {
    let mut claimed_ports: HashSet<u64> = graph
        .components
        .iter()
        .filter_map(|c| c.config.get("port"))
        .filter_map(port_number)
        .collect();

    for component in graph.components.iter_mut() {
        let injected: Option<(&str, Value)> = match component.kind {
            ComponentKind::ApiEndpoint if !component.config.contains_key("port") => {
                let port = hashed_port(&component.name, &claimed_ports);
                claimed_ports.insert(port);
                Some(("port", Value::from(port)))
            }
            ComponentKind::Store if !component.config.contains_key("engine") => {
                let engine = if has_keyword(&component.name, CACHE_HINTS) {
                    "redis"
                } else {
                    "postgresql"
                };
                Some(("engine", Value::from(engine)))
            }
            ComponentKind::Model if !component.config.contains_key("model_type") => {
                Some(("model_type", Value::from(model_type_for(&component.name))))
            }
            ComponentKind::Source
            | ComponentKind::Transformer
            | ComponentKind::Accumulator
            | ComponentKind::Store
            | ComponentKind::Controller
            | ComponentKind::Sink
            | ComponentKind::StreamProcessor
            | ComponentKind::Model
            | ComponentKind::ApiEndpoint
            | ComponentKind::Router
            | ComponentKind::Queue
            | ComponentKind::Cache
            | ComponentKind::Unknown(_) => None,
        };

        if let Some((key, value)) = injected {
            log.record(
                HealingOperation::new(
                    OperationKind::ConfigInjected,
                    &component.name,
                    format!("injected {} = {}", key, value),
                )
                .change("", value.to_string()),
            );
            component.config.insert(key.to_string(), value);
        }
    }
}

fn port_number(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stable port in 8000..9000 derived from the name, probing upward past ports
/// already claimed in the graph.
pub fn hashed_port(name: &str, claimed: &HashSet<u64>) -> u64 {
    let start = stable_hash(name) as u64 % PORT_SPAN;
    (0..PORT_SPAN)
        .map(|offset| PORT_BASE + (start + offset) % PORT_SPAN)
        .find(|port| !claimed.contains(port))
        .unwrap_or(PORT_BASE + start)
}

pub fn model_type_for(name: &str) -> &'static str {
    let tokens = tokenize(name);
    let any = |prefixes: &[&str]| {
        tokens
            .iter()
            .any(|t| prefixes.iter().any(|p| t.starts_with(p)))
    };
    if any(&["classif", "categor", "sentiment", "detect"]) {
        "classifier"
    } else if any(&["regress", "predict", "forecast", "estimat"]) {
        "regressor"
    } else if any(&["embed", "vector", "encoder"]) {
        "embedding"
    } else if any(&["generat", "llm", "gpt", "chat", "summar"]) {
        "generator"
    } else {
        "generic"
    }
}
