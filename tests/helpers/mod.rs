#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use graph_healer::error::AiBackendError;
use graph_healer::graph::*;
use graph_healer::semantic::{AiBackend, AiRequest};
use serde_json::{Map, Value};

// =============================================================================
// Graph builders
// =============================================================================

pub fn graph(components: Vec<Component>, bindings: Vec<Binding>) -> PipelineGraph {
    PipelineGraph {
        name: "test-pipeline".into(),
        description: None,
        components,
        bindings,
    }
}

pub fn source(name: &str, output: &str) -> Component {
    Component::new(name, ComponentKind::Source).with_output(output, PortType::Object)
}

pub fn sink(name: &str, input: &str) -> Component {
    Component::new(name, ComponentKind::Sink).with_input(input, PortType::Object)
}

pub fn store(name: &str) -> Component {
    Component::new(name, ComponentKind::Store).with_input("in", PortType::Object)
}

pub fn transformer(name: &str) -> Component {
    Component::new(name, ComponentKind::Transformer)
        .with_input("in", PortType::Object)
        .with_output("out", PortType::Object)
}

/// A single component with no ports or bindings, so context inference has
/// no peers to draw from.
pub fn isolated(name: &str, kind: ComponentKind, config: Value) -> PipelineGraph {
    let mut c = Component::new(name, kind);
    c.config = object(config);
    graph(vec![c], vec![])
}

pub fn object(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Every post-heal binding resolves to existing, direction-correct ports.
pub fn assert_no_dangling(graph: &PipelineGraph) {
    for b in &graph.bindings {
        assert!(graph.binding_resolves(b), "dangling binding {}", b);
    }
}

/// Store/Sink have no outputs and nothing binds out of them.
pub fn assert_terminal_invariant(graph: &PipelineGraph) {
    for c in graph.components.iter().filter(|c| c.kind.is_terminal()) {
        assert!(c.outputs.is_empty(), "{} still has outputs", c.name);
        assert!(
            graph.bindings.iter().all(|b| b.from_component != c.name),
            "{} still has an outgoing binding",
            c.name
        );
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// =============================================================================
// AI backend stub
// =============================================================================

/// Replays canned responses in order and records every request it sees.
/// Once the script runs out every call fails.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, AiBackendError>>>,
    requests: Mutex<Vec<AiRequest>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, AiBackendError>>) -> Self {
        ScriptedBackend {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(json: &str) -> Self {
        Self::new(vec![Ok(json.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiBackend for ScriptedBackend {
    async fn complete(&self, request: &AiRequest) -> Result<String, AiBackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiBackendError::Request("script exhausted".into())))
    }
}

/// Answers only after `delay`, so a shorter call timeout always fires.
pub struct StalledBackend {
    delay: Duration,
    calls: AtomicUsize,
}

impl StalledBackend {
    pub fn new(delay: Duration) -> Self {
        StalledBackend {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiBackend for StalledBackend {
    async fn complete(&self, _request: &AiRequest) -> Result<String, AiBackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(r#"{"database_url": "postgresql://late:5432/late"}"#.to_string())
    }
}
