//! Per-component view of the surrounding pipeline, used by the healing
//! strategies to make graph-aware choices.

pub mod resources;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

pub use resources::{ResourceFamily, UsedResources};

use crate::error::ContextBuildError;
use crate::graph::{Component, ComponentKind, PipelineGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFlowShape {
    Batch,
    Stream,
    RequestResponse,
    Realtime,
    Generic,
}

impl DataFlowShape {
    /// Classify from the multiset of kinds, strongest signal first.
    pub fn classify<'a>(kinds: impl IntoIterator<Item = &'a ComponentKind>) -> Self {
        let kinds: Vec<&ComponentKind> = kinds.into_iter().collect();
        let has = |wanted: &ComponentKind| kinds.iter().any(|k| *k == wanted);
        if has(&ComponentKind::Accumulator) || has(&ComponentKind::Store) {
            DataFlowShape::Batch
        } else if has(&ComponentKind::Source) && has(&ComponentKind::Sink) {
            DataFlowShape::Stream
        } else if has(&ComponentKind::ApiEndpoint) {
            DataFlowShape::RequestResponse
        } else if kinds.iter().any(|k| k.is_realtime()) {
            DataFlowShape::Realtime
        } else {
            DataFlowShape::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataFlowShape::Batch => "batch",
            DataFlowShape::Stream => "stream",
            DataFlowShape::RequestResponse => "request_response",
            DataFlowShape::Realtime => "realtime",
            DataFlowShape::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetadata {
    pub name: String,
    pub description: String,
}

/// Everything a healer may know about one component's surroundings.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub system: SystemMetadata,
    pub component: String,
    pub kind: ComponentKind,
    pub config: Map<String, Value>,
    pub upstream: Vec<Component>,
    pub downstream: Vec<Component>,
    pub flow: DataFlowShape,
    pub resources: Arc<UsedResources>,
}

impl PipelineContext {
    /// Nearest peers, upstream first.
    pub fn peers(&self) -> impl Iterator<Item = &Component> {
        self.upstream.iter().chain(self.downstream.iter())
    }

    /// Plain-text summary for AI prompts.
    pub fn describe(&self) -> String {
        let names = |cs: &[Component]| -> String {
            if cs.is_empty() {
                "none".to_string()
            } else {
                cs.iter()
                    .map(|c| format!("{} ({})", c.name, c.kind))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        };
        let mut out = format!("System: {}", self.system.name);
        if !self.system.description.is_empty() {
            out.push_str(&format!(" - {}", self.system.description));
        }
        out.push('\n');
        out.push_str(&format!("Data flow: {}\n", self.flow.as_str()));
        out.push_str(&format!("Component: {} ({})\n", self.component, self.kind));
        out.push_str(&format!("Upstream: {}\n", names(&self.upstream)));
        out.push_str(&format!("Downstream: {}\n", names(&self.downstream)));
        out
    }
}

/// Builds contexts for components of one graph. The resource index and the
/// data-flow shape are computed once, at construction, and shared by every
/// context this builder hands out.
#[derive(Debug)]
pub struct PipelineContextBuilder<'g> {
    graph: &'g PipelineGraph,
    system: SystemMetadata,
    flow: DataFlowShape,
    resources: Arc<UsedResources>,
}

impl<'g> PipelineContextBuilder<'g> {
    pub fn new(graph: &'g PipelineGraph) -> Self {
        let resources = Arc::new(UsedResources::from_graph(graph));
        let flow = DataFlowShape::classify(graph.components.iter().map(|c| &c.kind));
        debug!(
            graph = %graph.name,
            flow = flow.as_str(),
            ports = resources.ports.len(),
            "resource index built"
        );
        PipelineContextBuilder {
            graph,
            system: SystemMetadata {
                name: graph.name.clone(),
                description: graph.description.clone().unwrap_or_default(),
            },
            flow,
            resources,
        }
    }

    pub fn resources(&self) -> &Arc<UsedResources> {
        &self.resources
    }

    pub fn build(&self, component: &str) -> Result<PipelineContext, ContextBuildError> {
        let mut matches = self.graph.components.iter().filter(|c| c.name == component);
        let target = matches
            .next()
            .ok_or_else(|| ContextBuildError::ComponentNotFound(component.to_string()))?;
        let extra = matches.count();
        if extra > 0 {
            return Err(ContextBuildError::Malformed {
                component: component.to_string(),
                reason: format!("name is declared {} times", extra + 1),
            });
        }

        let upstream = self.neighbours(
            self.graph
                .bindings_into(component)
                .map(|b| b.from_component.as_str()),
        );
        let downstream = self.neighbours(
            self.graph
                .bindings_from(component)
                .map(|b| b.to_component.as_str()),
        );

        Ok(PipelineContext {
            system: self.system.clone(),
            component: target.name.clone(),
            kind: target.kind.clone(),
            config: target.config.clone(),
            upstream,
            downstream,
            flow: self.flow,
            resources: Arc::clone(&self.resources),
        })
    }

    /// Resolve names to components, deduplicated in first-seen order.
    fn neighbours<'a>(&self, names: impl Iterator<Item = &'a str>) -> Vec<Component> {
        let mut seen = HashSet::new();
        names
            .filter(|n| seen.insert(*n))
            .filter_map(|n| self.graph.component(n))
            .cloned()
            .collect()
    }
}
