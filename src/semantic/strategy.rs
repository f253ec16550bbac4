//! Deterministic value strategies, tried in order for each unmet field.

use serde_json::{Map, Value};

use crate::config::ConfigRequirement;
use crate::context::{PipelineContext, ResourceFamily};
use crate::graph::{Component, ComponentKind};

pub trait HealingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// A candidate value for `req`, or `None` to defer to the next strategy.
    fn propose(
        &self,
        req: &ConfigRequirement,
        ctx: &PipelineContext,
        config: &Map<String, Value>,
    ) -> Option<Value>;
}

/// Default, Example, then ContextInference.
pub fn deterministic_chain() -> Vec<Box<dyn HealingStrategy>> {
    vec![
        Box::new(DefaultValueStrategy),
        Box::new(ExampleValueStrategy),
        Box::new(ContextInferenceStrategy),
    ]
}

fn collides(req: &ConfigRequirement, ctx: &PipelineContext, value: &Value) -> bool {
    ResourceFamily::for_field(req.semantic.as_deref(), &req.name)
        .is_some_and(|family| ctx.resources.collides(family, value))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueStrategy;

impl HealingStrategy for DefaultValueStrategy {
    fn name(&self) -> &'static str {
        "default"
    }

    fn propose(
        &self,
        req: &ConfigRequirement,
        ctx: &PipelineContext,
        _config: &Map<String, Value>,
    ) -> Option<Value> {
        let value = req.default.clone()?;
        (!collides(req, ctx, &value)).then_some(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleValueStrategy;

impl HealingStrategy for ExampleValueStrategy {
    fn name(&self) -> &'static str {
        "example"
    }

    fn propose(
        &self,
        req: &ConfigRequirement,
        ctx: &PipelineContext,
        _config: &Map<String, Value>,
    ) -> Option<Value> {
        let value = req.parsed_example()?;
        (!collides(req, ctx, &value)).then_some(value)
    }
}

/// Derives values from the component's neighbours. Only URL, topic/queue and
/// name fields are handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextInferenceStrategy;

impl HealingStrategy for ContextInferenceStrategy {
    fn name(&self) -> &'static str {
        "context"
    }

    fn propose(
        &self,
        req: &ConfigRequirement,
        ctx: &PipelineContext,
        config: &Map<String, Value>,
    ) -> Option<Value> {
        let field = req.name.to_ascii_lowercase();
        if field == "name" || field == "service_name" {
            return Some(Value::from(ctx.component.clone()));
        }

        let value = match ResourceFamily::for_field(req.semantic.as_deref(), &req.name)? {
            ResourceFamily::Url => infer_url(ctx, config)?,
            ResourceFamily::Queue => infer_topic(ctx)?,
            ResourceFamily::Port
            | ResourceFamily::Path
            | ResourceFamily::Route
            | ResourceFamily::EnvVar => return None,
        };
        (!collides(req, ctx, &value)).then_some(value)
    }
}

/// `<scheme>://<peer>:<port>/<peer>`, preferring a storage peer.
fn infer_url(ctx: &PipelineContext, config: &Map<String, Value>) -> Option<Value> {
    let peer = ctx
        .peers()
        .find(|c| c.kind.is_storage())
        .or_else(|| ctx.peers().next())?;

    let scheme = config
        .get("engine")
        .or_else(|| config.get("broker"))
        .or_else(|| config.get("backend"))
        .and_then(Value::as_str)
        .and_then(scheme_for_engine)
        .or_else(|| peer_scheme(peer))
        .unwrap_or("postgresql");

    let port = peer
        .config
        .get("port")
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or_else(|| default_port(scheme));

    Some(Value::from(format!(
        "{}://{}:{}/{}",
        scheme, peer.name, port, peer.name
    )))
}

fn scheme_for_engine(engine: &str) -> Option<&'static str> {
    match engine {
        "postgresql" | "postgres" => Some("postgresql"),
        "mysql" => Some("mysql"),
        "redis" => Some("redis"),
        "mongodb" => Some("mongodb"),
        "kafka" => Some("kafka"),
        "rabbitmq" => Some("amqp"),
        _ => None,
    }
}

fn peer_scheme(peer: &Component) -> Option<&'static str> {
    match peer.kind {
        ComponentKind::ApiEndpoint => Some("http"),
        _ => peer
            .config
            .get("engine")
            .and_then(Value::as_str)
            .and_then(scheme_for_engine),
    }
}

fn default_port(scheme: &str) -> u64 {
    match scheme {
        "mysql" => 3306,
        "redis" => 6379,
        "mongodb" => 27017,
        "kafka" => 9092,
        "amqp" => 5672,
        "http" => 80,
        _ => 5432,
    }
}

/// A peer's declared topic, else `<peer>_events`.
fn infer_topic(ctx: &PipelineContext) -> Option<Value> {
    let declared = ctx.peers().find_map(|peer| {
        ["topic", "queue", "channel"]
            .iter()
            .find_map(|key| peer.config.get(*key))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    if let Some(topic) = declared {
        return Some(Value::from(topic));
    }
    let peer = ctx.peers().next()?;
    Some(Value::from(format!("{}_events", peer.name)))
}
