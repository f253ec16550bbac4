//! Kind → requirement-list lookup, plus the contracts shipped with the crate.

use std::collections::HashMap;

use super::requirement::{ConfigRequirement, FieldType};
use crate::graph::ComponentKind;

pub trait RequirementRegistry: Send + Sync {
    /// `None` (or an empty slice) means the kind declares no requirements.
    fn requirements(&self, kind: &ComponentKind) -> Option<&[ConfigRequirement]>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    entries: HashMap<ComponentKind, Vec<ConfigRequirement>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the requirement list for `kind`.
    pub fn insert(&mut self, kind: ComponentKind, requirements: Vec<ConfigRequirement>) {
        self.entries.insert(kind, requirements);
    }

    pub fn with(mut self, kind: ComponentKind, requirements: Vec<ConfigRequirement>) -> Self {
        self.insert(kind, requirements);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ComponentKind> {
        self.entries.keys()
    }

    pub fn builtin() -> Self {
        StaticRegistry::new()
            .with(ComponentKind::Source, source())
            .with(ComponentKind::ApiEndpoint, api_endpoint())
            .with(ComponentKind::Store, store())
            .with(ComponentKind::Queue, queue())
            .with(ComponentKind::Model, model())
            .with(ComponentKind::Sink, sink())
            .with(ComponentKind::Cache, cache())
            .with(ComponentKind::Router, router())
    }
}

impl RequirementRegistry for StaticRegistry {
    fn requirements(&self, kind: &ComponentKind) -> Option<&[ConfigRequirement]> {
        self.entries.get(kind).map(Vec::as_slice)
    }
}

// =============================================================================
// BUILTIN CONTRACTS
// =============================================================================

fn source() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("source_type", FieldType::String)
            .required()
            .options(["file", "http", "database", "kafka"])
            .default_value("http")
            .description("where records are read from"),
        ConfigRequirement::new("path", FieldType::String)
            .depends_on("source_type", "file")
            .semantic("path")
            .example("data/input.jsonl"),
        ConfigRequirement::new("url", FieldType::String)
            .depends_on("source_type", "http")
            .semantic("url")
            .pattern(r"https?://\S+")
            .example("https://api.example.com/records"),
        ConfigRequirement::new("connection_url", FieldType::String)
            .depends_on("source_type", "database")
            .semantic("url"),
        ConfigRequirement::new("topic", FieldType::String)
            .depends_on("source_type", "kafka")
            .semantic("topic"),
        ConfigRequirement::new("poll_interval_secs", FieldType::Integer)
            .min(1.0)
            .max(86_400.0)
            .default_value(60),
    ]
}

fn api_endpoint() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("port", FieldType::Integer)
            .required()
            .min(1024.0)
            .max(65_535.0)
            .default_value(8080)
            .semantic("port"),
        ConfigRequirement::new("route_prefix", FieldType::String)
            .required()
            .pattern(r"/[A-Za-z0-9_\-/]*")
            .default_value("/api")
            .example("/api/v1")
            .semantic("route"),
        ConfigRequirement::new("method", FieldType::String)
            .options(["GET", "POST", "PUT", "PATCH", "DELETE"])
            .default_value("POST"),
        ConfigRequirement::new("auth", FieldType::String)
            .options(["none", "api_key", "jwt"])
            .default_value("none"),
        ConfigRequirement::new("api_key_env", FieldType::String)
            .depends_on("auth", "api_key")
            .semantic("env")
            .pattern(r"[A-Z][A-Z0-9_]*")
            .example("API_KEY"),
        ConfigRequirement::new("tls_cert_path", FieldType::String)
            .semantic("path")
            .requires("tls_key_path"),
        ConfigRequirement::new("tls_key_path", FieldType::String)
            .semantic("path")
            .example("certs/server.key"),
    ]
}

fn store() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("engine", FieldType::String)
            .required()
            .options(["postgresql", "mysql", "sqlite", "redis", "mongodb"])
            .default_value("postgresql"),
        ConfigRequirement::new("connection_url", FieldType::String)
            .depends_on_any("engine", ["postgresql", "mysql", "redis", "mongodb"])
            .semantic("url")
            .pattern(r"[a-z][a-z0-9+]*://\S+")
            .description("connection string for the storage engine"),
        ConfigRequirement::new("path", FieldType::String)
            .depends_on("engine", "sqlite")
            .semantic("path")
            .example("data/store.db"),
        ConfigRequirement::new("table", FieldType::String)
            .pattern(r"[A-Za-z_][A-Za-z0-9_]*")
            .default_value("records"),
        ConfigRequirement::new("batch_size", FieldType::Integer)
            .min(1.0)
            .max(10_000.0)
            .default_value(100),
    ]
}

fn queue() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("broker", FieldType::String)
            .required()
            .options(["kafka", "rabbitmq", "redis", "sqs"])
            .default_value("kafka"),
        ConfigRequirement::new("topic", FieldType::String)
            .required()
            .semantic("topic")
            .pattern(r"[A-Za-z0-9._\-]+"),
        ConfigRequirement::new("partitions", FieldType::Integer)
            .min(1.0)
            .max(256.0)
            .default_value(3),
    ]
}

fn model() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("model_type", FieldType::String)
            .required()
            .options(["classifier", "regressor", "embedding", "generator", "generic"])
            .default_value("generic"),
        ConfigRequirement::new("model_path", FieldType::String)
            .semantic("path")
            .example("models/model.bin"),
        ConfigRequirement::new("batch_size", FieldType::Integer)
            .min(1.0)
            .max(4096.0)
            .default_value(32),
        ConfigRequirement::new("threshold", FieldType::Number)
            .min(0.0)
            .max(1.0)
            .default_value(0.5),
    ]
}

fn sink() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("sink_type", FieldType::String)
            .required()
            .options(["file", "http", "database", "stdout"])
            .default_value("stdout"),
        ConfigRequirement::new("path", FieldType::String)
            .depends_on("sink_type", "file")
            .semantic("path")
            .example("output/results.jsonl"),
        ConfigRequirement::new("url", FieldType::String)
            .depends_on("sink_type", "http")
            .semantic("url")
            .pattern(r"https?://\S+"),
        ConfigRequirement::new("format", FieldType::String)
            .options(["json", "jsonl", "csv"])
            .default_value("jsonl"),
    ]
}

fn cache() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("backend", FieldType::String)
            .required()
            .options(["memory", "redis"])
            .default_value("memory"),
        ConfigRequirement::new("ttl_seconds", FieldType::Integer)
            .min(1.0)
            .default_value(300)
            .conflicts_with("no_expiry"),
        ConfigRequirement::new("no_expiry", FieldType::Boolean),
        ConfigRequirement::new("max_entries", FieldType::Integer)
            .min(1.0)
            .default_value(10_000),
        ConfigRequirement::new("redis_url", FieldType::String)
            .depends_on("backend", "redis")
            .semantic("url")
            .example("redis://localhost:6379/0"),
    ]
}

fn router() -> Vec<ConfigRequirement> {
    vec![
        ConfigRequirement::new("strategy", FieldType::String)
            .required()
            .options(["round_robin", "hash", "content"])
            .default_value("round_robin"),
        ConfigRequirement::new("routing_key", FieldType::String)
            .depends_on_any("strategy", ["hash", "content"])
            .example("customer_id"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValidator;
    use serde_json::{Map, json};

    #[test]
    fn test_builtin_covers_configurable_kinds() {
        let registry = StaticRegistry::builtin();
        for kind in [
            ComponentKind::Source,
            ComponentKind::ApiEndpoint,
            ComponentKind::Store,
            ComponentKind::Queue,
            ComponentKind::Model,
            ComponentKind::Sink,
            ComponentKind::Cache,
            ComponentKind::Router,
        ] {
            assert!(registry.requirements(&kind).is_some_and(|r| !r.is_empty()), "{}", kind);
        }
        assert!(registry.requirements(&ComponentKind::Transformer).is_none());
    }

    #[test]
    fn test_builtin_defaults_satisfy_their_own_contract() {
        let registry = StaticRegistry::builtin();
        for kind in registry.kinds() {
            let Some(reqs) = registry.requirements(kind) else { continue };
            for req in reqs {
                if let Some(default) = &req.default {
                    assert!(ConfigValidator::check_value(req, default).is_ok(), "{}.{}", kind, req.name);
                }
                if let Some(example) = req.parsed_example() {
                    assert!(ConfigValidator::check_value(req, &example).is_ok(), "{}.{}", kind, req.name);
                }
            }
        }
    }

    #[test]
    fn test_store_url_required_only_for_networked_engines() {
        let registry = StaticRegistry::builtin();
        let reqs = registry.requirements(&ComponentKind::Store).unwrap();
        let mut cfg = Map::new();
        cfg.insert("engine".into(), json!("sqlite"));
        cfg.insert("path".into(), json!("data/store.db"));
        assert!(ConfigValidator::validate("s", &cfg, reqs).is_empty());

        cfg.insert("engine".into(), json!("postgresql"));
        let errors = ConfigValidator::validate("s", &cfg, reqs);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "connection_url");
    }
}
