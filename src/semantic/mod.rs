//! Field-level config healing: deterministic strategies first, then an
//! optional AI backend with one refinement round.

pub mod ai;
pub mod cache;
pub mod strategy;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

pub use ai::{AiBackend, AiRequest, complete_with_retry, parse_ai_response};
pub use cache::HealingCache;
pub use strategy::{
    ContextInferenceStrategy, DefaultValueStrategy, ExampleValueStrategy, HealingStrategy,
    deterministic_chain,
};

use crate::config::{ConfigRequirement, ConfigValidator};
use crate::context::PipelineContext;
use crate::error::{HealingFailure, ValidationError, ValidationErrorKind};
use crate::settings::RetryPolicy;

pub struct SemanticHealer {
    strategies: Vec<Box<dyn HealingStrategy>>,
    backend: Option<Arc<dyn AiBackend>>,
    cache: Arc<HealingCache>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SemanticHealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("SemanticHealer")
            .field("strategies", &names)
            .field("backend", &self.backend.is_some())
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .finish()
    }
}

impl SemanticHealer {
    pub fn new(cache: Arc<HealingCache>) -> Self {
        SemanticHealer {
            strategies: deterministic_chain(),
            backend: None,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn AiBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the deterministic chain.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn HealingStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn cache(&self) -> &Arc<HealingCache> {
        &self.cache
    }

    /// Heal `config` until it satisfies `requirements`, or fail without
    /// returning anything partial. `errors` are the validator's findings on
    /// `config` and feed the cache key.
    #[instrument(level = "debug", skip_all, fields(component = %ctx.component, kind = %ctx.kind))]
    pub async fn heal(
        &self,
        ctx: &PipelineContext,
        config: &Map<String, Value>,
        requirements: &[ConfigRequirement],
        errors: &[ValidationError],
    ) -> Result<Map<String, Value>, HealingFailure> {
        let key = HealingCache::key(&ctx.component, &ctx.kind, errors, config);
        if let Some(cached) = self.cache.get(&key) {
            debug!("healing cache hit");
            return Ok(cached);
        }

        let mut working = config.clone();
        let mut attempts = 1;
        let mut remaining = self.apply_deterministic(ctx, &mut working, requirements);
        if remaining.is_empty() {
            return Ok(self.finish(key, working, attempts));
        }

        let Some(backend) = self.backend.as_deref() else {
            return Err(failure(
                ctx,
                attempts,
                &remaining,
                "no AI backend is configured and no deterministic strategy produced a valid value",
            ));
        };

        // first AI round, then exactly one refinement with what is left
        for round in ["initial", "refinement"] {
            let requested = fillable_fields(&remaining);
            if requested.is_empty() {
                break;
            }
            attempts += 1;
            let request = build_request(ctx, requirements, &remaining, &working, &requested);
            let fields = match complete_with_retry(backend, &request, &self.retry).await {
                Ok(fields) => fields,
                Err(e) => {
                    return Err(failure(ctx, attempts, &remaining, &e.to_string()));
                }
            };
            merge_requested(&mut working, fields, &requested);
            remaining = ConfigValidator::validate(&ctx.component, &working, requirements);
            if remaining.is_empty() {
                debug!(round, "AI round resolved all fields");
                return Ok(self.finish(key, working, attempts));
            }
            warn!(round, remaining = remaining.len(), "AI round left errors");
        }

        Err(failure(
            ctx,
            attempts,
            &remaining,
            "AI-assisted healing did not produce a valid configuration",
        ))
    }

    fn finish(&self, key: String, healed: Map<String, Value>, attempts: u32) -> Map<String, Value> {
        info!(attempts, "configuration healed");
        self.cache.insert(key, healed.clone());
        healed
    }

    /// Fill fields from the strategy chain until nothing new is filled.
    /// Returns the errors still outstanding.
    fn apply_deterministic(
        &self,
        ctx: &PipelineContext,
        working: &mut Map<String, Value>,
        requirements: &[ConfigRequirement],
    ) -> Vec<ValidationError> {
        let mut tried: HashSet<String> = HashSet::new();
        loop {
            let errors = ConfigValidator::validate(&ctx.component, working, requirements);
            let targets: Vec<String> = fillable_fields(&errors)
                .into_iter()
                .filter(|f| !tried.contains(f))
                .collect();
            if targets.is_empty() {
                return errors;
            }

            for field in targets {
                tried.insert(field.clone());
                let Some(req) = requirements.iter().find(|r| r.name == field) else {
                    continue;
                };
                if let Some((strategy, value)) = self.first_valid(req, ctx, working) {
                    debug!(field = %field, strategy, value = %value, "field healed");
                    working.insert(field, value);
                }
            }
        }
    }

    fn first_valid(
        &self,
        req: &ConfigRequirement,
        ctx: &PipelineContext,
        working: &Map<String, Value>,
    ) -> Option<(&'static str, Value)> {
        self.strategies.iter().find_map(|s| {
            let candidate = s.propose(req, ctx, working)?;
            ConfigValidator::check_value(req, &candidate)
                .is_ok()
                .then(|| (s.name(), candidate))
        })
    }
}

/// Fields a healer can supply a value for, in error order. Mutual-exclusion
/// conflicts need a removal, not a value, so they never qualify.
fn fillable_fields(errors: &[ValidationError]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for e in errors {
        if e.kind == ValidationErrorKind::Conflict && e.companion.is_none() {
            continue;
        }
        let field = e.target_field().to_string();
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields
}

fn build_request(
    ctx: &PipelineContext,
    requirements: &[ConfigRequirement],
    errors: &[ValidationError],
    working: &Map<String, Value>,
    requested: &[String],
) -> AiRequest {
    AiRequest {
        component: ctx.component.clone(),
        kind: ctx.kind.to_string(),
        context: ctx.describe(),
        requirements: requirements
            .iter()
            .filter(|r| requested.contains(&r.name))
            .map(ConfigRequirement::describe)
            .collect(),
        errors: errors.iter().map(|e| format!("{}: {}", e.field, e.message)).collect(),
        partial_config: working.clone(),
        requested_fields: requested.to_vec(),
    }
}

/// Keep only the requested keys from an AI answer.
fn merge_requested(working: &mut Map<String, Value>, fields: Map<String, Value>, requested: &[String]) {
    for (key, value) in fields {
        if requested.contains(&key) {
            working.insert(key, value);
        }
    }
}

fn failure(
    ctx: &PipelineContext,
    attempts: u32,
    remaining: &[ValidationError],
    detail: &str,
) -> HealingFailure {
    let mut unresolved: Vec<String> = Vec::new();
    for e in remaining {
        let field = e.target_field().to_string();
        if !unresolved.contains(&field) {
            unresolved.push(field);
        }
    }
    warn!(
        component = %ctx.component,
        attempts,
        unresolved = %unresolved.join(", "),
        "semantic healing failed"
    );
    HealingFailure {
        component: ctx.component.clone(),
        attempts,
        unresolved,
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldType;
    use crate::context::PipelineContextBuilder;
    use crate::graph::{Component, ComponentKind, PipelineGraph};
    use serde_json::json;

    fn isolated(kind: ComponentKind) -> PipelineGraph {
        PipelineGraph {
            components: vec![Component::new("svc", kind)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dependent_field_filled_after_trigger() {
        let g = isolated(ComponentKind::Sink);
        let ctx = PipelineContextBuilder::new(&g).build("svc").unwrap();
        let reqs = vec![
            ConfigRequirement::new("sink_type", FieldType::String)
                .required()
                .default_value("file"),
            ConfigRequirement::new("path", FieldType::String)
                .depends_on("sink_type", "file")
                .example("out/data.csv"),
        ];
        let errors = ConfigValidator::validate("svc", &Map::new(), &reqs);
        let healer = SemanticHealer::new(Arc::new(HealingCache::default()));
        let healed = healer.heal(&ctx, &Map::new(), &reqs, &errors).await.unwrap();
        assert_eq!(healed["sink_type"], json!("file"));
        assert_eq!(healed["path"], json!("out/data.csv"));
    }

    #[tokio::test]
    async fn test_invalid_candidate_skipped_for_next_strategy() {
        let g = isolated(ComponentKind::Queue);
        let ctx = PipelineContextBuilder::new(&g).build("svc").unwrap();
        let reqs = vec![
            ConfigRequirement::new("partitions", FieldType::Integer)
                .required()
                .max(64.0)
                .default_value(1000)
                .example("8"),
        ];
        let errors = ConfigValidator::validate("svc", &Map::new(), &reqs);
        let healer = SemanticHealer::new(Arc::new(HealingCache::default()));
        let healed = healer.heal(&ctx, &Map::new(), &reqs, &errors).await.unwrap();
        assert_eq!(healed["partitions"], json!(8));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let g = isolated(ComponentKind::Store);
        let ctx = PipelineContextBuilder::new(&g).build("svc").unwrap();
        let reqs = vec![ConfigRequirement::new("database_url", FieldType::String).required()];
        let errors = ConfigValidator::validate("svc", &Map::new(), &reqs);
        let cache = Arc::new(HealingCache::default());
        let healer = SemanticHealer::new(Arc::clone(&cache));

        let failure = healer.heal(&ctx, &Map::new(), &reqs, &errors).await.unwrap_err();
        assert_eq!(failure.unresolved, vec!["database_url".to_string()]);
        assert_eq!(failure.attempts, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_mutual_conflicts_are_not_fillable() {
        let reqs = vec![
            ConfigRequirement::new("a", FieldType::Boolean).conflicts_with("b"),
            ConfigRequirement::new("b", FieldType::Boolean),
            ConfigRequirement::new("c", FieldType::Boolean).requires("d"),
        ];
        let mut cfg = Map::new();
        cfg.insert("a".into(), json!(true));
        cfg.insert("b".into(), json!(true));
        cfg.insert("c".into(), json!(true));
        let errors = ConfigValidator::validate("svc", &cfg, &reqs);
        assert_eq!(fillable_fields(&errors), vec!["d".to_string()]);
    }
}
