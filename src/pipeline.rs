//! Top-level seam: structural heal, then per-component config validation and
//! healing, with every failure turned into an operator-facing diagnostic.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigRequirement, ConfigValidator, RequirementRegistry};
use crate::context::PipelineContextBuilder;
use crate::error::{FieldSuggestion, StructuralError, ValidationException};
use crate::graph::PipelineGraph;
use crate::heal::{HealingOperation, StructuralHealer};
use crate::semantic::{AiBackend, HealingCache, SemanticHealer};
use crate::settings::HealerSettings;

pub struct ValidationPipeline {
    registry: Arc<dyn RequirementRegistry>,
    healer: SemanticHealer,
    structural: StructuralHealer,
}

/// Outcome of [`ValidationPipeline::validate_graph`]. Configs of components
/// that validated (or healed) are written back into `graph`; failed ones keep
/// their original config.
#[derive(Debug)]
pub struct GraphValidation {
    pub graph: PipelineGraph,
    pub operations: Vec<HealingOperation>,
    pub structural_errors: Vec<StructuralError>,
    pub failures: Vec<ValidationException>,
}

impl GraphValidation {
    pub fn is_valid(&self) -> bool {
        self.structural_errors.is_empty() && self.failures.is_empty()
    }

    /// All diagnostics, structural defects first.
    pub fn diagnostics(&self) -> String {
        let mut out = String::new();
        for e in &self.structural_errors {
            out.push_str(&format!("[{}] {}\n", e.code(), e));
        }
        for f in &self.failures {
            out.push_str(&f.render_diagnostic());
        }
        out
    }
}

impl ValidationPipeline {
    pub fn new(registry: Arc<dyn RequirementRegistry>, healer: SemanticHealer) -> Self {
        ValidationPipeline {
            registry,
            healer,
            structural: StructuralHealer::default(),
        }
    }

    /// Wire a pipeline from settings. `backend` is dropped when
    /// `settings.enable_ai` is false.
    pub fn from_settings(
        settings: &HealerSettings,
        registry: Arc<dyn RequirementRegistry>,
        backend: Option<Arc<dyn AiBackend>>,
    ) -> Self {
        let cache = Arc::new(HealingCache::new(settings.cache_capacity));
        let mut healer = SemanticHealer::new(cache).with_retry(settings.retry.clone());
        if let Some(backend) = backend.filter(|_| settings.enable_ai) {
            healer = healer.with_backend(backend);
        }
        ValidationPipeline::new(registry, healer)
            .with_structural(StructuralHealer::new(settings.max_heal_rounds))
    }

    pub fn with_structural(mut self, structural: StructuralHealer) -> Self {
        self.structural = structural;
        self
    }

    pub fn healer(&self) -> &SemanticHealer {
        &self.healer
    }

    /// Valid config for `component`, healed if needed. Never returns a
    /// partially healed config.
    #[instrument(level = "debug", skip(self, builder))]
    pub async fn validate_component(
        &self,
        builder: &PipelineContextBuilder<'_>,
        component: &str,
    ) -> Result<Map<String, Value>, ValidationException> {
        let ctx = builder.build(component)?;

        let requirements = match self.registry.requirements(&ctx.kind) {
            Some(reqs) if !reqs.is_empty() => reqs,
            _ => {
                debug!(kind = %ctx.kind, "kind declares no requirements");
                return Ok(ctx.config);
            }
        };

        let original = ConfigValidator::validate(&ctx.component, &ctx.config, requirements);
        if original.is_empty() {
            return Ok(ctx.config);
        }
        info!(errors = original.len(), "configuration invalid, healing");

        let healed = match self
            .healer
            .heal(&ctx, &ctx.config, requirements, &original)
            .await
        {
            Ok(healed) => healed,
            Err(failure) => {
                let suggestions = suggestions_for(requirements, &failure.unresolved);
                return Err(ValidationException::HealingFailed {
                    component: ctx.component,
                    kind: ctx.kind,
                    original,
                    failure,
                    suggestions,
                    ai_available: self.healer.has_backend(),
                });
            }
        };

        let remaining = ConfigValidator::validate(&ctx.component, &healed, requirements);
        if !remaining.is_empty() {
            warn!(remaining = remaining.len(), "healed configuration failed re-validation");
            return Err(ValidationException::PostHealInvalid {
                component: ctx.component,
                kind: ctx.kind,
                original,
                remaining,
            });
        }
        Ok(healed)
    }

    /// Structural heal, then validate every component in name order against
    /// one resource snapshot taken from the healed graph.
    #[instrument(level = "debug", skip_all, fields(graph = %graph.name))]
    pub async fn validate_graph(&self, graph: &PipelineGraph) -> GraphValidation {
        let report = self.structural.heal(graph);
        let mut healed_graph = report.graph;

        let mut names: Vec<String> = healed_graph.components.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names.dedup();

        let mut outcomes = Vec::with_capacity(names.len());
        {
            let builder = PipelineContextBuilder::new(&healed_graph);
            for name in &names {
                outcomes.push((name.clone(), self.validate_component(&builder, name).await));
            }
        }

        let mut failures = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(config) => {
                    if let Some(c) = healed_graph.component_mut(&name) {
                        c.config = config;
                    }
                }
                Err(e) => {
                    warn!(component = %name, phase = %e.phase(), "component left invalid");
                    failures.push(e);
                }
            }
        }

        info!(
            components = names.len(),
            operations = report.operations.len(),
            failures = failures.len(),
            "graph validation finished"
        );
        GraphValidation {
            graph: healed_graph,
            operations: report.operations,
            structural_errors: report.unresolved,
            failures,
        }
    }
}

/// Example/default hints for each unresolved field that has a requirement.
fn suggestions_for(requirements: &[ConfigRequirement], unresolved: &[String]) -> Vec<FieldSuggestion> {
    unresolved
        .iter()
        .filter_map(|field| requirements.iter().find(|r| &r.name == field))
        .map(|r| FieldSuggestion {
            field: r.name.clone(),
            field_type: r.field_type.to_string(),
            example: r.example.clone(),
            default: r.default.as_ref().map(Value::to_string),
            description: r.description.clone(),
        })
        .collect()
}
