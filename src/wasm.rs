//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::config::{ConfigValidator, RequirementRegistry, StaticRegistry};
use crate::error::{Phase, StructuralError, ValidationError};
use crate::heal::{HealReport, StructuralHealer};

/// Normalize + structurally heal a graph JSON.
/// Returns a JSON object with either the heal `report` or parse `errors`.
#[wasm_bindgen]
pub fn heal_graph(json: &str) -> JsValue {
    let result = heal_graph_inner(json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn heal_graph_inner(json: &str) -> HealResult {
    match crate::graph::parse_graph(json) {
        Ok(graph) => HealResult::Healed(StructuralHealer::default().heal(&graph)),
        Err(e) => HealResult::Errors {
            errors: vec![ErrorDto::from(e)],
        },
    }
}

/// Check one component's config against the builtin contracts.
/// Returns a JSON array of error objects; empty means valid.
#[wasm_bindgen]
pub fn check_component(graph_json: &str, component: &str) -> JsValue {
    let result = check_component_inner(graph_json, component);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn check_component_inner(graph_json: &str, component: &str) -> Vec<ErrorDto> {
    let graph = match crate::graph::parse_graph(graph_json) {
        Ok(g) => g,
        Err(e) => return vec![ErrorDto::from(e)],
    };

    let Some(target) = graph.component(component) else {
        return vec![ErrorDto {
            code: "X001".into(),
            phase: Phase::Context,
            message: format!("component '{}' is not present in the graph", component),
            component: Some(component.to_string()),
            field: None,
            suggestion: None,
        }];
    };

    let registry = StaticRegistry::builtin();
    let Some(requirements) = registry.requirements(&target.kind) else {
        return vec![];
    };
    ConfigValidator::validate(&target.name, &target.config, requirements)
        .into_iter()
        .map(ErrorDto::from)
        .collect()
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
struct ErrorDto {
    code: String,
    phase: Phase,
    message: String,
    component: Option<String>,
    field: Option<String>,
    suggestion: Option<String>,
}

impl From<StructuralError> for ErrorDto {
    fn from(e: StructuralError) -> Self {
        ErrorDto {
            code: e.code().to_string(),
            phase: e.phase(),
            message: e.to_string(),
            component: None,
            field: None,
            suggestion: None,
        }
    }
}

impl From<ValidationError> for ErrorDto {
    fn from(e: ValidationError) -> Self {
        ErrorDto {
            code: e.code.to_string(),
            phase: Phase::Validate,
            message: e.message,
            component: Some(e.component),
            field: Some(e.field),
            suggestion: e.suggestion,
        }
    }
}

#[derive(serde::Serialize)]
#[serde(tag = "status")]
enum HealResult {
    #[serde(rename = "healed")]
    Healed(HealReport),
    #[serde(rename = "errors")]
    Errors { errors: Vec<ErrorDto> },
}
