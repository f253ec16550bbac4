//! Builtin contracts exercised through the pipeline: conditional fields,
//! companions and mutual exclusion.

mod helpers;

use std::sync::Arc;

use graph_healer::config::{ConfigValidator, RequirementRegistry, StaticRegistry};
use graph_healer::context::PipelineContextBuilder;
use graph_healer::error::{ValidationErrorKind, ValidationException};
use graph_healer::graph::ComponentKind;
use graph_healer::settings::HealerSettings;
use graph_healer::ValidationPipeline;
use helpers::*;
use serde_json::json;

fn pipeline() -> ValidationPipeline {
    ValidationPipeline::from_settings(
        &HealerSettings::default(),
        Arc::new(StaticRegistry::builtin()),
        None,
    )
}

#[test]
fn errors_follow_declaration_order() {
    let registry = StaticRegistry::builtin();
    let reqs = registry.requirements(&ComponentKind::ApiEndpoint).unwrap();
    let cfg = object(json!({"port": "8080", "method": "FETCH"}));

    let errors = ConfigValidator::validate("api", &cfg, reqs);
    let summary: Vec<(&str, &str)> = errors.iter().map(|e| (e.field.as_str(), e.code)).collect();
    assert_eq!(
        summary,
        vec![("port", "C002"), ("route_prefix", "C001"), ("method", "C003")]
    );
    assert_eq!(errors[1].suggestion.as_deref(), Some("set 'route_prefix', e.g. /api/v1"));
}

#[tokio::test]
async fn companion_field_is_filled() {
    let g = isolated(
        "secure_api",
        ComponentKind::ApiEndpoint,
        json!({"port": 9443, "route_prefix": "/v1", "tls_cert_path": "certs/server.crt"}),
    );
    let builder = PipelineContextBuilder::new(&g);

    let healed = pipeline().validate_component(&builder, "secure_api").await.unwrap();
    assert_eq!(healed["tls_key_path"], json!("certs/server.key"));
    assert_eq!(healed["tls_cert_path"], json!("certs/server.crt"));
}

#[tokio::test]
async fn conditional_field_only_when_triggered() {
    let g = graph(
        vec![
            graph_healer::graph::Component::new("by_round", ComponentKind::Router)
                .with_config("strategy", json!("round_robin")),
            graph_healer::graph::Component::new("by_customer", ComponentKind::Router)
                .with_config("strategy", json!("hash")),
        ],
        vec![],
    );
    let builder = PipelineContextBuilder::new(&g);
    let pipeline = pipeline();

    let plain = pipeline.validate_component(&builder, "by_round").await.unwrap();
    assert!(!plain.contains_key("routing_key"));

    let hashed = pipeline.validate_component(&builder, "by_customer").await.unwrap();
    assert_eq!(hashed["routing_key"], json!("customer_id"));
}

#[tokio::test]
async fn mutually_exclusive_fields_are_left_to_the_operator() {
    let g = isolated(
        "lookup_cache",
        ComponentKind::Cache,
        json!({"backend": "memory", "ttl_seconds": 60, "no_expiry": true}),
    );
    let builder = PipelineContextBuilder::new(&g);

    let err = pipeline().validate_component(&builder, "lookup_cache").await.unwrap_err();
    match err {
        ValidationException::HealingFailed { original, failure, .. } => {
            assert_eq!(original.len(), 1);
            assert_eq!(original[0].kind, ValidationErrorKind::Conflict);
            assert_eq!(original[0].code, "C007");
            assert_eq!(failure.unresolved, vec!["ttl_seconds".to_string()]);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn null_counts_as_missing() {
    let g = isolated(
        "events",
        ComponentKind::Queue,
        json!({"broker": null, "topic": "signups"}),
    );
    let builder = PipelineContextBuilder::new(&g);

    let healed = pipeline().validate_component(&builder, "events").await.unwrap();
    assert_eq!(healed["broker"], json!("kafka"));
    assert_eq!(healed["topic"], json!("signups"));
}
