//! Field-level config validation against a kind's requirement list.
//!
//! Error codes:
//!
//! | Code | Kind         | Meaning                                  |
//! |------|--------------|------------------------------------------|
//! | C001 | missing      | required field absent                    |
//! | C002 | type_mismatch| value has the wrong JSON type            |
//! | C003 | invalid      | value not among the enumerated options   |
//! | C004 | invalid      | numeric value out of bounds              |
//! | C005 | invalid      | string does not match the pattern        |
//! | C006 | invalid      | custom predicate rejected the value      |
//! | C007 | conflict     | mutually exclusive fields both present   |
//! | C008 | conflict     | companion field required but absent      |

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::{Map, Value};
use tracing::debug;

use super::requirement::ConfigRequirement;
use crate::error::{ValidationError, ValidationErrorKind};

/// Why a single value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub code: &'static str,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl FieldIssue {
    fn new(code: &'static str, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        FieldIssue {
            code,
            kind,
            message: message.into(),
        }
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// All errors in requirement declaration order. Empty means accepted.
    pub fn validate(
        component: &str,
        config: &Map<String, Value>,
        requirements: &[ConfigRequirement],
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for req in requirements {
            match present(config, &req.name) {
                None => {
                    if req.is_required(config) {
                        errors.push(ValidationError {
                            code: "C001",
                            component: component.to_string(),
                            field: req.name.clone(),
                            kind: ValidationErrorKind::Missing,
                            message: format!("required {} field '{}' is missing", req.field_type, req.name),
                            suggestion: req.suggestion(),
                            companion: None,
                        });
                    }
                }
                Some(value) => {
                    if let Err(issue) = Self::check_value(req, value) {
                        errors.push(ValidationError {
                            code: issue.code,
                            component: component.to_string(),
                            field: req.name.clone(),
                            kind: issue.kind,
                            message: issue.message,
                            suggestion: req.suggestion(),
                            companion: None,
                        });
                    }
                    for other in &req.conflicts_with {
                        if present(config, other).is_some() {
                            errors.push(ValidationError {
                                code: "C007",
                                component: component.to_string(),
                                field: req.name.clone(),
                                kind: ValidationErrorKind::Conflict,
                                message: format!("'{}' cannot be set together with '{}'", req.name, other),
                                suggestion: Some(format!("remove '{}' or '{}'", req.name, other)),
                                companion: None,
                            });
                        }
                    }
                    for companion in &req.requires {
                        if present(config, companion).is_none() {
                            errors.push(ValidationError {
                                code: "C008",
                                component: component.to_string(),
                                field: req.name.clone(),
                                kind: ValidationErrorKind::Conflict,
                                message: format!("'{}' requires '{}' to be set", req.name, companion),
                                suggestion: requirements
                                    .iter()
                                    .find(|r| &r.name == companion)
                                    .and_then(ConfigRequirement::suggestion),
                                companion: Some(companion.clone()),
                            });
                        }
                    }
                }
            }
        }

        if !errors.is_empty() {
            debug!(component, count = errors.len(), "config validation failed");
        }
        errors
    }

    /// Type, options, bounds, pattern and predicate checks on one value.
    pub fn check_value(req: &ConfigRequirement, value: &Value) -> Result<(), FieldIssue> {
        if !req.field_type.matches(value) {
            return Err(FieldIssue::new(
                "C002",
                ValidationErrorKind::TypeMismatch,
                format!("'{}' must be {}, got {}", req.name, req.field_type, json_type(value)),
            ));
        }

        if !req.options.is_empty() && !req.options.contains(value) {
            let opts: Vec<String> = req.options.iter().map(Value::to_string).collect();
            return Err(FieldIssue::new(
                "C003",
                ValidationErrorKind::Invalid,
                format!("'{}' must be one of [{}], got {}", req.name, opts.join(", "), value),
            ));
        }

        if let Some(n) = value.as_f64() {
            let below = req.min.is_some_and(|lo| n < lo);
            let above = req.max.is_some_and(|hi| n > hi);
            if below || above {
                return Err(FieldIssue::new(
                    "C004",
                    ValidationErrorKind::Invalid,
                    format!("'{}' is out of range: {}", req.name, bounds_text(req.min, req.max, n)),
                ));
            }
        }

        if let (Some(compiled), Some(s)) = (req.pattern_regex(), value.as_str()) {
            let pattern = req.pattern.as_deref().unwrap_or_default();
            match compiled {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => {
                    return Err(FieldIssue::new(
                        "C005",
                        ValidationErrorKind::Invalid,
                        format!("'{}' value '{}' does not match /{}/", req.name, s, pattern),
                    ));
                }
                Err(e) => {
                    return Err(FieldIssue::new(
                        "C005",
                        ValidationErrorKind::Invalid,
                        format!("'{}' has an unusable pattern: {}", req.name, e),
                    ));
                }
            }
        }

        if let Some(predicate) = &req.validator {
            let outcome = catch_unwind(AssertUnwindSafe(|| predicate(value)));
            let rejection = match outcome {
                Ok(Ok(true)) => None,
                Ok(Ok(false)) => Some(format!("'{}' rejected by custom check", req.name)),
                Ok(Err(reason)) => Some(format!("'{}' rejected: {}", req.name, reason)),
                Err(_) => Some(format!("'{}' custom check panicked", req.name)),
            };
            if let Some(message) = rejection {
                return Err(FieldIssue::new("C006", ValidationErrorKind::Invalid, message));
            }
        }

        Ok(())
    }
}

/// `null` counts as absent.
fn present<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    config.get(key).filter(|v| !v.is_null())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn bounds_text(min: Option<f64>, max: Option<f64>, got: f64) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("expected {}..={}, got {}", lo, hi, got),
        (Some(lo), None) => format!("expected at least {}, got {}", lo, got),
        (None, Some(hi)) => format!("expected at most {}, got {}", hi, got),
        (None, None) => format!("got {}", got),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldType;
    use serde_json::json;

    fn config(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_missing_required_carries_suggestion() {
        let reqs = vec![
            ConfigRequirement::new("port", FieldType::Integer)
                .required()
                .default_value(8080),
        ];
        let errors = ConfigValidator::validate("api", &Map::new(), &reqs);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "C001");
        assert_eq!(errors[0].kind, ValidationErrorKind::Missing);
        assert_eq!(errors[0].suggestion.as_deref(), Some("set 'port', default is 8080"));
    }

    #[test]
    fn test_errors_follow_declaration_order() {
        let reqs = vec![
            ConfigRequirement::new("b", FieldType::String).required(),
            ConfigRequirement::new("a", FieldType::Integer).min(1.0).max(10.0),
        ];
        let errors = ConfigValidator::validate("c", &config(json!({"a": 42})), &reqs);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["b", "a"]);
        assert_eq!(errors[1].code, "C004");
    }

    #[test]
    fn test_options_and_pattern() {
        let engine = ConfigRequirement::new("engine", FieldType::String).options(["postgresql", "redis"]);
        assert_eq!(
            ConfigValidator::check_value(&engine, &json!("oracle")).map_err(|i| i.code),
            Err("C003")
        );

        let route = ConfigRequirement::new("route_prefix", FieldType::String).pattern("/[a-z/]*");
        assert!(ConfigValidator::check_value(&route, &json!("/api/v1")).is_err());
        assert!(ConfigValidator::check_value(&route, &json!("/api/")).is_ok());
        // anchored: a matching substring is not enough
        assert!(ConfigValidator::check_value(&route, &json!("x/api")).is_err());
    }

    #[test]
    fn test_predicate_panic_becomes_failure() {
        let req = ConfigRequirement::new("n", FieldType::Integer).validator(|v| {
            if v.as_i64() == Some(13) {
                panic!("unlucky");
            }
            Err("always bad".to_string())
        });
        let issue = ConfigValidator::check_value(&req, &json!(13)).unwrap_err();
        assert_eq!(issue.code, "C006");
        assert!(issue.message.contains("panicked"));

        let issue = ConfigValidator::check_value(&req, &json!(1)).unwrap_err();
        assert!(issue.message.contains("always bad"));
    }

    #[test]
    fn test_conflicts_and_requires() {
        let reqs = vec![
            ConfigRequirement::new("ttl_seconds", FieldType::Integer).conflicts_with("no_expiry"),
            ConfigRequirement::new("no_expiry", FieldType::Boolean),
            ConfigRequirement::new("tls_cert_path", FieldType::String).requires("tls_key_path"),
            ConfigRequirement::new("tls_key_path", FieldType::String).example("certs/server.key"),
        ];
        let cfg = config(json!({
            "ttl_seconds": 60,
            "no_expiry": true,
            "tls_cert_path": "certs/server.crt"
        }));
        let errors = ConfigValidator::validate("cache", &cfg, &reqs);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].code, "C007");
        assert_eq!(errors[1].code, "C008");
        assert_eq!(errors[1].target_field(), "tls_key_path");
        assert_eq!(
            errors[1].suggestion.as_deref(),
            Some("set 'tls_key_path', e.g. certs/server.key")
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let reqs = vec![ConfigRequirement::new("topic", FieldType::String).required()];
        let errors = ConfigValidator::validate("q", &config(json!({"topic": null})), &reqs);
        assert_eq!(errors[0].kind, ValidationErrorKind::Missing);
    }
}
