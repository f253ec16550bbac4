//! Error taxonomy shared by the structural and semantic passes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::types::ComponentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Contract,
    Structural,
    Context,
    Validate,
    Heal,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Contract => write!(f, "Contract"),
            Phase::Structural => write!(f, "Structural"),
            Phase::Context => write!(f, "Context"),
            Phase::Validate => write!(f, "Validate"),
            Phase::Heal => write!(f, "Heal"),
        }
    }
}

// =============================================================================
// STRUCTURAL
// =============================================================================

/// A graph defect the structural pass could not repair, or an input it could
/// not read at all.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum StructuralError {
    #[error("failed to parse graph JSON: {0}")]
    Parse(String),
    #[error("unrecognised graph shape: {0}")]
    Shape(String),
    #[error("duplicate component name '{0}'")]
    DuplicateComponent(String),
    #[error("binding {from_component}.{from_port} -> {to_component}.{to_port} does not resolve")]
    DanglingBinding {
        from_component: String,
        from_port: String,
        to_component: String,
        to_port: String,
    },
    #[error("graph contains a cycle through '{0}'")]
    Cycle(String),
    #[error("terminal component '{0}' still has outputs")]
    TerminalOutputs(String),
}

impl StructuralError {
    /// Input that could not be read is a contract failure; everything else
    /// is a defect left over after healing.
    pub fn phase(&self) -> Phase {
        match self {
            StructuralError::Parse(_)
            | StructuralError::Shape(_)
            | StructuralError::DuplicateComponent(_) => Phase::Contract,
            StructuralError::DanglingBinding { .. }
            | StructuralError::Cycle(_)
            | StructuralError::TerminalOutputs(_) => Phase::Structural,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StructuralError::Parse(_) => "S001",
            StructuralError::Shape(_) => "S002",
            StructuralError::DuplicateComponent(_) => "S003",
            StructuralError::DanglingBinding { .. } => "S004",
            StructuralError::Cycle(_) => "S005",
            StructuralError::TerminalOutputs(_) => "S006",
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextBuildError {
    #[error("component '{0}' is not present in the graph")]
    ComponentNotFound(String),
    #[error("component '{component}' is malformed: {reason}")]
    Malformed { component: String, reason: String },
}

// =============================================================================
// CONFIG VALIDATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    Missing,
    TypeMismatch,
    Invalid,
    Conflict,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationErrorKind::Missing => write!(f, "missing"),
            ValidationErrorKind::TypeMismatch => write!(f, "type_mismatch"),
            ValidationErrorKind::Invalid => write!(f, "invalid"),
            ValidationErrorKind::Conflict => write!(f, "conflict"),
        }
    }
}

/// One field-level finding from the config validator.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("[{code}] {component}.{field}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub component: String,
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
    pub suggestion: Option<String>,
    /// For `requires` conflicts, the absent companion field.
    pub companion: Option<String>,
}

impl ValidationError {
    /// Stable descriptor used for cache keys and AI prompts.
    pub fn descriptor(&self) -> String {
        format!("{}:{}:{}", self.field, self.kind, self.code)
    }

    /// The field a healer must produce a value for to clear this error.
    pub fn target_field(&self) -> &str {
        self.companion.as_deref().unwrap_or(&self.field)
    }
}

// =============================================================================
// SEMANTIC HEALING
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiBackendError {
    #[error("AI backend request failed: {0}")]
    Request(String),
    #[error("AI backend timed out")]
    Timeout,
    #[error("AI backend response could not be parsed: {0}")]
    UnparseableResponse(String),
}

/// No strategy produced a valid value for every outstanding field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("healing '{component}' failed after {attempts} attempt(s); unresolved: {}", .unresolved.join(", "))]
pub struct HealingFailure {
    pub component: String,
    pub attempts: u32,
    pub unresolved: Vec<String>,
    pub detail: String,
}

/// Per-field hint shown to the operator when healing gives up.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSuggestion {
    pub field: String,
    pub field_type: String,
    pub example: Option<String>,
    pub default: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// TOP LEVEL
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum ValidationException {
    #[error("cannot build pipeline context: {0}")]
    Context(#[from] ContextBuildError),
    #[error("configuration of '{component}' ({kind}) could not be healed: {failure}")]
    HealingFailed {
        component: String,
        kind: ComponentKind,
        original: Vec<ValidationError>,
        failure: HealingFailure,
        suggestions: Vec<FieldSuggestion>,
        ai_available: bool,
    },
    #[error("healed configuration of '{component}' ({kind}) is still invalid ({} remaining error(s))", .remaining.len())]
    PostHealInvalid {
        component: String,
        kind: ComponentKind,
        original: Vec<ValidationError>,
        remaining: Vec<ValidationError>,
    },
}

impl ValidationException {
    pub fn phase(&self) -> Phase {
        match self {
            ValidationException::Context(_) => Phase::Context,
            ValidationException::HealingFailed { .. } => Phase::Heal,
            ValidationException::PostHealInvalid { .. } => Phase::Validate,
        }
    }

    pub fn component(&self) -> Option<&str> {
        match self {
            ValidationException::Context(ContextBuildError::ComponentNotFound(name)) => Some(name),
            ValidationException::Context(ContextBuildError::Malformed { component, .. }) => {
                Some(component)
            }
            ValidationException::HealingFailed { component, .. }
            | ValidationException::PostHealInvalid { component, .. } => Some(component),
        }
    }

    /// Fields the operator has to fix by hand.
    pub fn unresolved_fields(&self) -> Vec<String> {
        match self {
            ValidationException::Context(_) => vec![],
            ValidationException::HealingFailed { failure, .. } => failure.unresolved.clone(),
            ValidationException::PostHealInvalid { remaining, .. } => {
                let mut fields: Vec<String> = Vec::new();
                for e in remaining {
                    if !fields.iter().any(|f| f == &e.field) {
                        fields.push(e.field.clone());
                    }
                }
                fields
            }
        }
    }

    /// Multi-line operator-facing diagnostic block.
    pub fn render_diagnostic(&self) -> String {
        let mut out = String::new();
        match self {
            ValidationException::Context(e) => {
                out.push_str(&format!("Pipeline context error: {}\n", e));
            }
            ValidationException::HealingFailed {
                component,
                kind,
                original,
                failure,
                suggestions,
                ai_available,
            } => {
                out.push_str(&format!(
                    "Configuration for '{}' ({}) is invalid and could not be healed.\n",
                    component, kind
                ));
                out.push_str("Errors:\n");
                for e in original {
                    out.push_str(&format!("  - {}: {}\n", e.field, e.message));
                }
                out.push_str(&format!(
                    "Healing: {} attempt(s), unresolved: {}\n",
                    failure.attempts,
                    failure.unresolved.join(", ")
                ));
                if !failure.detail.is_empty() {
                    out.push_str(&format!("Detail: {}\n", failure.detail));
                }
                if !suggestions.is_empty() {
                    out.push_str("Suggestions:\n");
                    for s in suggestions {
                        out.push_str(&format!("  - {} ({})", s.field, s.field_type));
                        if let Some(example) = &s.example {
                            out.push_str(&format!(", example: {}", example));
                        }
                        if let Some(default) = &s.default {
                            out.push_str(&format!(", default: {}", default));
                        }
                        if let Some(description) = &s.description {
                            out.push_str(&format!(" - {}", description));
                        }
                        out.push('\n');
                    }
                }
                out.push_str(if *ai_available {
                    "AI-assisted healing: available\n"
                } else {
                    "AI-assisted healing: not configured\n"
                });
            }
            ValidationException::PostHealInvalid {
                component,
                kind,
                original,
                remaining,
            } => {
                out.push_str(&format!(
                    "Internal error: healed configuration for '{}' ({}) failed re-validation.\n",
                    component, kind
                ));
                out.push_str("Original errors:\n");
                for e in original {
                    out.push_str(&format!("  - {}: {}\n", e.field, e.message));
                }
                out.push_str("Remaining errors:\n");
                for e in remaining {
                    out.push_str(&format!("  - {}: {}\n", e.field, e.message));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_phases() {
        assert_eq!(StructuralError::Parse("eof".into()).phase(), Phase::Contract);
        assert_eq!(StructuralError::DuplicateComponent("a".into()).phase(), Phase::Contract);
        assert_eq!(StructuralError::Cycle("a".into()).phase(), Phase::Structural);
    }

    #[test]
    fn test_exception_phase_and_unresolved() {
        let failed = ValidationException::HealingFailed {
            component: "db".into(),
            kind: ComponentKind::Store,
            original: vec![],
            failure: HealingFailure {
                component: "db".into(),
                attempts: 1,
                unresolved: vec!["engine".into()],
                detail: String::new(),
            },
            suggestions: vec![],
            ai_available: false,
        };
        assert_eq!(failed.phase(), Phase::Heal);
        assert_eq!(failed.unresolved_fields(), vec!["engine".to_string()]);

        let missing = ValidationException::from(ContextBuildError::ComponentNotFound("x".into()));
        assert_eq!(missing.phase(), Phase::Context);
        assert_eq!(missing.component(), Some("x"));
    }
}
