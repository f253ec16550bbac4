//! AI backend capability and the defensive plumbing around it.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::AiBackendError;
use crate::settings::RetryPolicy;

/// One request/response call to a completion service.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn complete(&self, request: &AiRequest) -> Result<String, AiBackendError>;
}

/// Everything the backend sees. `requested_fields` is the full set of keys
/// the response should contain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiRequest {
    pub component: String,
    pub kind: String,
    pub context: String,
    pub requirements: Vec<String>,
    pub errors: Vec<String>,
    pub partial_config: Map<String, Value>,
    pub requested_fields: Vec<String>,
}

impl AiRequest {
    pub fn prompt(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.context);
        out.push_str("\nUnmet requirements:\n");
        for r in &self.requirements {
            out.push_str(&format!("- {}\n", r));
        }
        out.push_str("Outstanding errors:\n");
        for e in &self.errors {
            out.push_str(&format!("- {}\n", e));
        }
        out.push_str(&format!(
            "Current config: {}\n",
            Value::Object(self.partial_config.clone())
        ));
        out.push_str(&format!(
            "Respond with a single JSON object containing exactly these fields: {}\n",
            self.requested_fields.join(", ")
        ));
        out
    }
}

/// Call `backend` until it yields a parseable object or the policy runs out.
/// Parse failures are retried like transport failures.
pub async fn complete_with_retry(
    backend: &dyn AiBackend,
    request: &AiRequest,
    policy: &RetryPolicy,
) -> Result<Map<String, Value>, AiBackendError> {
    let attempts = policy.attempts();
    let mut last_error = AiBackendError::Request("no attempt made".to_string());

    for attempt in 1..=attempts {
        let outcome = match policy.call_timeout() {
            Some(limit) => match tokio::time::timeout(limit, backend.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(AiBackendError::Timeout),
            },
            None => backend.complete(request).await,
        };

        match outcome.and_then(|raw| parse_ai_response(&raw)) {
            Ok(fields) => {
                debug!(component = %request.component, attempt, "AI backend answered");
                return Ok(fields);
            }
            Err(e) => {
                warn!(
                    component = %request.component,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "AI backend attempt failed"
                );
                last_error = e;
            }
        }

        if attempt < attempts {
            let delay = policy.delay_after(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_error)
}

/// Extract a JSON object from free-form model output: the whole text, then
/// the first fenced block, then the first balanced `{...}` span.
pub fn parse_ai_response(raw: &str) -> Result<Map<String, Value>, AiBackendError> {
    let trimmed = raw.trim();
    if let Some(map) = as_object(trimmed) {
        return Ok(map);
    }
    if let Some(map) = fenced_block(trimmed).and_then(as_object) {
        return Ok(map);
    }
    if let Some(map) = balanced_object(trimmed).and_then(as_object) {
        return Ok(map);
    }

    let preview: String = trimmed.chars().take(80).collect();
    Err(AiBackendError::UnparseableResponse(preview))
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Body of the first ``` fence, with an optional language tag dropped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// First brace-balanced object, skipping braces inside string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
