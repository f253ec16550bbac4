//! Declarative per-field configuration contracts.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};

/// Declared JSON type of a config field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldType {
    /// Integers satisfy `Number`; numeric strings satisfy neither.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accepted value(s) for one `depends_on` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    One(Value),
    AnyOf(Vec<Value>),
}

impl Expected {
    pub fn holds(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            Expected::One(v) => v == actual,
            Expected::AnyOf(vs) => vs.contains(actual),
        }
    }
}

/// Custom check on a present value. `Ok(false)` and `Err(reason)` both reject.
pub type FieldPredicate = Arc<dyn Fn(&Value) -> Result<bool, String> + Send + Sync>;

#[derive(Clone)]
pub struct ConfigRequirement {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    /// Raw example text; parsed as JSON when possible.
    pub example: Option<String>,
    /// Resource tag such as `port`, `url`, `path`, `route`, `topic`, `env`.
    pub semantic: Option<String>,
    pub validator: Option<FieldPredicate>,
    pub depends_on: Vec<(String, Expected)>,
    pub conflicts_with: Vec<String>,
    pub requires: Vec<String>,
    pub options: Vec<Value>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Regex matched against the whole string value.
    pub pattern: Option<String>,
    pub description: Option<String>,
    /// Anchored `pattern`, compiled on first use.
    compiled_pattern: OnceCell<Result<Regex, String>>,
}

impl ConfigRequirement {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        ConfigRequirement {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            example: None,
            semantic: None,
            validator: None,
            depends_on: vec![],
            conflicts_with: vec![],
            requires: vec![],
            options: vec![],
            min: None,
            max: None,
            pattern: None,
            description: None,
            compiled_pattern: OnceCell::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn semantic(mut self, tag: impl Into<String>) -> Self {
        self.semantic = Some(tag.into());
        self
    }

    pub fn validator<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(predicate));
        self
    }

    pub fn depends_on(mut self, key: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.depends_on
            .push((key.into(), Expected::One(expected.into())));
        self
    }

    pub fn depends_on_any<V: Into<Value>>(
        mut self,
        key: impl Into<String>,
        expected: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = expected.into_iter().map(Into::into).collect();
        self.depends_on.push((key.into(), Expected::AnyOf(values)));
        self
    }

    pub fn conflicts_with(mut self, field: impl Into<String>) -> Self {
        self.conflicts_with.push(field.into());
        self
    }

    pub fn requires(mut self, field: impl Into<String>) -> Self {
        self.requires.push(field.into());
        self
    }

    pub fn options<V: Into<Value>>(mut self, options: impl IntoIterator<Item = V>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self.compiled_pattern = OnceCell::new();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The whole-value regex for `pattern`, compiled once per requirement.
    /// `Err` carries the compile error for an unusable pattern.
    pub fn pattern_regex(&self) -> Option<Result<&Regex, &str>> {
        let pattern = self.pattern.as_deref()?;
        let compiled = self.compiled_pattern.get_or_init(|| {
            Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| e.to_string())
        });
        Some(compiled.as_ref().map_err(String::as_str))
    }

    /// With `depends_on` set, required iff every condition holds against
    /// `config`; otherwise the static flag.
    pub fn is_required(&self, config: &Map<String, Value>) -> bool {
        if self.depends_on.is_empty() {
            return self.required;
        }
        self.depends_on
            .iter()
            .all(|(key, expected)| expected.holds(config.get(key)))
    }

    /// The example as a JSON value, falling back to the literal string.
    pub fn parsed_example(&self) -> Option<Value> {
        self.example.as_deref().map(parse_example)
    }

    /// One-line hint for operators: the example, else the default.
    pub fn suggestion(&self) -> Option<String> {
        if let Some(example) = &self.example {
            return Some(format!("set '{}', e.g. {}", self.name, example));
        }
        self.default
            .as_ref()
            .map(|d| format!("set '{}', default is {}", self.name, d))
    }

    /// Human-readable contract line used in AI prompts.
    pub fn describe(&self) -> String {
        let mut line = format!("{} ({})", self.name, self.field_type);
        if !self.options.is_empty() {
            let opts: Vec<String> = self.options.iter().map(Value::to_string).collect();
            line.push_str(&format!(", one of [{}]", opts.join(", ")));
        }
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => line.push_str(&format!(", between {} and {}", lo, hi)),
            (Some(lo), None) => line.push_str(&format!(", at least {}", lo)),
            (None, Some(hi)) => line.push_str(&format!(", at most {}", hi)),
            (None, None) => {}
        }
        if let Some(p) = &self.pattern {
            line.push_str(&format!(", matching /{}/", p));
        }
        if let Some(e) = &self.example {
            line.push_str(&format!(", e.g. {}", e));
        }
        if let Some(d) = &self.description {
            line.push_str(&format!(": {}", d));
        }
        line
    }
}

impl std::fmt::Debug for ConfigRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRequirement")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("example", &self.example)
            .field("semantic", &self.semantic)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .field("depends_on", &self.depends_on)
            .field("conflicts_with", &self.conflicts_with)
            .field("requires", &self.requires)
            .field("options", &self.options)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("pattern", &self.pattern)
            .finish()
    }
}

pub fn parse_example(example: &str) -> Value {
    serde_json::from_str(example).unwrap_or_else(|_| Value::String(example.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_depends_on_single_and_set() {
        let req = ConfigRequirement::new("path", FieldType::String).depends_on("mode", "file");
        let mut config = Map::new();
        assert!(!req.is_required(&config));
        config.insert("mode".into(), json!("file"));
        assert!(req.is_required(&config));

        let req = ConfigRequirement::new("url", FieldType::String)
            .depends_on_any("mode", ["http", "https"]);
        config.insert("mode".into(), json!("https"));
        assert!(req.is_required(&config));
        config.insert("mode".into(), json!("ftp"));
        assert!(!req.is_required(&config));
    }

    #[test]
    fn test_depends_on_overrides_static_flag() {
        let req = ConfigRequirement::new("topic", FieldType::String)
            .required()
            .depends_on("broker", "kafka");
        assert!(!req.is_required(&Map::new()));
    }

    #[test]
    fn test_example_parsing() {
        assert_eq!(parse_example("8080"), json!(8080));
        assert_eq!(parse_example("[1, 2]"), json!([1, 2]));
        assert_eq!(parse_example("/api/v1"), json!("/api/v1"));
    }

    #[test]
    fn test_pattern_compiled_once_and_anchored() {
        let req = ConfigRequirement::new("topic", FieldType::String).pattern("[a-z]+");
        let first = req.pattern_regex().unwrap().unwrap() as *const Regex;
        let second = req.pattern_regex().unwrap().unwrap() as *const Regex;
        assert_eq!(first, second);
        assert!(req.pattern_regex().unwrap().unwrap().is_match("orders"));
        assert!(!req.pattern_regex().unwrap().unwrap().is_match("orders-1"));

        let broken = ConfigRequirement::new("topic", FieldType::String).pattern("(");
        assert!(broken.pattern_regex().unwrap().is_err());
        assert!(ConfigRequirement::new("x", FieldType::String).pattern_regex().is_none());
    }

    #[test]
    fn test_integer_satisfies_number() {
        assert!(FieldType::Number.matches(&json!(3)));
        assert!(!FieldType::Integer.matches(&json!(3.5)));
        assert!(!FieldType::Integer.matches(&json!("3")));
    }
}
