//! Index of external identifiers already claimed somewhere in the graph.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::graph::PipelineGraph;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFamily {
    Port,
    Url,
    Path,
    Route,
    Queue,
    EnvVar,
}

impl ResourceFamily {
    /// Family of a config key, judged by its name.
    pub fn classify(key: &str) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        if key.starts_with("route") || key == "prefix" || key == "base_path" {
            Some(ResourceFamily::Route)
        } else if key == "port" || key.ends_with("_port") {
            Some(ResourceFamily::Port)
        } else if key.contains("url") || key.contains("uri") {
            Some(ResourceFamily::Url)
        } else if key.starts_with("queue")
            || key.starts_with("topic")
            || key.ends_with("_topic")
            || key.ends_with("_queue")
            || key == "channel"
        {
            Some(ResourceFamily::Queue)
        } else if key.starts_with("env") || key.ends_with("_env") {
            Some(ResourceFamily::EnvVar)
        } else if key.contains("path") || key.contains("file") || key.contains("dir") {
            Some(ResourceFamily::Path)
        } else {
            None
        }
    }

    /// Family of a requirement: its semantic tag, falling back to the field name.
    pub fn for_field(semantic: Option<&str>, field: &str) -> Option<Self> {
        let from_tag = semantic.and_then(|tag| match tag.to_ascii_lowercase().as_str() {
            "port" => Some(ResourceFamily::Port),
            "url" | "uri" | "connection" => Some(ResourceFamily::Url),
            "path" | "file" | "dir" => Some(ResourceFamily::Path),
            "route" | "prefix" => Some(ResourceFamily::Route),
            "queue" | "topic" | "channel" => Some(ResourceFamily::Queue),
            "env" | "env_var" | "secret" => Some(ResourceFamily::EnvVar),
            _ => None,
        });
        from_tag.or_else(|| Self::classify(field))
    }

    /// Env vars are shared by design; every other family must stay unique.
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, ResourceFamily::EnvVar)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsedResources {
    pub ports: BTreeSet<u64>,
    pub urls: BTreeSet<String>,
    pub paths: BTreeSet<String>,
    pub routes: BTreeSet<String>,
    pub queues: BTreeSet<String>,
    pub env_vars: BTreeSet<String>,
}

impl UsedResources {
    pub fn from_graph(graph: &PipelineGraph) -> Self {
        let mut index = UsedResources::default();
        for component in &graph.components {
            index.record_map(&component.config);
        }
        index
    }

    pub fn record_map(&mut self, config: &Map<String, Value>) {
        for (key, value) in config {
            self.record(key, value);
        }
    }

    pub fn record(&mut self, key: &str, value: &Value) {
        match value {
            Value::Object(map) => {
                self.record_map(map);
                return;
            }
            Value::Array(items) => {
                for item in items {
                    self.record(key, item);
                }
                return;
            }
            Value::String(s) => self.record_placeholders(s),
            _ => {}
        }

        let family = ResourceFamily::classify(key).or_else(|| {
            // a bare `host` only counts when it carries a full URL
            let lower = key.to_ascii_lowercase();
            let is_url_host = lower == "host" && value.as_str().is_some_and(|s| s.contains("://"));
            is_url_host.then_some(ResourceFamily::Url)
        });
        if let Some(family) = family {
            self.insert(family, value);
        }
    }

    fn record_placeholders(&mut self, s: &str) {
        for caps in PLACEHOLDER.captures_iter(s) {
            if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
                self.env_vars.insert(name.as_str().to_string());
            }
        }
    }

    fn insert(&mut self, family: ResourceFamily, value: &Value) {
        if family == ResourceFamily::Port {
            if let Some(port) = port_of(value) {
                self.ports.insert(port);
            }
            return;
        }
        let Some(text) = text_of(value) else { return };
        match family {
            ResourceFamily::Url => self.urls.insert(text),
            ResourceFamily::Path => self.paths.insert(text),
            ResourceFamily::Route => self.routes.insert(normalize_route(&text)),
            ResourceFamily::Queue => self.queues.insert(text),
            ResourceFamily::EnvVar => self.env_vars.insert(text),
            ResourceFamily::Port => false,
        };
    }

    pub fn contains(&self, family: ResourceFamily, value: &Value) -> bool {
        match family {
            ResourceFamily::Port => port_of(value).is_some_and(|p| self.ports.contains(&p)),
            ResourceFamily::Route => {
                text_of(value).is_some_and(|t| self.routes.contains(&normalize_route(&t)))
            }
            _ => {
                let Some(text) = text_of(value) else {
                    return false;
                };
                let set = match family {
                    ResourceFamily::Url => &self.urls,
                    ResourceFamily::Path => &self.paths,
                    ResourceFamily::Queue => &self.queues,
                    _ => &self.env_vars,
                };
                set.contains(&text)
            }
        }
    }

    /// True when `value` is already claimed in an exclusive family.
    pub fn collides(&self, family: ResourceFamily, value: &Value) -> bool {
        family.is_exclusive() && self.contains(family, value)
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
            && self.urls.is_empty()
            && self.paths.is_empty()
            && self.routes.is_empty()
            && self.queues.is_empty()
            && self.env_vars.is_empty()
    }
}

fn port_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn normalize_route(route: &str) -> String {
    let trimmed = route.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
