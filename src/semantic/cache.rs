//! Content-addressed memo of successful heals.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::graph::ComponentKind;

pub const DEFAULT_CAPACITY: usize = 256;

/// LRU memo keyed by [`HealingCache::key`]. Only successful heals are stored.
pub struct HealingCache {
    entries: Mutex<LruCache<String, Map<String, Value>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for HealingCache {
    fn default() -> Self {
        HealingCache::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for HealingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealingCache")
            .field("len", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

impl HealingCache {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        HealingCache {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// SHA-256 over component identity, the sorted error descriptors and the
    /// existing config. `serde_json::Map` iterates in key order, so the config
    /// serialization is canonical.
    pub fn key(
        component: &str,
        kind: &ComponentKind,
        errors: &[ValidationError],
        config: &Map<String, Value>,
    ) -> String {
        let mut descriptors: Vec<String> = errors.iter().map(ValidationError::descriptor).collect();
        descriptors.sort();

        let mut hasher = Sha256::new();
        hasher.update(component.as_bytes());
        hasher.update([0u8]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update([0u8]);
        for d in &descriptors {
            hasher.update(d.as_bytes());
            hasher.update([b'\n']);
        }
        hasher.update([0u8]);
        hasher.update(Value::Object(config.clone()).to_string().as_bytes());
        hex_encode_lower(&hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Map<String, Value>> {
        let found = self.lock().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, key: String, healed: Map<String, Value>) {
        self.lock().put(key, healed);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Map<String, Value>>> {
        // entries are plain data; a panic mid-insert cannot leave them torn
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn hex_encode_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use serde_json::json;

    fn error(field: &str) -> ValidationError {
        ValidationError {
            code: "C001",
            component: "c".into(),
            field: field.into(),
            kind: ValidationErrorKind::Missing,
            message: String::new(),
            suggestion: None,
            companion: None,
        }
    }

    #[test]
    fn test_key_ignores_error_order() {
        let cfg = Map::new();
        let a = HealingCache::key("c", &ComponentKind::Store, &[error("a"), error("b")], &cfg);
        let b = HealingCache::key("c", &ComponentKind::Store, &[error("b"), error("a")], &cfg);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_depends_on_identity_and_config() {
        let mut cfg = Map::new();
        let base = HealingCache::key("c", &ComponentKind::Store, &[error("a")], &cfg);
        assert_ne!(base, HealingCache::key("d", &ComponentKind::Store, &[error("a")], &cfg));
        assert_ne!(base, HealingCache::key("c", &ComponentKind::Sink, &[error("a")], &cfg));
        cfg.insert("engine".into(), json!("redis"));
        assert_ne!(base, HealingCache::key("c", &ComponentKind::Store, &[error("a")], &cfg));
    }

    #[test]
    fn test_lru_eviction_and_counters() {
        let cache = HealingCache::new(2);
        cache.insert("a".into(), Map::new());
        cache.insert("b".into(), Map::new());
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), Map::new());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!((cache.hits(), cache.misses()), (2, 1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
