//! Tunables for the healer, loadable from JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::heal::DEFAULT_MAX_ROUNDS;

/// Bounded retry with exponential backoff for AI backend calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: u32,
    /// Per-call timeout; `None` waits as long as the backend takes.
    pub call_timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 2_000,
            factor: 2,
            call_timeout_ms: None,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            factor: 1,
            call_timeout_ms: None,
        }
    }

    /// Delay after the `attempt`-th failure (1-based): base * factor^(attempt-1).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let multiplier = u64::from(self.factor).saturating_pow(exp);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier))
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealerSettings {
    pub retry: RetryPolicy,
    pub cache_capacity: usize,
    pub max_heal_rounds: usize,
    /// When false a configured AI backend is ignored.
    pub enable_ai: bool,
}

impl Default for HealerSettings {
    fn default() -> Self {
        HealerSettings {
            retry: RetryPolicy::default(),
            cache_capacity: 256,
            max_heal_rounds: DEFAULT_MAX_ROUNDS,
            enable_ai: true,
        }
    }
}

impl HealerSettings {
    /// Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
