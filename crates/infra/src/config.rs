//! Processor configuration (retry policy for optimistic commits).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_MAX_ATTEMPTS: &str = "LOTSTOCK_MAX_ATTEMPTS";
pub const ENV_RETRY_BASE_MS: &str = "LOTSTOCK_RETRY_BASE_MS";
pub const ENV_RETRY_MAX_MS: &str = "LOTSTOCK_RETRY_MAX_MS";

/// Backoff used when a commit loses a version race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per command, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first conflict.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay after the given failed attempt (1-indexed): `base * 2^(attempt-1)`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts.max(1)
    }
}

/// Transaction processor settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    pub retry: RetryPolicy,
}

impl ProcessorConfig {
    /// Read overrides from `LOTSTOCK_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RetryPolicy::default();
        let parse = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(err) => {
                    warn!(%key, value = %raw, error = %err, "ignoring invalid setting");
                    None
                }
            }
        };

        let max_attempts = parse(ENV_MAX_ATTEMPTS)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|&v| v > 0)
            .unwrap_or(defaults.max_attempts);
        let base_delay = parse(ENV_RETRY_BASE_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay);
        let max_delay = parse(ENV_RETRY_MAX_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay);

        Self {
            retry: RetryPolicy::exponential(max_attempts, base_delay, max_delay.max(base_delay)),
        }
    }
}
