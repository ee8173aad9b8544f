//! Lock options and their serde-facing settings
//!
//! `LockSettings` is the shape found in configuration files (plain seconds,
//! signed wait timeout). `LockOptions` is what the lock runs with.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default namespace prepended to every lock key
pub const DEFAULT_KEY_PREFIX: &str = "redis_lock";

/// Default lease: 5 minutes
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default maximum wait: 8 hours
pub const DEFAULT_WAIT_TIMEOUT_SECS: i64 = 8 * 3600;

/// Shortest lease a store can represent
pub const MIN_LEASE: Duration = Duration::from_millis(1);

/// Longest accepted lease (100 years); deadlines stay representable in
/// every store
pub const MAX_LEASE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Wait timeouts up to this bound poll with the short backoff
pub const SHORT_WAIT_THRESHOLD: Duration = Duration::from_secs(10);

/// Poll interval for short waits
pub const SHORT_WAIT_BACKOFF: Duration = Duration::from_secs(1);

/// Poll interval for long waits
pub const LONG_WAIT_BACKOFF: Duration = Duration::from_secs(5);

/// Runtime options for a lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Lease length once acquired
    pub timeout: Duration,
    /// Maximum time spent contending; zero means try once
    pub wait_timeout: Duration,
    /// Namespace prepended to the key
    pub key_prefix: String,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS as u64),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl LockOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Try once and never wait
    pub fn no_wait(self) -> Self {
        self.with_wait_timeout(Duration::ZERO)
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sleep between polls: 1s for waits up to 10s, 5s beyond that
    pub fn backoff(&self) -> Duration {
        if self.wait_timeout > SHORT_WAIT_THRESHOLD {
            LONG_WAIT_BACKOFF
        } else {
            SHORT_WAIT_BACKOFF
        }
    }

    /// Store key for a caller-supplied lock name
    pub fn namespaced_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

/// Configuration file representation of [`LockOptions`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub key_prefix: String,
    pub timeout_secs: u64,
    /// Values `<= 0` disable waiting
    pub wait_timeout_secs: i64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
        }
    }
}

impl From<&LockSettings> for LockOptions {
    fn from(settings: &LockSettings) -> Self {
        let wait_secs = u64::try_from(settings.wait_timeout_secs).unwrap_or(0);
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            wait_timeout: Duration::from_secs(wait_secs),
            key_prefix: settings.key_prefix.clone(),
        }
    }
}

impl From<LockSettings> for LockOptions {
    fn from(settings: LockSettings) -> Self {
        Self::from(&settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LockOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(300));
        assert_eq!(options.wait_timeout, Duration::from_secs(28800));
        assert_eq!(options.key_prefix, "redis_lock");
        assert_eq!(LockOptions::from(LockSettings::default()), options);
    }

    #[test]
    fn test_backoff_selection() {
        let options = LockOptions::default();
        assert_eq!(options.backoff(), LONG_WAIT_BACKOFF);

        let options = options.with_wait_timeout(Duration::from_secs(10));
        assert_eq!(options.backoff(), SHORT_WAIT_BACKOFF);

        let options = options.with_wait_timeout(Duration::from_millis(10_001));
        assert_eq!(options.backoff(), LONG_WAIT_BACKOFF);

        assert_eq!(LockOptions::default().no_wait().backoff(), SHORT_WAIT_BACKOFF);
    }

    #[test]
    fn test_negative_wait_timeout_disables_waiting() {
        let settings = LockSettings {
            wait_timeout_secs: -1,
            ..Default::default()
        };
        let options = LockOptions::from(&settings);
        assert!(options.wait_timeout.is_zero());
    }

    #[test]
    fn test_namespaced_key() {
        let options = LockOptions::default();
        assert_eq!(options.namespaced_key("crawler"), "redis_lock:crawler");

        let options = options.with_key_prefix("");
        assert_eq!(options.namespaced_key("crawler"), "crawler");
    }
}
