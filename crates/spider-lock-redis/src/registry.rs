//! Connection registry for lock stores
//!
//! Maps a connection target (Redis URL) to one shared, multiplexed
//! connection. Entries are created lazily on first use. Each target gets its
//! own creation cell, so concurrent first callers for the same URL connect
//! exactly once while other targets are not blocked.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use spider_lock::StoreError;

use crate::store::{BACKEND, RedisLockStore, store_error};

/// Default store target
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

/// Default bound on establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Redis connection settings as found in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: String,
    pub connect_timeout_ms: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl RedisSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Render a connection target for logs with any password masked
pub fn redact_url(target: &str) -> String {
    match url::Url::parse(target) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

/// Lazily populated map from connection target to shared connection
pub struct ConnectionRegistry {
    connect_timeout: Duration,
    connections: DashMap<String, Arc<OnceCell<ConnectionManager>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS))
    }
}

impl ConnectionRegistry {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            connections: DashMap::new(),
        }
    }

    pub fn from_settings(settings: &RedisSettings) -> Self {
        Self::new(settings.connect_timeout())
    }

    /// Get the shared connection for `target`, connecting on first use
    ///
    /// A failed connection attempt leaves the target unconnected so the
    /// next call retries.
    pub async fn connection(&self, target: &str) -> Result<ConnectionManager, StoreError> {
        // Clone the cell out so no map guard is held across the await
        let cell = self
            .connections
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let conn = cell.get_or_try_init(|| self.connect(target)).await?;
        Ok(conn.clone())
    }

    /// Lock store bound to the shared connection for `target`
    pub async fn store(&self, target: &str) -> Result<RedisLockStore, StoreError> {
        Ok(RedisLockStore::new(self.connection(target).await?))
    }

    /// Whether `target` has an established connection
    pub fn is_connected(&self, target: &str) -> bool {
        self.connections
            .get(target)
            .is_some_and(|cell| cell.initialized())
    }

    /// Number of targets with an established connection
    pub fn connected_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Forget the connection for `target`; the next use reconnects
    pub fn remove(&self, target: &str) -> bool {
        let removed = self.connections.remove(target).is_some();
        if removed {
            debug!(store = %redact_url(target), "Removed lock store connection");
        }
        removed
    }

    async fn connect(&self, target: &str) -> Result<ConnectionManager, StoreError> {
        let client = redis::Client::open(target).map_err(|e| store_error("OPEN", e))?;

        info!(
            store = %redact_url(target),
            timeout_ms = self.connect_timeout.as_millis() as u64,
            "Connecting to lock store"
        );

        match tokio::time::timeout(self.connect_timeout, client.get_connection_manager()).await {
            Ok(result) => result.map_err(|e| store_error("CONNECT", e)),
            Err(elapsed) => Err(StoreError::new(BACKEND, "CONNECT", elapsed)),
        }
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connect_timeout", &self.connect_timeout)
            .field("targets", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = RedisSettings::default();
        assert_eq!(settings.url, "redis://127.0.0.1:6379/0");
        assert_eq!(settings.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_redact_url() {
        let redacted = redact_url("redis://:secret@cache.internal:6379/2");
        assert!(redacted.contains("***"));
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("cache.internal:6379"));

        assert_eq!(
            redact_url("redis://127.0.0.1:6379/0"),
            "redis://127.0.0.1:6379/0"
        );
        assert_eq!(redact_url("not a url"), "<invalid url>");
    }

    #[tokio::test]
    async fn test_invalid_target_is_not_cached() {
        let registry = ConnectionRegistry::default();

        let Err(err) = registry.connection("not-a-redis-url").await else {
            panic!("invalid target must not connect");
        };
        assert_eq!(err.operation(), "OPEN");
        assert_eq!(err.backend(), "redis");
        assert!(!registry.is_connected("not-a-redis-url"));
        assert_eq!(registry.connected_count(), 0);

        assert!(registry.remove("not-a-redis-url"));
        assert!(!registry.remove("not-a-redis-url"));
    }
}
