// In-process lock store
// Expiry-aware key map with the same semantics the Redis store exposes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreError;
use crate::options::MAX_LEASE;
use crate::store::{KeyTtl, LockStore};

/// Deadline `ttl` after `now`, capped at [`MAX_LEASE`]
///
/// Never `None`: an entry without a deadline reads as an orphan.
fn deadline(now: Instant, ttl: Duration) -> Instant {
    let mut ttl = ttl.min(MAX_LEASE);
    loop {
        if let Some(deadline) = now.checked_add(ttl) {
            return deadline;
        }
        ttl /= 2;
    }
}

/// A stored key with its optional deadline
#[derive(Debug, Clone)]
struct StoredEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory store using DashMap
///
/// Expired keys are dropped lazily on access. Deadlines use the tokio
/// clock, so paused-time tests see keys expire as virtual time advances.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    entries: Arc<DashMap<String, StoredEntry>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, if present and not expired
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_if_expired(&self, key: &str, now: Instant) {
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some();
        if removed {
            debug!(key = %key, "Dropped expired lock entry");
        }
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredEntry {
                        value: value.to_string(),
                        expires_at: None,
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredEntry {
                    value: value.to_string(),
                    expires_at: None,
                });
                Ok(true)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        self.purge_if_expired(key, now);

        if ttl.is_zero() {
            self.entries.remove(key);
            return Ok(());
        }

        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(deadline(now, ttl));
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let now = Instant::now();
        self.purge_if_expired(key, now);

        Ok(match self.entries.get(key) {
            None => KeyTtl::Missing,
            Some(entry) => match entry.expires_at {
                Some(deadline) => KeyTtl::Expires(deadline.saturating_duration_since(now)),
                None => KeyTtl::Persistent,
            },
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_is_exclusive() {
        let store = MemoryLockStore::new();

        assert!(store.set_if_absent("k", "1").await.unwrap());
        assert!(!store.set_if_absent("k", "2").await.unwrap());
        assert_eq!(store.get("k").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_new_key_has_no_expiry() {
        let store = MemoryLockStore::new();

        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Missing);
        store.set_if_absent("k", "1").await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_and_lazy_eviction() {
        let store = MemoryLockStore::new();
        store.set_if_absent("k", "1").await.unwrap();
        store.expire("k", Duration::from_secs(10)).await.unwrap();

        assert_eq!(
            store.ttl("k").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(10))
        );

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(
            store.ttl("k").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(6))
        );

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Missing);
        assert!(store.is_empty());

        // Expired key no longer blocks creation
        assert!(store.set_if_absent("k", "2").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_zero_removes_key() {
        let store = MemoryLockStore::new();
        store.set_if_absent("k", "1").await.unwrap();
        store.expire("k", Duration::ZERO).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_huge_ttl_is_capped_not_persistent() {
        let store = MemoryLockStore::new();
        store.set_if_absent("k", "1").await.unwrap();
        store.expire("k", Duration::MAX).await.unwrap();

        let ttl = store.ttl("k").await.unwrap();
        assert_ne!(ttl, KeyTtl::Persistent);
        let remaining = ttl.remaining().unwrap();
        assert!(remaining > Duration::ZERO && remaining <= MAX_LEASE);
    }

    #[tokio::test]
    async fn test_expire_missing_key_is_noop() {
        let store = MemoryLockStore::new();
        store.expire("absent", Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.ttl("absent").await.unwrap(), KeyTtl::Missing);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryLockStore::new();
        store.set_if_absent("k", "1").await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").is_none());
    }
}
