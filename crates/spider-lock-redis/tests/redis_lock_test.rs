// Integration tests against a live Redis server
// Run with: REDIS_URL=redis://127.0.0.1:6379/15 cargo test -p spider-lock-redis -- --ignored

use std::sync::Arc;
use std::time::Duration;

use spider_lock::{DistributedLock, KeyTtl, LockOptions, LockStore};
use spider_lock_redis::{ConnectionRegistry, RedisLockStore};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string())
}

async fn redis_store(registry: &ConnectionRegistry) -> Arc<RedisLockStore> {
    Arc::new(
        registry
            .store(&redis_url())
            .await
            .expect("Redis must be reachable for ignored tests"),
    )
}

fn unique_key(name: &str) -> String {
    format!("{}-{}", name, std::process::id())
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_registry_reuses_connection() {
    let registry = ConnectionRegistry::default();
    let url = redis_url();

    let _first = registry.store(&url).await.unwrap();
    let _second = registry.store(&url).await.unwrap();

    assert!(registry.is_connected(&url));
    assert_eq!(registry.connected_count(), 1);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_acquire_release_roundtrip() {
    let registry = ConnectionRegistry::default();
    let store = redis_store(&registry).await;
    let key = unique_key("roundtrip");

    let options = LockOptions::default()
        .with_timeout(Duration::from_secs(30))
        .no_wait();
    let mut lock = DistributedLock::new(&key, options.clone(), store.clone()).unwrap();
    let mut other = DistributedLock::new(&key, options, store.clone()).unwrap();

    assert!(lock.acquire().await.unwrap());
    assert!(!other.acquire().await.unwrap());

    let ttl = store.ttl(lock.key()).await.unwrap().remaining().unwrap();
    assert!(ttl > Duration::ZERO && ttl <= Duration::from_secs(30));

    let prolonged = lock.prolong(Duration::from_secs(30)).await.unwrap();
    let remaining = prolonged.remaining().unwrap();
    assert!(remaining > Duration::from_secs(55) && remaining <= Duration::from_secs(60));

    lock.release().await.unwrap();
    assert_eq!(store.ttl(lock.key()).await.unwrap(), KeyTtl::Missing);
    assert!(other.acquire().await.unwrap());
    other.release().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_orphan_recovery() {
    let registry = ConnectionRegistry::default();
    let store = redis_store(&registry).await;
    let key = unique_key("orphan");

    let mut lock = DistributedLock::new(
        &key,
        LockOptions::default().with_wait_timeout(Duration::from_secs(3)),
        store.clone(),
    )
    .unwrap();

    store.delete(lock.key()).await.unwrap();
    assert!(store.set_if_absent(lock.key(), "stale").await.unwrap());
    assert_eq!(store.ttl(lock.key()).await.unwrap(), KeyTtl::Persistent);

    assert!(lock.acquire().await.unwrap());
    assert!(store.ttl(lock.key()).await.unwrap().remaining().is_some());
    lock.release().await.unwrap();
}
