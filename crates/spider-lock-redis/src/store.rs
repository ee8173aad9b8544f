// Redis-backed lock store
// SETNX / PEXPIRE / PTTL / DEL over a multiplexed connection manager

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::trace;

use spider_lock::{KeyTtl, LockStore, MAX_LEASE, StoreError};

pub(crate) const BACKEND: &str = "redis";

pub(crate) fn store_error(operation: &'static str, err: redis::RedisError) -> StoreError {
    StoreError::new(BACKEND, operation, err)
}

/// PEXPIRE argument for a ttl: rounded up to whole milliseconds so a
/// sub-millisecond lease never becomes `PEXPIRE key 0`, capped at
/// [`MAX_LEASE`] so Redis never rejects the expire time
fn duration_millis(duration: Duration) -> i64 {
    let millis = duration.min(MAX_LEASE).as_nanos().div_ceil(1_000_000);
    i64::try_from(millis).unwrap_or(i64::MAX)
}

/// Lock store on a Redis server
///
/// Cloning is cheap: every clone multiplexes over the same connection.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
}

impl RedisLockStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let created: bool = redis::cmd("SETNX")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("SETNX", e))?;
        trace!(key = %key, created, "SETNX");
        Ok(created)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(duration_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("PEXPIRE", e))?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let mut conn = self.conn.clone();
        let millis: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("PTTL", e))?;
        Ok(KeyTtl::from_pttl(millis))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("DEL", e))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockStore").finish_non_exhaustive()
    }
}
