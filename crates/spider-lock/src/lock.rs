//! Distributed lock state machine
//!
//! Coordination goes entirely through the [`LockStore`]: contenders race
//! on an atomic create-if-absent, the winner gives the key a ttl (the
//! lease), and everyone else polls until the key disappears, the wait
//! budget runs out, or `break_wait` asks them to stop.
//!
//! There is no ownership token. `release` deletes the key even if the
//! lease already expired and another process acquired it since; pick a
//! `timeout` longer than any legitimate critical section.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::clock::{Clock, TokioClock};
use crate::error::{LockError, Result};
use crate::options::{LockOptions, MAX_LEASE, MIN_LEASE};
use crate::store::{KeyTtl, LockStore};

/// Cancellation predicate polled once per wait iteration
pub type BreakWait = Arc<dyn Fn() -> bool + Send + Sync>;

/// Lock on a named resource, coordinated through a shared store
pub struct DistributedLock {
    key: String,
    options: LockOptions,
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    break_wait: Option<BreakWait>,
    held: bool,
}

impl DistributedLock {
    /// Create a lock for `key` with the given options
    ///
    /// Fails with [`LockError::InvalidArgument`] when the key is empty or
    /// the lease timeout is outside [`MIN_LEASE`]..=[`MAX_LEASE`].
    pub fn new(
        key: impl AsRef<str>,
        options: LockOptions,
        store: Arc<dyn LockStore>,
    ) -> Result<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(LockError::InvalidArgument("lock key is empty".to_string()));
        }
        if options.timeout < MIN_LEASE || options.timeout > MAX_LEASE {
            return Err(LockError::InvalidArgument(format!(
                "lock timeout must be between {:?} and {:?}, got {:?}",
                MIN_LEASE, MAX_LEASE, options.timeout
            )));
        }

        Ok(Self {
            key: options.namespaced_key(key),
            options,
            store,
            clock: Arc::new(TokioClock),
            break_wait: None,
            held: false,
        })
    }

    /// Stop waiting as soon as `predicate` returns true
    pub fn with_break_wait<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.break_wait = Some(Arc::new(predicate));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Namespaced store key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Contend for the lock until it is acquired, the wait timeout
    /// elapses, or `break_wait` fires.
    ///
    /// Returns whether the lock is now held. Losing the race is not an
    /// error; only store failures are.
    pub async fn acquire(&mut self) -> Result<bool> {
        if self.held {
            return Ok(true);
        }

        let start = self.clock.now();
        let backoff = self.options.backoff();
        debug!(lock = %self, "Preparing to acquire lock");

        loop {
            let stamp = chrono::Utc::now().timestamp_millis().to_string();
            if self.store.set_if_absent(&self.key, &stamp).await? {
                self.store.expire(&self.key, self.options.timeout).await?;
                self.held = true;
                debug!(lock = %self, timeout = ?self.options.timeout, "Lock acquired");
                return Ok(true);
            }

            // A holder killed between create and expire leaves a key that
            // never expires. Clear it so the next attempt can win.
            if self.store.ttl(&self.key).await? == KeyTtl::Persistent {
                warn!(lock = %self, "Deleting orphaned lock entry without expiry");
                self.store.delete(&self.key).await?;
            }

            if self.options.wait_timeout.is_zero() {
                debug!(lock = %self, "Lock is busy and waiting is disabled");
                break;
            }

            let waited = self.clock.now().duration_since(start);
            if waited > self.options.wait_timeout {
                debug!(lock = %self, waited = ?waited, "Gave up waiting for lock");
                break;
            }

            if self.break_wait.as_ref().is_some_and(|predicate| predicate()) {
                debug!(lock = %self, waited = ?waited, "break_wait fired, no longer waiting");
                break;
            }

            debug!(lock = %self, waited = ?waited, "Waiting for lock");
            self.clock.sleep(backoff).await;
        }

        Ok(false)
    }

    /// Delete the store entry if this instance holds the lock
    pub async fn release(&mut self) -> Result<()> {
        if self.held {
            self.store.delete(&self.key).await?;
            self.held = false;
            debug!(lock = %self, "Lock released");
        }
        Ok(())
    }

    /// Extend the current lease by `extra`
    ///
    /// Returns the ttl reported after the update. When the key has no
    /// lease (missing or persistent) the sentinel is returned and nothing
    /// is written. The new lease is capped at [`MAX_LEASE`]. The read and
    /// the write are separate store calls.
    pub async fn prolong(&self, extra: Duration) -> Result<KeyTtl> {
        let current = match self.store.ttl(&self.key).await? {
            KeyTtl::Expires(remaining) => remaining,
            sentinel => return Ok(sentinel),
        };

        let lease = current.saturating_add(extra).min(MAX_LEASE);
        self.store.expire(&self.key, lease).await?;
        let ttl = self.store.ttl(&self.key).await?;
        debug!(lock = %self, extra = ?extra, ttl = %ttl, "Lock lease prolonged");
        Ok(ttl)
    }

    /// Run `body` inside the lock
    ///
    /// Acquires first unless already held, hands `body` whether the lock is
    /// held, and releases once `body` completes or panics. A panic inside
    /// `body` is resumed after the release.
    ///
    /// Dropping the returned future before it completes (a losing
    /// `tokio::select!` branch, a timeout) skips the release: the lock stays
    /// held until [`release`](Self::release) is called or the lease expires.
    pub async fn scoped<F, Fut, T>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.held {
            self.acquire().await?;
        }

        let outcome = AssertUnwindSafe(body(self.held)).catch_unwind().await;
        let released = self.release().await;

        match outcome {
            Ok(value) => released.map(|()| value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl fmt::Display for DistributedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<RedisLock: {}>", self.key)
    }
}

impl fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedLock")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("store", &self.store.name())
            .field("break_wait", &self.break_wait.is_some())
            .field("held", &self.held)
            .finish()
    }
}

impl Drop for DistributedLock {
    fn drop(&mut self) {
        if self.held {
            warn!(
                lock = %self,
                timeout = ?self.options.timeout,
                "Lock dropped while held; entry remains until its lease expires"
            );
        }
    }
}
