//! Spider Lock - store-coordinated distributed mutual exclusion
//!
//! Independent worker processes serialize access to a named resource by
//! racing on a key in a shared key-value store with native expiry. The
//! processes never talk to each other; the store is the only shared state.
//!
//! This crate provides:
//! - `DistributedLock`: acquire / wait / release / prolong protocol
//! - `LockStore`: the store contract, plus `MemoryLockStore`
//! - `Clock`: monotonic time and sleep used by the wait loop
//! - `LockOptions` / `LockSettings`: runtime and configuration-file options
//!
//! ```rust,ignore
//! let store = Arc::new(MemoryLockStore::new());
//! let mut lock = DistributedLock::new("crawler", LockOptions::default(), store)?;
//! lock.scoped(|held| async move {
//!     if held {
//!         // critical section
//!     }
//! })
//! .await?;
//! ```

pub mod clock;
pub mod error;
pub mod lock;
pub mod memory;
pub mod options;
pub mod store;

pub use clock::{Clock, TokioClock};
pub use error::{LockError, StoreError};
pub use lock::{BreakWait, DistributedLock};
pub use memory::MemoryLockStore;
pub use options::{DEFAULT_KEY_PREFIX, LockOptions, LockSettings, MAX_LEASE, MIN_LEASE};
pub use store::{KeyTtl, LockStore};
