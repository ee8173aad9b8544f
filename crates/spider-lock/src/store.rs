//! Store contract used by the lock
//!
//! The lock needs four primitives from its backing store: an atomic
//! create-if-absent, ttl set, ttl read and unconditional delete. Only
//! create-if-absent has to be atomic; the others may interleave freely
//! with other clients.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Remaining lifetime of a key as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key exists and expires after the given duration
    Expires(Duration),
    /// Key exists but has no expiry configured
    Persistent,
    /// Key does not exist
    Missing,
}

impl KeyTtl {
    /// Decode a Redis `PTTL` reply (`-2` missing, `-1` no expiry)
    pub fn from_pttl(millis: i64) -> Self {
        match millis {
            -2 => KeyTtl::Missing,
            m if m < 0 => KeyTtl::Persistent,
            m => KeyTtl::Expires(Duration::from_millis(m as u64)),
        }
    }

    /// Encode back into the Redis `PTTL` convention
    pub fn as_pttl(&self) -> i64 {
        match self {
            KeyTtl::Expires(remaining) => {
                i64::try_from(remaining.as_millis()).unwrap_or(i64::MAX)
            }
            KeyTtl::Persistent => -1,
            KeyTtl::Missing => -2,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(remaining) => Some(*remaining),
            _ => None,
        }
    }

    /// True for the two sentinel states
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, KeyTtl::Expires(_))
    }
}

impl std::fmt::Display for KeyTtl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyTtl::Expires(remaining) => write!(f, "{}ms", remaining.as_millis()),
            KeyTtl::Persistent => write!(f, "persistent"),
            KeyTtl::Missing => write!(f, "missing"),
        }
    }
}

/// Key-value store with native key expiry
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Short backend label used in logs and errors
    fn name(&self) -> &'static str;

    /// Create `key` with `value` only if it does not exist yet.
    ///
    /// Returns `true` when this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Set the remaining lifetime of `key`. A zero ttl removes the key.
    /// Missing keys are left untouched.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read the remaining lifetime of `key`
    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;

    /// Remove `key` if present
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ttl_from_pttl() {
        assert_eq!(KeyTtl::from_pttl(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::from_pttl(-1), KeyTtl::Persistent);
        assert_eq!(
            KeyTtl::from_pttl(1500),
            KeyTtl::Expires(Duration::from_millis(1500))
        );
        assert_eq!(KeyTtl::from_pttl(0), KeyTtl::Expires(Duration::ZERO));
    }

    #[test]
    fn test_key_ttl_sentinels() {
        assert!(KeyTtl::Missing.is_sentinel());
        assert!(KeyTtl::Persistent.is_sentinel());
        assert!(!KeyTtl::Expires(Duration::from_secs(1)).is_sentinel());
        assert_eq!(KeyTtl::Persistent.as_pttl(), -1);
        assert_eq!(KeyTtl::Missing.as_pttl(), -2);
        assert_eq!(KeyTtl::Missing.remaining(), None);
    }

    #[test]
    fn test_key_ttl_display() {
        assert_eq!(KeyTtl::Expires(Duration::from_secs(2)).to_string(), "2000ms");
        assert_eq!(KeyTtl::Persistent.to_string(), "persistent");
        assert_eq!(KeyTtl::Missing.to_string(), "missing");
    }
}
