//! Error types for lock operations
//!
//! Contention, wait timeout and `break_wait` cancellation are not errors:
//! they surface as an unheld lock. Only invalid construction parameters and
//! store failures are reported through this module.

use std::error::Error as StdError;

/// Failure talking to the backing store
///
/// Records which store operation failed and keeps the backend error as
/// the source so callers can downcast to the concrete client error.
#[derive(thiserror::Error, Debug)]
#[error("{operation} failed on {backend} store: {source}")]
pub struct StoreError {
    backend: &'static str,
    operation: &'static str,
    #[source]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl StoreError {
    pub fn new<E>(backend: &'static str, operation: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            backend,
            operation,
            source: source.into(),
        }
    }

    /// Store implementation that raised the error (e.g. "redis")
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Store operation that failed (e.g. "SET NX")
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

/// Lock error taxonomy
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl LockError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, LockError::InvalidArgument(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, LockError::StoreUnavailable(_))
    }
}

pub type Result<T, E = LockError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_keeps_source() {
        let err = StoreError::new("memory", "PTTL", "connection reset");
        assert_eq!(err.backend(), "memory");
        assert_eq!(err.operation(), "PTTL");
        assert_eq!(
            err.to_string(),
            "PTTL failed on memory store: connection reset"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_lock_error_from_store_error() {
        let err: LockError = StoreError::new("redis", "DEL", "broken pipe").into();
        assert!(err.is_store_unavailable());
        assert!(!err.is_invalid_argument());
        assert!(err.to_string().starts_with("store unavailable:"));
    }
}
