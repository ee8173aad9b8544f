//! Spider Lock Redis - Redis store for spider-lock
//!
//! This crate provides:
//! - `RedisLockStore`: the `LockStore` contract over a Redis server
//! - `ConnectionRegistry`: shared connections keyed by connection target
//! - `RedisSettings`: configuration-file shape for the store target

pub mod registry;
pub mod store;

pub use registry::{ConnectionRegistry, DEFAULT_REDIS_URL, RedisSettings, redact_url};
pub use store::RedisLockStore;
