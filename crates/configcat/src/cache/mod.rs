//! # Config Cache
//!
//! Pluggable storage for the last downloaded configuration.
//!
//! ## Cache Types
//!
//! * [`NullConfigCache`] - stores nothing, the client keeps the config in memory only
//! * [`InMemoryConfigCache`] - process local map, shared between clients that use the same instance
//! * custom implementations of [`ConfigCache`], e.g. backed by a file or a key-value store
//!
//! The client never hands raw keys to a cache: it wraps every cache in a
//! [`ConfigJsonCache`] that derives a stable key from the SDK key and
//! serializes the config together with its ETag and fetch time.

mod in_memory;
mod json_cache;

pub use in_memory::InMemoryConfigCache;
pub use json_cache::ConfigJsonCache;

use crate::error::Result;

/// Core trait defining config cache behavior
pub trait ConfigCache: Send + Sync + std::fmt::Debug {
    /// Reads the value stored under `key`
    fn read(&self, key: &str) -> Result<Option<String>>;
    /// Stores `value` under `key`
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullConfigCache;

impl ConfigCache for NullConfigCache {
    fn read(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }
}
