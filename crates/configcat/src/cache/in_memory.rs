//! # In-Memory Config Cache
//!
//! HashMap-based cache, handy for tests and for sharing the last config
//! between client instances of the same process.

use super::ConfigCache;
use crate::error::{ConfigCatError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryConfigCache {
    cache: RwLock<HashMap<String, String>>,
}

impl InMemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfigCache for InMemoryConfigCache {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let cache = self
            .cache
            .read()
            .map_err(|e| ConfigCatError::Cache(e.to_string()))?;
        Ok(cache.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| ConfigCatError::Cache(e.to_string()))?;
        cache.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
