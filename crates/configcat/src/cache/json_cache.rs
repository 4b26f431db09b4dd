use super::ConfigCache;
use crate::evaluator::sha1_hex;
use crate::model::Entry;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

const CONFIG_JSON_NAME: &str = "config_v5.json";

#[derive(Debug, Default)]
struct InMemoryEntry {
    entry: Entry,
    serialized: String,
}

/// Keeps the latest [`Entry`] in memory and mirrors it into a [`ConfigCache`].
///
/// Cache failures never reach the caller: reads fall back to the in-memory
/// entry and write errors are only logged.
#[derive(Debug)]
pub struct ConfigJsonCache {
    cache: Arc<dyn ConfigCache>,
    cache_key: String,
    in_memory: Mutex<InMemoryEntry>,
}

impl ConfigJsonCache {
    pub fn new(cache: Arc<dyn ConfigCache>, sdk_key: &str) -> Self {
        Self {
            cache,
            cache_key: cache_key(sdk_key),
            in_memory: Mutex::new(InMemoryEntry::default()),
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn read(&self) -> Entry {
        let from_cache = match self.cache.read(&self.cache_key) {
            Ok(value) => value,
            Err(e) => {
                error!("An error occurred during the cache read: {}", e);
                None
            }
        };

        let Ok(mut in_memory) = self.in_memory.lock() else {
            error!("Config cache lock poisoned");
            return Entry::empty();
        };

        let Some(from_cache) = from_cache.filter(|s| !s.is_empty()) else {
            return in_memory.entry.clone();
        };
        if from_cache == in_memory.serialized {
            return in_memory.entry.clone();
        }

        match Entry::deserialize(&from_cache) {
            Ok(entry) => {
                debug!("Loaded config from cache");
                in_memory.entry = entry;
                in_memory.serialized = from_cache;
            }
            Err(e) => error!("Error occurred while reading the cache: {}", e),
        }
        in_memory.entry.clone()
    }

    pub fn write(&self, entry: &Entry) {
        let serialized = entry.serialize();
        if let Ok(mut in_memory) = self.in_memory.lock() {
            in_memory.entry = entry.clone();
            in_memory.serialized = serialized.clone();
        }
        if let Err(e) = self.cache.write(&self.cache_key, &serialized) {
            error!("An error occurred during the cache write: {}", e);
        }
    }
}

fn cache_key(sdk_key: &str) -> String {
    sha1_hex(&format!("rust_{}_{}", CONFIG_JSON_NAME, sdk_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryConfigCache, NullConfigCache};
    use crate::error::{ConfigCatError, Result};
    use crate::model::Config;

    const JSON: &str = r#"{"f":{"key":{"v":true,"t":0}}}"#;

    #[derive(Debug)]
    struct FailingCache;

    impl ConfigCache for FailingCache {
        fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(ConfigCatError::Cache("read failed".to_string()))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<()> {
            Err(ConfigCatError::Cache("write failed".to_string()))
        }
    }

    fn entry() -> Entry {
        let config: Config = serde_json::from_str(JSON).unwrap();
        Entry::new(config, JSON, Some("etag".to_string()))
    }

    #[test]
    fn test_cache_key_is_sha1_of_sdk_key() {
        let cache = ConfigJsonCache::new(Arc::new(NullConfigCache), "test-key");
        assert_eq!(cache.cache_key(), sha1_hex("rust_config_v5.json_test-key"));
        assert_eq!(cache.cache_key().len(), 40);
    }

    #[test]
    fn test_write_then_read() {
        let store = Arc::new(InMemoryConfigCache::new());
        let cache = ConfigJsonCache::new(store.clone(), "sdk");

        assert!(cache.read().is_empty());
        cache.write(&entry());

        let stored = store.read(cache.cache_key()).unwrap().unwrap();
        assert!(stored.ends_with(JSON));

        // a second instance sharing the store sees the entry
        let other = ConfigJsonCache::new(store, "sdk");
        let read = other.read();
        assert_eq!(read.etag.as_deref(), Some("etag"));
        assert!(read.config.entries.contains_key("key"));
    }

    #[test]
    fn test_failing_cache_falls_back_to_memory() {
        let cache = ConfigJsonCache::new(Arc::new(FailingCache), "sdk");
        cache.write(&entry());

        let read = cache.read();
        assert_eq!(&*read.json, JSON);
    }

    #[test]
    fn test_corrupt_cache_value_keeps_memory() {
        let store = Arc::new(InMemoryConfigCache::new());
        let cache = ConfigJsonCache::new(store.clone(), "sdk");
        cache.write(&entry());

        store.write(cache.cache_key(), "garbage").unwrap();
        assert_eq!(&*cache.read().json, JSON);
    }
}
