use super::config::Config;
use crate::error::{ConfigCatError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// A config together with the metadata of the fetch that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub config: Arc<Config>,
    pub json: Arc<str>,
    pub etag: Option<String>,
    pub fetch_time: Option<DateTime<Utc>>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            config: Arc::new(Config::empty()),
            json: Arc::from(""),
            etag: None,
            fetch_time: None,
        }
    }
}

impl Entry {
    pub fn new(config: Config, json: impl Into<Arc<str>>, etag: Option<String>) -> Self {
        Self {
            config: Arc::new(config),
            json: json.into(),
            etag,
            fetch_time: Some(Utc::now()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.json.is_empty()
    }

    pub fn with_fetch_time(mut self, fetch_time: DateTime<Utc>) -> Self {
        self.fetch_time = Some(fetch_time);
        self
    }

    /// True when the entry was fetched less than `ttl` ago.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let Some(fetch_time) = self.fetch_time else {
            return false;
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        fetch_time + ttl > Utc::now()
    }

    /// Cache format: `<fetch time ms>\n<etag>\n<config json>`.
    pub fn serialize(&self) -> String {
        let fetch_time = self
            .fetch_time
            .map(|t| t.timestamp_millis())
            .unwrap_or_default();
        format!(
            "{}\n{}\n{}",
            fetch_time,
            self.etag.as_deref().unwrap_or_default(),
            self.json
        )
    }

    pub fn deserialize(value: &str) -> Result<Self> {
        let mut parts = value.splitn(3, '\n');
        let (Some(fetch_time), Some(etag), Some(json)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ConfigCatError::parse("Number of values is fewer than expected", value));
        };

        let millis: i64 = fetch_time
            .parse()
            .map_err(|_| ConfigCatError::parse(format!("Invalid fetch time: {}", fetch_time), value))?;
        let fetch_time = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| ConfigCatError::parse(format!("Invalid fetch time: {}", millis), value))?;

        if json.is_empty() {
            return Err(ConfigCatError::parse("Empty config JSON", value));
        }
        let config: Config = serde_json::from_str(json)
            .map_err(|e| ConfigCatError::parse(e.to_string(), json))?;

        Ok(Self {
            config: Arc::new(config),
            json: Arc::from(json),
            etag: (!etag.is_empty()).then(|| etag.to_string()),
            fetch_time: Some(fetch_time),
        })
    }
}
