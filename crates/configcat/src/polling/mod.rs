//! # Polling Modes
//!
//! Control when the client downloads a new config:
//!
//! * [`PollingMode::AutoPoll`] - a background task fetches on a fixed interval and notifies
//!   [`ConfigurationChangeListener`]s when the config changes
//! * [`PollingMode::LazyLoad`] - the config is fetched on demand once the cached copy is older
//!   than the TTL
//! * [`PollingMode::ManualPoll`] - only `force_refresh` downloads a new config
//!
//! ## Example
//!
//! ```rust
//! use configcat::{AutoPollingBuilder, ConfigurationParser};
//!
//! let mode = AutoPollingBuilder::new()
//!     .auto_poll_interval_in_seconds(5)
//!     .configuration_change_listener(|parser: &ConfigurationParser, config: &str| {
//!         let enabled: bool = parser
//!             .parse_value(config, "isAwesomeFeatureEnabled", None)
//!             .unwrap_or(false);
//!         println!("isAwesomeFeatureEnabled: {}", enabled);
//!     })
//!     .build()
//!     .unwrap();
//! ```

mod auto_poll;
mod lazy_load;
mod manual;

pub use auto_poll::AutoPollingPolicy;
pub use lazy_load::LazyLoadingPolicy;
pub use manual::ManualPollingPolicy;

use crate::cache::ConfigJsonCache;
use crate::error::{ConfigCatError, Result};
use crate::fetcher::{ConfigFetcher, FetchResponse};
use crate::hooks::{ClientReadyState, Hooks};
use crate::model::Entry;
use crate::parser::ConfigurationParser;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_INIT_WAIT_SECS: u64 = 5;
const MIN_POLL_INTERVAL_SECS: u64 = 2;

/// Receives the parser and the raw JSON of every new config.
pub trait ConfigurationChangeListener: Send + Sync {
    fn on_configuration_changed(&self, parser: &ConfigurationParser, new_configuration: &str);
}

impl<F> ConfigurationChangeListener for F
where
    F: Fn(&ConfigurationParser, &str) + Send + Sync,
{
    fn on_configuration_changed(&self, parser: &ConfigurationParser, new_configuration: &str) {
        self(parser, new_configuration)
    }
}

#[derive(Clone)]
pub enum PollingMode {
    AutoPoll {
        interval: Duration,
        max_init_wait: Duration,
        listeners: Vec<Arc<dyn ConfigurationChangeListener>>,
    },
    LazyLoad {
        cache_ttl: Duration,
        async_refresh: bool,
    },
    ManualPoll,
}

impl Default for PollingMode {
    fn default() -> Self {
        PollingMode::AutoPoll {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_init_wait: Duration::from_secs(DEFAULT_MAX_INIT_WAIT_SECS),
            listeners: Vec::new(),
        }
    }
}

impl fmt::Debug for PollingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollingMode::AutoPoll {
                interval,
                max_init_wait,
                listeners,
            } => f
                .debug_struct("AutoPoll")
                .field("interval", interval)
                .field("max_init_wait", max_init_wait)
                .field("listeners", &listeners.len())
                .finish(),
            PollingMode::LazyLoad {
                cache_ttl,
                async_refresh,
            } => f
                .debug_struct("LazyLoad")
                .field("cache_ttl", cache_ttl)
                .field("async_refresh", async_refresh)
                .finish(),
            PollingMode::ManualPoll => write!(f, "ManualPoll"),
        }
    }
}

impl PollingMode {
    pub fn auto_poll(interval_secs: u64) -> Result<Self> {
        Self::auto_poll_with(interval_secs, DEFAULT_MAX_INIT_WAIT_SECS)
    }

    pub fn auto_poll_with(interval_secs: u64, max_init_wait_secs: u64) -> Result<Self> {
        AutoPollingBuilder::new()
            .auto_poll_interval_in_seconds(interval_secs)
            .max_init_wait_time_in_seconds(max_init_wait_secs)
            .build()
    }

    pub fn lazy_load(cache_ttl_secs: u64) -> Result<Self> {
        Self::lazy_load_with(cache_ttl_secs, false)
    }

    /// Lazy loading that serves the stale config while a refresh runs in the background.
    pub fn lazy_load_async(cache_ttl_secs: u64) -> Result<Self> {
        Self::lazy_load_with(cache_ttl_secs, true)
    }

    fn lazy_load_with(cache_ttl_secs: u64, async_refresh: bool) -> Result<Self> {
        if cache_ttl_secs < 1 {
            return Err(ConfigCatError::InvalidArgument(
                "cache_ttl_secs cannot be less than 1 second".to_string(),
            ));
        }
        Ok(PollingMode::LazyLoad {
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            async_refresh,
        })
    }

    pub fn manual_poll() -> Self {
        PollingMode::ManualPoll
    }

    /// Short identifier sent in the user agent header.
    pub fn identifier(&self) -> &'static str {
        match self {
            PollingMode::AutoPoll { .. } => "a",
            PollingMode::LazyLoad { .. } => "l",
            PollingMode::ManualPoll => "m",
        }
    }
}

/// Builds an auto polling [`PollingMode`].
#[derive(Clone)]
pub struct AutoPollingBuilder {
    interval_secs: u64,
    max_init_wait_secs: u64,
    listeners: Vec<Arc<dyn ConfigurationChangeListener>>,
}

impl Default for AutoPollingBuilder {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_init_wait_secs: DEFAULT_MAX_INIT_WAIT_SECS,
            listeners: Vec::new(),
        }
    }
}

impl AutoPollingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_poll_interval_in_seconds(mut self, seconds: u64) -> Self {
        self.interval_secs = seconds;
        self
    }

    pub fn max_init_wait_time_in_seconds(mut self, seconds: u64) -> Self {
        self.max_init_wait_secs = seconds;
        self
    }

    pub fn configuration_change_listener<L>(mut self, listener: L) -> Self
    where
        L: ConfigurationChangeListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn build(self) -> Result<PollingMode> {
        if self.interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(ConfigCatError::InvalidArgument(format!(
                "auto_poll_interval_in_seconds cannot be less than {} seconds",
                MIN_POLL_INTERVAL_SECS
            )));
        }
        Ok(PollingMode::AutoPoll {
            interval: Duration::from_secs(self.interval_secs),
            max_init_wait: Duration::from_secs(self.max_init_wait_secs),
            listeners: self.listeners,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResult {
    pub success: bool,
    pub error: Option<String>,
}

impl RefreshResult {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Decides when the config is downloaded.
#[async_trait]
pub trait RefreshPolicy: Send + Sync + fmt::Debug {
    /// The config to evaluate flags against.
    async fn get_config(&self) -> Entry;
    /// Fetches the latest config regardless of the polling schedule.
    async fn refresh(&self) -> RefreshResult;
    fn set_offline(&self, offline: bool);
    fn is_offline(&self) -> bool;
    /// Stops background work. Idempotent.
    fn close(&self);
}

pub(crate) enum FetchOutcome {
    Changed(Entry),
    Unchanged(Entry),
    Failed(String),
}

impl FetchOutcome {
    pub(crate) fn to_refresh_result(&self) -> RefreshResult {
        match self {
            FetchOutcome::Failed(error) => RefreshResult::failure(error.clone()),
            _ => RefreshResult::success(),
        }
    }
}

/// State shared by the remote polling policies.
#[derive(Debug)]
pub(crate) struct PolicyCore {
    fetcher: ConfigFetcher,
    cache: ConfigJsonCache,
    hooks: Arc<Hooks>,
    offline: AtomicBool,
}

impl PolicyCore {
    pub(crate) fn new(
        fetcher: ConfigFetcher,
        cache: ConfigJsonCache,
        hooks: Arc<Hooks>,
        offline: bool,
    ) -> Self {
        Self {
            fetcher,
            cache,
            hooks,
            offline: AtomicBool::new(offline),
        }
    }

    pub(crate) fn cached(&self) -> Entry {
        self.cache.read()
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Ready state derived from what the cache currently holds.
    pub(crate) fn cache_state(&self, ttl: Duration) -> ClientReadyState {
        let entry = self.cached();
        if entry.is_empty() {
            ClientReadyState::NoFlagData
        } else if entry.is_fresh(ttl) {
            ClientReadyState::HasUpToDateFlagData
        } else {
            ClientReadyState::HasCachedFlagDataOnly
        }
    }

    /// Downloads the config and stores it. Listeners of `on_config_changed`
    /// are notified when the content differs from the cached one.
    pub(crate) async fn fetch_if_newer(&self) -> FetchOutcome {
        if self.is_offline() {
            return FetchOutcome::Failed(
                "Client is in offline mode, it cannot initiate HTTP calls.".to_string(),
            );
        }

        match self.fetcher.fetch().await {
            FetchResponse::Fetched(entry) => {
                let previous = self.cache.read();
                self.cache.write(&entry);
                if previous.config != entry.config {
                    debug!("Config changed");
                    self.hooks.invoke_on_config_changed(&entry.config.entries);
                    FetchOutcome::Changed(entry)
                } else {
                    FetchOutcome::Unchanged(entry)
                }
            }
            FetchResponse::NotModified => {
                // the cached copy is confirmed, only the fetch time moves
                let entry = self.cache.read().with_fetch_time(Utc::now());
                self.cache.write(&entry);
                FetchOutcome::Unchanged(entry)
            }
            FetchResponse::Failed { error } => {
                self.hooks.invoke_on_error(&error);
                FetchOutcome::Failed(error)
            }
        }
    }
}

/// Serves nothing; used when only local overrides are consulted.
#[derive(Debug, Default)]
pub struct NullRefreshPolicy;

#[async_trait]
impl RefreshPolicy for NullRefreshPolicy {
    async fn get_config(&self) -> Entry {
        Entry::empty()
    }

    async fn refresh(&self) -> RefreshResult {
        RefreshResult::failure(
            "The ConfigCat SDK is in local-only mode. Calling .force_refresh() has no effect.",
        )
    }

    fn set_offline(&self, _offline: bool) {}

    fn is_offline(&self) -> bool {
        true
    }

    fn close(&self) {}
}

pub(crate) fn refresh_policy(
    mode: PollingMode,
    core: Arc<PolicyCore>,
) -> Result<Arc<dyn RefreshPolicy>> {
    let policy: Arc<dyn RefreshPolicy> = match mode {
        PollingMode::AutoPoll {
            interval,
            max_init_wait,
            listeners,
        } => Arc::new(AutoPollingPolicy::new(
            core,
            interval,
            max_init_wait,
            listeners,
        )?),
        PollingMode::LazyLoad {
            cache_ttl,
            async_refresh,
        } => Arc::new(LazyLoadingPolicy::new(core, cache_ttl, async_refresh)),
        PollingMode::ManualPoll => Arc::new(ManualPollingPolicy::new(core)),
    };
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_poll_rejects_short_interval() {
        assert!(matches!(
            PollingMode::auto_poll(1),
            Err(ConfigCatError::InvalidArgument(_))
        ));
        assert!(PollingMode::auto_poll(2).is_ok());
    }

    #[test]
    fn test_lazy_load_rejects_zero_ttl() {
        assert!(PollingMode::lazy_load(0).is_err());
        assert!(matches!(
            PollingMode::lazy_load_async(30).unwrap(),
            PollingMode::LazyLoad {
                async_refresh: true,
                ..
            }
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let mode = AutoPollingBuilder::new().build().unwrap();
        let PollingMode::AutoPoll {
            interval,
            max_init_wait,
            listeners,
        } = mode
        else {
            panic!("expected auto poll");
        };
        assert_eq!(interval, Duration::from_secs(60));
        assert_eq!(max_init_wait, Duration::from_secs(5));
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_closure_listener() {
        let mode = AutoPollingBuilder::new()
            .configuration_change_listener(|_: &ConfigurationParser, _: &str| {})
            .build()
            .unwrap();
        assert_eq!(mode.identifier(), "a");
        assert!(format!("{:?}", mode).contains("listeners: 1"));
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(PollingMode::manual_poll().identifier(), "m");
        assert_eq!(PollingMode::lazy_load(10).unwrap().identifier(), "l");
    }
}
