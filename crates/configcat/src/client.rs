//! # ConfigCat Client
//!
//! Entry point of the SDK. A client owns a refresh policy (how and when the
//! config is downloaded), an optional set of local overrides and the hooks
//! fired on lifecycle events.
//!
//! ## Configuration
//!
//! [`ClientOptions::default`] reads the following environment variables:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CONFIGCAT_BASE_URL` | Custom CDN or proxy URL | data governance CDN |
//! | `CONFIGCAT_DATA_GOVERNANCE` | `global` or `eu` | `global` |
//! | `CONFIGCAT_REQUEST_TIMEOUT_SECS` | HTTP request timeout | 30 |
//!
//! Evaluation never fails: a missing config, an unknown key or a type
//! mismatch is logged, reported through `on_error` and answered with the
//! default value supplied by the caller.

use crate::cache::{ConfigCache, ConfigJsonCache, NullConfigCache};
use crate::details::{EvaluationDetails, EvaluationFailure, FailureKind};
use crate::error::{ConfigCatError, Result};
use crate::evaluator::{EvaluationResult, RolloutEvaluator};
use crate::fetcher::{ConfigFetcher, DataGovernance};
use crate::hooks::{ClientReadyState, Hooks};
use crate::model::{Config, Setting, SettingValue, Value};
use crate::overrides::{FlagOverrides, LocalSettings, OverrideBehaviour, OverrideDataSource};
use crate::polling::{NullRefreshPolicy, PolicyCore, PollingMode, RefreshPolicy, RefreshResult};
use crate::user::User;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Live client count per SDK key.
static SDK_KEYS: Lazy<Mutex<HashMap<String, usize>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Records a new client for `sdk_key`; `false` if another live client uses the key.
pub(crate) fn register(sdk_key: &str) -> bool {
    let mut keys = SDK_KEYS.lock().unwrap_or_else(PoisonError::into_inner);
    let count = keys.entry(sdk_key.to_string()).or_default();
    *count += 1;
    *count == 1
}

fn unregister(sdk_key: &str) {
    let mut keys = SDK_KEYS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(count) = keys.get_mut(sdk_key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            keys.remove(sdk_key);
        }
    }
}

/// Settings used to build a [`ConfigCatClient`]
#[derive(Clone)]
pub struct ClientOptions {
    /// Custom CDN or proxy URL; overrides the data governance CDN
    pub base_url: Option<String>,
    /// Default: [`DataGovernance::Global`]
    pub data_governance: DataGovernance,
    /// Default: 30 seconds
    pub request_timeout: Duration,
    /// Default: [`NullConfigCache`]
    pub cache: Arc<dyn ConfigCache>,
    /// Default: auto polling every 60 seconds
    pub mode: PollingMode,
    pub overrides: Option<FlagOverrides>,
    pub hooks: Arc<Hooks>,
    /// Start without contacting the CDN
    pub offline: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let base_url = std::env::var("CONFIGCAT_BASE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        let data_governance = std::env::var("CONFIGCAT_DATA_GOVERNANCE")
            .map(|s| DataGovernance::from(s.as_str()))
            .unwrap_or_default();

        let request_timeout = std::env::var("CONFIGCAT_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Self {
            base_url,
            data_governance,
            request_timeout,
            cache: Arc::new(NullConfigCache),
            mode: PollingMode::default(),
            overrides: None,
            hooks: Arc::new(Hooks::new()),
            offline: false,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("data_governance", &self.data_governance)
            .field("request_timeout", &self.request_timeout)
            .field("cache", &self.cache)
            .field("mode", &self.mode)
            .field("overrides", &self.overrides)
            .field("offline", &self.offline)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ClientBuilder {
    options: ClientOptions,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClientOptions) -> Self {
        Self { options }
    }

    pub fn mode(mut self, mode: PollingMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Same as [`mode`](Self::mode).
    pub fn refresh_policy(self, mode: PollingMode) -> Self {
        self.mode(mode)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = Some(base_url.into());
        self
    }

    pub fn data_governance(mut self, data_governance: DataGovernance) -> Self {
        self.options.data_governance = data_governance;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    pub fn cache(mut self, cache: impl ConfigCache + 'static) -> Self {
        self.options.cache = Arc::new(cache);
        self
    }

    pub fn shared_cache(mut self, cache: Arc<dyn ConfigCache>) -> Self {
        self.options.cache = cache;
        self
    }

    pub fn flag_overrides(mut self, source: OverrideDataSource, behaviour: OverrideBehaviour) -> Self {
        self.options.overrides = Some(FlagOverrides::new(source, behaviour));
        self
    }

    pub fn hooks(mut self, hooks: Arc<Hooks>) -> Self {
        self.options.hooks = hooks;
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.options.offline = offline;
        self
    }

    /// Builds the client. Auto polling needs a running tokio runtime.
    #[instrument(skip(self, sdk_key))]
    pub fn build(self, sdk_key: &str) -> Result<ConfigCatClient> {
        if sdk_key.is_empty() {
            return Err(ConfigCatError::InvalidArgument(
                "sdk_key cannot be empty".to_string(),
            ));
        }

        let options = self.options;
        if let Some(base_url) = options.base_url.as_deref() {
            url::Url::parse(base_url)?;
        }
        debug!("Initializing ConfigCatClient with options: {:?}", options);

        let hooks = options.hooks;
        let (overrides, local_only) = match options.overrides {
            Some(FlagOverrides { source, behaviour }) => (
                Some((LocalSettings::load(source, hooks.clone())?, behaviour)),
                behaviour == OverrideBehaviour::LocalOnly,
            ),
            None => (None, false),
        };

        let policy: Arc<dyn RefreshPolicy> = if local_only {
            hooks.invoke_on_client_ready(ClientReadyState::HasLocalOverrideFlagDataOnly);
            Arc::new(NullRefreshPolicy)
        } else {
            let fetcher = ConfigFetcher::new(
                sdk_key,
                options.base_url.as_deref(),
                options.data_governance,
                options.request_timeout,
                options.mode.identifier(),
            )?;
            let cache = ConfigJsonCache::new(options.cache, sdk_key);
            let core = Arc::new(PolicyCore::new(
                fetcher,
                cache,
                hooks.clone(),
                options.offline,
            ));
            crate::polling::refresh_policy(options.mode, core)?
        };

        if !register(sdk_key) {
            warn!(
                "There is an existing client instance for the specified SDK Key. \
                 We strongly recommend you to use the ConfigCat Client as a Singleton object in your application. SDK Key: '{}'.",
                sdk_key
            );
        }

        Ok(ConfigCatClient {
            sdk_key: sdk_key.to_string(),
            policy,
            overrides,
            hooks,
            evaluator: RolloutEvaluator::new(),
            closed: AtomicBool::new(false),
        })
    }
}

/// Settings to evaluate against, after overrides were applied.
enum Settings {
    Remote(Arc<Config>),
    Local(Arc<HashMap<String, Setting>>),
    Merged(HashMap<String, Setting>),
}

impl Settings {
    fn map(&self) -> &HashMap<String, Setting> {
        match self {
            Settings::Remote(config) => &config.entries,
            Settings::Local(settings) => settings.as_ref(),
            Settings::Merged(settings) => settings,
        }
    }
}

struct Snapshot {
    settings: Settings,
    fetch_time: Option<DateTime<Utc>>,
}

pub struct ConfigCatClient {
    sdk_key: String,
    policy: Arc<dyn RefreshPolicy>,
    overrides: Option<(LocalSettings, OverrideBehaviour)>,
    hooks: Arc<Hooks>,
    evaluator: RolloutEvaluator,
    closed: AtomicBool,
}

impl fmt::Debug for ConfigCatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigCatClient")
            .field("policy", &self.policy)
            .field("overrides", &self.overrides)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ConfigCatClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client with default options: auto polling every 60 seconds.
    pub fn new(sdk_key: &str) -> Result<Self> {
        ClientBuilder::new().build(sdk_key)
    }

    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Value of the setting identified by `key`, or `default` when it cannot be evaluated.
    pub async fn get_value<T: SettingValue>(&self, key: &str, user: Option<&User>, default: T) -> T {
        self.get_value_details(key, user, default).await.value
    }

    #[instrument(skip(self, user, default), fields(flag_key = %key))]
    pub async fn get_value_details<T: SettingValue>(
        &self,
        key: &str,
        user: Option<&User>,
        default: T,
    ) -> EvaluationDetails<T> {
        let details = self.evaluate(key, user, default).await;
        self.hooks.invoke_on_flag_evaluated(&details.to_dynamic());
        details
    }

    async fn evaluate<T: SettingValue>(
        &self,
        key: &str,
        user: Option<&User>,
        default: T,
    ) -> EvaluationDetails<T> {
        if key.is_empty() {
            let failure = EvaluationFailure::new(FailureKind::InvalidArgument, "key cannot be empty");
            return self.fail(key, user, default, failure);
        }

        let snapshot = self.snapshot().await;
        let result = match self.evaluate_setting(&snapshot, key, user, &default.to_value()) {
            Ok(result) => result,
            Err(failure) => return self.fail(key, user, default, failure),
        };

        let setting_type = snapshot.settings.map()[key].setting_type;
        let value = if T::accepts(setting_type) {
            T::from_json(&result.value)
        } else {
            None
        };
        let Some(value) = value else {
            let failure = EvaluationFailure::new(
                FailureKind::TypeMismatch,
                format!(
                    "The type of a setting must match the type of the specified default value. \
                     Setting's type was {} but the default value's type was {}. Please use a default value which corresponds to the setting type {}. Learn more: https://configcat.com/docs/sdk-reference/rust/#setting-type-mapping",
                    setting_type,
                    T::type_name(),
                    setting_type
                ),
            );
            return self.fail(key, user, default, failure);
        };

        EvaluationDetails {
            value,
            key: key.to_string(),
            variation_id: Some(result.variation_id).filter(|id| !id.is_empty()),
            user: user.cloned(),
            is_default_value: false,
            error: None,
            fetch_time: snapshot.fetch_time,
            matched_rule: result.matched_rule,
            matched_percentage: result.matched_percentage,
        }
    }

    fn evaluate_setting(
        &self,
        snapshot: &Snapshot,
        key: &str,
        user: Option<&User>,
        default: &Value,
    ) -> std::result::Result<EvaluationResult, EvaluationFailure> {
        let settings = snapshot.settings.map();
        if settings.is_empty() {
            return Err(EvaluationFailure::new(
                FailureKind::ConfigMissing,
                format!(
                    "Config JSON is not present when evaluating setting '{}'. Returning the `default_value` parameter that you specified in your application: '{}'.",
                    key, default
                ),
            ));
        }

        let Some(setting) = settings.get(key) else {
            let mut keys: Vec<&str> = settings.keys().map(String::as_str).collect();
            keys.sort_unstable();
            return Err(EvaluationFailure::new(
                FailureKind::FlagNotFound,
                format!(
                    "Failed to evaluate setting '{}' (the key was not found in config JSON). \
                     Returning the `default_value` parameter that you specified in your application: '{}'. Available keys: [{}].",
                    key,
                    default,
                    keys.join(", ")
                ),
            ));
        };

        Ok(self.evaluator.evaluate(setting, key, user))
    }

    fn fail<T>(
        &self,
        key: &str,
        user: Option<&User>,
        default: T,
        failure: EvaluationFailure,
    ) -> EvaluationDetails<T> {
        error!(flag_key = %key, kind = %failure.kind, "{}", failure.message);
        self.hooks.invoke_on_error(&failure.message);
        EvaluationDetails::from_default(key, default, user, failure)
    }

    pub async fn get_variation_id(&self, key: &str, user: Option<&User>) -> Option<String> {
        let snapshot = self.snapshot().await;
        match self.evaluate_setting(&snapshot, key, user, &Value::String(String::new())) {
            Ok(result) => Some(result.variation_id).filter(|id| !id.is_empty()),
            Err(failure) => {
                error!(flag_key = %key, "{}", failure.message);
                self.hooks.invoke_on_error(&failure.message);
                None
            }
        }
    }

    pub async fn get_all_variation_ids(&self, user: Option<&User>) -> Vec<String> {
        let snapshot = self.snapshot().await;
        let mut keys: Vec<&String> = snapshot.settings.map().keys().collect();
        keys.sort_unstable();
        keys.into_iter()
            .filter_map(|key| {
                self.evaluate_setting(&snapshot, key, user, &Value::String(String::new()))
                    .ok()
                    .map(|result| result.variation_id)
                    .filter(|id| !id.is_empty())
            })
            .collect()
    }

    pub async fn get_all_keys(&self) -> Vec<String> {
        let snapshot = self.snapshot().await;
        let mut keys: Vec<String> = snapshot.settings.map().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Evaluated value of every setting.
    pub async fn get_all_values(&self, user: Option<&User>) -> HashMap<String, Value> {
        let snapshot = self.snapshot().await;
        snapshot
            .settings
            .map()
            .iter()
            .filter_map(|(key, setting)| {
                let result = self.evaluator.evaluate(setting, key, user);
                Value::from_json(&result.value).map(|value| (key.clone(), value))
            })
            .collect()
    }

    /// Looks up the key and value that belong to `variation_id`.
    pub async fn get_key_and_value<T: SettingValue>(&self, variation_id: &str) -> Option<(String, T)> {
        let snapshot = self.snapshot().await;
        let settings = snapshot.settings.map();
        if settings.is_empty() {
            error!("Config JSON is not present. Returning None.");
            return None;
        }

        for (key, setting) in settings {
            let candidates = std::iter::once((&setting.variation_id, &setting.value))
                .chain(
                    setting
                        .rollout_rules
                        .iter()
                        .map(|rule| (&rule.variation_id, &rule.value)),
                )
                .chain(
                    setting
                        .percentage_items
                        .iter()
                        .map(|item| (&item.variation_id, &item.value)),
                );
            for (candidate, value) in candidates {
                if candidate == variation_id {
                    return T::from_json(value).map(|value| (key.clone(), value));
                }
            }
        }

        error!(
            "Could not find the setting for the specified variation ID: '{}'.",
            variation_id
        );
        None
    }

    /// Evaluates every setting for `user` and deserializes them into `T`.
    pub async fn get_configuration<T: DeserializeOwned>(&self, user: Option<&User>, default: T) -> T {
        let snapshot = self.snapshot().await;
        let values: serde_json::Map<String, serde_json::Value> = snapshot
            .settings
            .map()
            .iter()
            .map(|(key, setting)| {
                let result = self.evaluator.evaluate(setting, key, user);
                (key.clone(), result.value)
            })
            .collect();

        match serde_json::from_value(serde_json::Value::Object(values)) {
            Ok(configuration) => configuration,
            Err(e) => {
                let message = format!("Failed to deserialize the configuration: {}", e);
                error!("{}", message);
                self.hooks.invoke_on_error(&message);
                default
            }
        }
    }

    /// Downloads the latest config, whatever the polling mode.
    pub async fn force_refresh(&self) -> RefreshResult {
        if self.is_closed() {
            return RefreshResult::failure(ConfigCatError::Closed.to_string());
        }
        self.policy.refresh().await
    }

    pub fn set_online(&self) {
        self.policy.set_offline(false);
        debug!("Switched to ONLINE mode");
    }

    pub fn set_offline(&self) {
        self.policy.set_offline(true);
        debug!("Switched to OFFLINE mode");
    }

    pub fn is_offline(&self) -> bool {
        self.policy.is_offline()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops polling and file watching. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.policy.close();
        if let Some((local, _)) = &self.overrides {
            local.close();
        }
        self.hooks.clear();
        unregister(&self.sdk_key);
        debug!("ConfigCatClient closed");
    }

    async fn snapshot(&self) -> Snapshot {
        let local = self
            .overrides
            .as_ref()
            .map(|(local, behaviour)| (local.settings(), *behaviour));

        if let Some((settings, OverrideBehaviour::LocalOnly)) = local {
            return Snapshot {
                settings: Settings::Local(settings),
                fetch_time: None,
            };
        }

        let entry = self.policy.get_config().await;
        let settings = match local {
            Some((local, OverrideBehaviour::LocalOverRemote)) => {
                let mut merged = entry.config.entries.clone();
                merged.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
                Settings::Merged(merged)
            }
            Some((local, _)) => {
                let mut merged = (*local).clone();
                merged.extend(
                    entry
                        .config
                        .entries
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                Settings::Merged(merged)
            }
            None => Settings::Remote(entry.config.clone()),
        };

        Snapshot {
            settings,
            fetch_time: entry.fetch_time,
        }
    }
}

impl Drop for ConfigCatClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn local_client(values: serde_json::Value, sdk_key: &str) -> ConfigCatClient {
        let values: HashMap<String, serde_json::Value> = serde_json::from_value(values).unwrap();
        ConfigCatClient::builder()
            .flag_overrides(OverrideDataSource::Map(values), OverrideBehaviour::LocalOnly)
            .build(sdk_key)
            .unwrap()
    }

    #[test]
    fn test_empty_sdk_key_rejected() {
        assert!(matches!(
            ConfigCatClient::builder().build(""),
            Err(ConfigCatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = ConfigCatClient::builder()
            .mode(PollingMode::manual_poll())
            .base_url("not a url")
            .build("client-test-invalid-url");
        assert!(matches!(result, Err(ConfigCatError::Config(_))));
    }

    #[test]
    fn test_auto_poll_without_runtime_fails() {
        let result = ConfigCatClient::builder().build("client-test-no-runtime");
        assert!(matches!(result, Err(ConfigCatError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_options_read_environment() {
        unsafe {
            std::env::set_var("CONFIGCAT_BASE_URL", "https://proxy.example.com");
            std::env::set_var("CONFIGCAT_DATA_GOVERNANCE", "eu");
            std::env::set_var("CONFIGCAT_REQUEST_TIMEOUT_SECS", "7");
        }

        let options = ClientOptions::default();

        unsafe {
            std::env::remove_var("CONFIGCAT_BASE_URL");
            std::env::remove_var("CONFIGCAT_DATA_GOVERNANCE");
            std::env::remove_var("CONFIGCAT_REQUEST_TIMEOUT_SECS");
        }

        assert_eq!(options.base_url.as_deref(), Some("https://proxy.example.com"));
        assert_eq!(options.data_governance, DataGovernance::EuOnly);
        assert_eq!(options.request_timeout, Duration::from_secs(7));
    }

    #[test]
    #[serial]
    fn test_options_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.base_url, None);
        assert_eq!(options.data_governance, DataGovernance::Global);
        assert_eq!(options.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(!options.offline);
    }

    #[tokio::test]
    async fn test_local_only_values() {
        let client = local_client(
            json!({"enabled": true, "count": 3, "ratio": 1.5, "name": "x"}),
            "client-test-local-values",
        );

        assert!(client.get_value("enabled", None, false).await);
        assert_eq!(client.get_value("count", None, 0i64).await, 3);
        assert_eq!(client.get_value("ratio", None, 0.0).await, 1.5);
        assert_eq!(client.get_value("name", None, String::new()).await, "x");
        assert_eq!(
            client.get_all_keys().await,
            vec!["count", "enabled", "name", "ratio"]
        );
    }

    #[tokio::test]
    async fn test_failures_return_default() {
        let client = local_client(json!({"enabled": true}), "client-test-failures");

        let missing = client.get_value_details("missing", None, 7i64).await;
        assert_eq!(missing.value, 7);
        assert!(missing.is_default_value);
        assert_eq!(missing.error.unwrap().kind, FailureKind::FlagNotFound);

        let mismatch = client.get_value_details("enabled", None, "x".to_string()).await;
        assert_eq!(mismatch.value, "x");
        assert_eq!(mismatch.error.unwrap().kind, FailureKind::TypeMismatch);

        let empty_key = client.get_value_details("", None, false).await;
        assert_eq!(empty_key.error.unwrap().kind, FailureKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_force_refresh_in_local_only_mode_fails() {
        let client = local_client(json!({"enabled": true}), "client-test-refresh");
        let result = client.force_refresh().await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let client = local_client(json!({"enabled": true}), "client-test-close");
        client.close();
        client.close();
        assert!(client.is_closed());
        assert!(!client.force_refresh().await.success);
    }

    #[test]
    fn test_sdk_key_registry_tracks_live_clients() {
        let sdk_key = "client-test-registry";
        let first = local_client(json!({}), sdk_key);
        let second = local_client(json!({}), sdk_key);

        // the key stays taken while any client using it is alive
        assert!(!register(sdk_key));
        unregister(sdk_key);
        first.close();
        assert!(!register(sdk_key));
        unregister(sdk_key);

        drop(second);
        assert!(register(sdk_key));
        unregister(sdk_key);
    }

    #[tokio::test]
    async fn test_override_values_have_no_variation_id() {
        let client = local_client(json!({"enabled": true}), "client-test-variation-id");

        let details = client.get_value_details("enabled", None, false).await;
        assert!(details.value);
        assert_eq!(details.variation_id, None);
        assert_eq!(client.get_variation_id("enabled", None).await, None);
        assert!(client.get_all_variation_ids(None).await.is_empty());
    }
}
