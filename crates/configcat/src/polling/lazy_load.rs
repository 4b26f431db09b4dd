use super::{FetchOutcome, PolicyCore, RefreshPolicy, RefreshResult};
use crate::model::Entry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Fetches on demand once the cached config is older than the TTL.
///
/// Concurrent callers share one in-flight fetch.
#[derive(Debug)]
pub struct LazyLoadingPolicy {
    core: Arc<PolicyCore>,
    cache_ttl: Duration,
    async_refresh: bool,
    in_flight: Arc<Mutex<()>>,
}

impl LazyLoadingPolicy {
    pub(crate) fn new(core: Arc<PolicyCore>, cache_ttl: Duration, async_refresh: bool) -> Self {
        core.hooks().invoke_on_client_ready(core.cache_state(cache_ttl));
        Self {
            core,
            cache_ttl,
            async_refresh,
            in_flight: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl RefreshPolicy for LazyLoadingPolicy {
    #[instrument(skip(self))]
    async fn get_config(&self) -> Entry {
        let entry = self.core.cached();
        if entry.is_fresh(self.cache_ttl) || self.core.is_offline() {
            return entry;
        }

        if self.async_refresh && !entry.is_empty() {
            // a refresh already running will update the cache
            if let Ok(guard) = self.in_flight.clone().try_lock_owned() {
                debug!("Cached config expired, refreshing in the background");
                let core = self.core.clone();
                let ttl = self.cache_ttl;
                tokio::spawn(async move {
                    let _guard = guard;
                    if !core.cached().is_fresh(ttl) {
                        core.fetch_if_newer().await;
                    }
                });
            }
            return entry;
        }

        let _guard = self.in_flight.lock().await;
        let entry = self.core.cached();
        if entry.is_fresh(self.cache_ttl) {
            return entry;
        }

        debug!("Cached config expired, fetching");
        match self.core.fetch_if_newer().await {
            FetchOutcome::Changed(entry) | FetchOutcome::Unchanged(entry) => entry,
            FetchOutcome::Failed(_) => self.core.cached(),
        }
    }

    async fn refresh(&self) -> RefreshResult {
        let _guard = self.in_flight.lock().await;
        self.core.fetch_if_newer().await.to_refresh_result()
    }

    fn set_offline(&self, offline: bool) {
        self.core.set_offline(offline);
    }

    fn is_offline(&self) -> bool {
        self.core.is_offline()
    }

    fn close(&self) {}
}
