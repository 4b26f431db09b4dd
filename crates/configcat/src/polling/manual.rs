use super::{PolicyCore, RefreshPolicy, RefreshResult};
use crate::hooks::ClientReadyState;
use crate::model::Entry;
use async_trait::async_trait;
use std::sync::Arc;

/// Serves the cached config; only [`RefreshPolicy::refresh`] downloads.
#[derive(Debug)]
pub struct ManualPollingPolicy {
    core: Arc<PolicyCore>,
}

impl ManualPollingPolicy {
    pub(crate) fn new(core: Arc<PolicyCore>) -> Self {
        let state = if core.cached().is_empty() {
            ClientReadyState::NoFlagData
        } else {
            ClientReadyState::HasCachedFlagDataOnly
        };
        core.hooks().invoke_on_client_ready(state);
        Self { core }
    }
}

#[async_trait]
impl RefreshPolicy for ManualPollingPolicy {
    async fn get_config(&self) -> Entry {
        self.core.cached()
    }

    async fn refresh(&self) -> RefreshResult {
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
