use super::{ConfigurationChangeListener, FetchOutcome, PolicyCore, RefreshPolicy, RefreshResult};
use crate::error::{ConfigCatError, Result};
use crate::hooks::ClientReadyState;
use crate::model::Entry;
use crate::parser::ConfigurationParser;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};

struct Poller {
    core: Arc<PolicyCore>,
    listeners: Vec<Arc<dyn ConfigurationChangeListener>>,
    parser: ConfigurationParser,
    initialized: watch::Sender<bool>,
    interval: Duration,
}

impl Poller {
    async fn poll(&self) -> FetchOutcome {
        let outcome = self.core.fetch_if_newer().await;
        match &outcome {
            FetchOutcome::Changed(entry) => {
                for listener in &self.listeners {
                    listener.on_configuration_changed(&self.parser, &entry.json);
                }
                self.set_initialized(ClientReadyState::HasUpToDateFlagData);
            }
            FetchOutcome::Unchanged(_) => {
                self.set_initialized(ClientReadyState::HasUpToDateFlagData)
            }
            FetchOutcome::Failed(_) => self.set_initialized(self.core.cache_state(self.interval)),
        }
        outcome
    }

    fn set_initialized(&self, state: ClientReadyState) {
        self.initialized.send_if_modified(|initialized| {
            let changed = !*initialized;
            *initialized = true;
            changed
        });
        self.core.hooks().invoke_on_client_ready(state);
    }
}

/// Fetches the config on a fixed interval from a background task.
pub struct AutoPollingPolicy {
    poller: Arc<Poller>,
    initialized: watch::Receiver<bool>,
    max_init_wait: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for AutoPollingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoPollingPolicy")
            .field("interval", &self.poller.interval)
            .field("max_init_wait", &self.max_init_wait)
            .finish_non_exhaustive()
    }
}

impl AutoPollingPolicy {
    /// Starts polling on the current tokio runtime.
    pub(crate) fn new(
        core: Arc<PolicyCore>,
        interval: Duration,
        max_init_wait: Duration,
        listeners: Vec<Arc<dyn ConfigurationChangeListener>>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ConfigCatError::Config("auto polling requires a running tokio runtime".to_string())
        })?;

        let (sender, initialized) = watch::channel(false);
        let poller = Arc::new(Poller {
            core,
            listeners,
            parser: ConfigurationParser::new(),
            initialized: sender,
            interval,
        });

        let cached_is_fresh = poller.core.cached().is_fresh(interval);
        if cached_is_fresh {
            debug!("Cached config is up to date, skipping the initial fetch");
            poller.set_initialized(ClientReadyState::HasUpToDateFlagData);
        }

        let polling = {
            let poller = poller.clone();
            runtime.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut skip = cached_is_fresh;
                loop {
                    ticker.tick().await;
                    if std::mem::take(&mut skip) || poller.core.is_offline() {
                        continue;
                    }
                    poller.poll().await;
                }
            })
        };

        let init_timer = {
            let poller = poller.clone();
            runtime.spawn(async move {
                tokio::time::sleep(max_init_wait).await;
                if !*poller.initialized.borrow() {
                    warn!(
                        "max_init_wait_time_in_seconds for the very first fetch reached ({:?}). Returning cached config.",
                        max_init_wait
                    );
                    poller.set_initialized(poller.core.cache_state(interval));
                }
            })
        };

        Ok(Self {
            poller,
            initialized,
            max_init_wait,
            tasks: Mutex::new(vec![polling, init_timer]),
        })
    }
}

#[async_trait]
impl RefreshPolicy for AutoPollingPolicy {
    #[instrument(skip(self))]
    async fn get_config(&self) -> Entry {
        let initialized = *self.initialized.borrow();
        if !initialized {
            let mut receiver = self.initialized.clone();
            let wait = async move { receiver.wait_for(|ready| *ready).await.map(|_| ()) };
            if tokio::time::timeout(self.max_init_wait, wait).await.is_err() {
                debug!("Waiting for the first fetch timed out");
            }
        }
        self.poller.core.cached()
    }

    async fn refresh(&self) -> RefreshResult {
        self.poller.poll().await.to_refresh_result()
    }

    fn set_offline(&self, offline: bool) {
        self.poller.core.set_offline(offline);
    }

    fn is_offline(&self) -> bool {
        self.poller.core.is_offline()
    }

    fn close(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Drop for AutoPollingPolicy {
    fn drop(&mut self) {
        self.close();
    }
}
