//! # Client Hooks
//!
//! Callbacks fired by the client on lifecycle events:
//!
//! * `on_client_ready` - the first config is available (or the client gave up waiting)
//! * `on_config_changed` - a new config was downloaded or reloaded
//! * `on_flag_evaluated` - after every `get_value` style call
//! * `on_error` - a fetch or an evaluation failed
//!
//! The ready state is remembered, so a callback registered after the client
//! became ready is invoked immediately.

use crate::details::EvaluationDetails;
use crate::model::{Setting, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientReadyState {
    /// Neither the cache nor the CDN provided any flag data.
    NoFlagData,
    /// Only local overrides are used.
    HasLocalOverrideFlagDataOnly,
    /// Flag data is only available from the cache.
    HasCachedFlagDataOnly,
    /// The latest flag data was received from the CDN.
    HasUpToDateFlagData,
}

type ReadyCallback = Arc<dyn Fn(ClientReadyState) + Send + Sync>;
type ConfigChangedCallback = Arc<dyn Fn(&HashMap<String, Setting>) + Send + Sync>;
type FlagEvaluatedCallback = Arc<dyn Fn(&EvaluationDetails<Value>) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    ready_state: Option<ClientReadyState>,
    on_client_ready: Vec<ReadyCallback>,
    on_config_changed: Vec<ConfigChangedCallback>,
    on_flag_evaluated: Vec<FlagEvaluatedCallback>,
    on_error: Vec<ErrorCallback>,
}

#[derive(Default)]
pub struct Hooks {
    callbacks: RwLock<Callbacks>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("ready_state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_on_client_ready<F>(&self, callback: F)
    where
        F: Fn(ClientReadyState) + Send + Sync + 'static,
    {
        let Ok(mut callbacks) = self.callbacks.write() else {
            error!("Hooks lock poisoned");
            return;
        };
        let ready_state = callbacks.ready_state;
        match ready_state {
            Some(state) => {
                drop(callbacks);
                callback(state);
            }
            None => callbacks.on_client_ready.push(Arc::new(callback)),
        }
    }

    pub fn add_on_config_changed<F>(&self, callback: F)
    where
        F: Fn(&HashMap<String, Setting>) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.on_config_changed.push(Arc::new(callback));
        }
    }

    pub fn add_on_flag_evaluated<F>(&self, callback: F)
    where
        F: Fn(&EvaluationDetails<Value>) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.on_flag_evaluated.push(Arc::new(callback));
        }
    }

    pub fn add_on_error<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.on_error.push(Arc::new(callback));
        }
    }

    pub fn ready_state(&self) -> Option<ClientReadyState> {
        self.callbacks.read().ok().and_then(|c| c.ready_state)
    }

    /// Fires `on_client_ready` once, later calls are ignored.
    pub(crate) fn invoke_on_client_ready(&self, state: ClientReadyState) {
        let to_call = {
            let Ok(mut callbacks) = self.callbacks.write() else {
                return;
            };
            if callbacks.ready_state.is_some() {
                return;
            }
            callbacks.ready_state = Some(state);
            std::mem::take(&mut callbacks.on_client_ready)
        };
        for callback in to_call {
            callback(state);
        }
    }

    pub(crate) fn invoke_on_config_changed(&self, settings: &HashMap<String, Setting>) {
        for callback in self.snapshot(|c| c.on_config_changed.clone()) {
            callback(settings);
        }
    }

    pub(crate) fn invoke_on_flag_evaluated(&self, details: &EvaluationDetails<Value>) {
        for callback in self.snapshot(|c| c.on_flag_evaluated.clone()) {
            callback(details);
        }
    }

    pub(crate) fn invoke_on_error(&self, message: &str) {
        for callback in self.snapshot(|c| c.on_error.clone()) {
            callback(message);
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.on_client_ready.clear();
            callbacks.on_config_changed.clear();
            callbacks.on_flag_evaluated.clear();
            callbacks.on_error.clear();
        }
    }

    // Callbacks run outside the lock so they may register further hooks.
    fn snapshot<T>(&self, select: impl FnOnce(&Callbacks) -> Vec<T>) -> Vec<T> {
        self.callbacks
            .read()
            .map(|c| select(&*c))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_ready_fires_once() {
        let hooks = Hooks::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        hooks.add_on_client_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hooks.invoke_on_client_ready(ClientReadyState::HasUpToDateFlagData);
        hooks.invoke_on_client_ready(ClientReadyState::NoFlagData);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            hooks.ready_state(),
            Some(ClientReadyState::HasUpToDateFlagData)
        );
    }

    #[test]
    fn test_late_ready_subscriber_fires_immediately() {
        let hooks = Hooks::new();
        hooks.invoke_on_client_ready(ClientReadyState::HasCachedFlagDataOnly);

        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();
        hooks.add_on_client_ready(move |state| {
            *sink.lock().unwrap() = Some(state);
        });

        assert_eq!(
            *received.lock().unwrap(),
            Some(ClientReadyState::HasCachedFlagDataOnly)
        );
    }

    #[test]
    fn test_error_and_clear() {
        let hooks = Hooks::new();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        hooks.add_on_error(move |message| sink.lock().unwrap().push(message.to_string()));

        hooks.invoke_on_error("boom");
        hooks.clear();
        hooks.invoke_on_error("ignored");

        assert_eq!(*messages.lock().unwrap(), vec!["boom".to_string()]);
    }
}
