//! # Flag Overrides
//!
//! Local flag values that replace or complement the downloaded config.
//!
//! ## Behaviours
//!
//! * [`OverrideBehaviour::LocalOnly`] - the CDN is never contacted
//! * [`OverrideBehaviour::LocalOverRemote`] - local values win on key collision
//! * [`OverrideBehaviour::RemoteOverLocal`] - downloaded values win on key collision
//!
//! ## File format
//!
//! Either the simplified form
//!
//! ```json
//! { "flags": { "enabledFeature": true, "intSetting": 5, "stringSetting": "test" } }
//! ```
//!
//! or a complete `config_v5.json` document, targeting rules included. With
//! `auto_reload` the file is watched and re-read whenever it changes; a
//! file that cannot be read or parsed leaves the previous values in place.

use crate::error::{ConfigCatError, Result};
use crate::hooks::Hooks;
use crate::model::{Config, Setting};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideBehaviour {
    LocalOnly,
    LocalOverRemote,
    RemoteOverLocal,
}

#[derive(Debug, Clone)]
pub enum OverrideDataSource {
    Map(HashMap<String, serde_json::Value>),
    File { path: PathBuf, auto_reload: bool },
}

impl OverrideDataSource {
    pub fn map<K, I>(values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        OverrideDataSource::Map(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn file(path: impl Into<PathBuf>, auto_reload: bool) -> Self {
        OverrideDataSource::File {
            path: path.into(),
            auto_reload,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlagOverrides {
    pub source: OverrideDataSource,
    pub behaviour: OverrideBehaviour,
}

impl FlagOverrides {
    pub fn new(source: OverrideDataSource, behaviour: OverrideBehaviour) -> Self {
        Self { source, behaviour }
    }
}

type SettingsMap = Arc<HashMap<String, Setting>>;

/// Loaded override values, kept current by an optional file watcher.
pub(crate) struct LocalSettings {
    settings: Arc<RwLock<SettingsMap>>,
    watcher: Mutex<Option<(RecommendedWatcher, PathBuf)>>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for LocalSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSettings")
            .field("keys", &self.settings().len())
            .finish_non_exhaustive()
    }
}

impl LocalSettings {
    pub(crate) fn load(source: OverrideDataSource, hooks: Arc<Hooks>) -> Result<Self> {
        let local = Self {
            settings: Arc::new(RwLock::new(Arc::new(HashMap::new()))),
            watcher: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        match source {
            OverrideDataSource::Map(values) => {
                let mut settings = HashMap::with_capacity(values.len());
                for (key, value) in values {
                    let setting = Setting::from_value(value).ok_or_else(|| {
                        ConfigCatError::InvalidArgument(format!(
                            "Override value of '{}' must be a bool, string, int or double",
                            key
                        ))
                    })?;
                    settings.insert(key, setting);
                }
                replace(&local.settings, settings);
            }
            OverrideDataSource::File { path, auto_reload } => {
                debug!("Reading {:?} for local overrides", path);
                match read_file(&path) {
                    Ok(settings) => {
                        replace(&local.settings, settings);
                    }
                    Err(e) => error!("Failed to read the local config file {:?}: {}", path, e),
                }
                if auto_reload {
                    local.watch(path, hooks)?;
                }
            }
        }

        Ok(local)
    }

    pub(crate) fn settings(&self) -> SettingsMap {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn watch(&self, path: PathBuf, hooks: Arc<Hooks>) -> Result<()> {
        let settings = self.settings.clone();
        let shutdown = self.shutdown.clone();
        let file_path = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            match res {
                Ok(event) => {
                    // Editors often replace the file, so creates and removes count as well
                    let relevant = matches!(
                        event.kind,
                        notify::EventKind::Modify(_)
                            | notify::EventKind::Create(_)
                            | notify::EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_path.file_name());
                    if !relevant {
                        return;
                    }

                    debug!("Local override file change detected: {:?}", event.kind);
                    match read_file(&file_path) {
                        Ok(new_settings) => {
                            let new_settings = replace(&settings, new_settings);
                            hooks.invoke_on_config_changed(&new_settings);
                        }
                        Err(e) => warn!("Failed to reload {:?}, keeping previous values: {}", file_path, e),
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            }
        })?;

        // Watch the parent directory to catch file replacements
        let watch_path = path.parent().unwrap_or(&path).to_path_buf();
        watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;
        debug!("Started watching for file changes at: {:?}", path);

        if let Ok(mut guard) = self.watcher.lock() {
            *guard = Some((watcher, watch_path));
        }
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.watcher.lock() {
            if let Some((mut watcher, watch_path)) = guard.take() {
                let _ = watcher.unwatch(&watch_path);
            }
        }
    }
}

impl Drop for LocalSettings {
    fn drop(&mut self) {
        self.close();
    }
}

fn replace(target: &RwLock<SettingsMap>, settings: HashMap<String, Setting>) -> SettingsMap {
    let settings = Arc::new(settings);
    match target.write() {
        Ok(mut guard) => *guard = settings.clone(),
        Err(e) => error!("Local settings lock poisoned: {}", e),
    }
    settings
}

fn read_file(path: &Path) -> Result<HashMap<String, Setting>> {
    let content = std::fs::read_to_string(path)?;
    parse_overrides(&content)
}

/// Parses either the simplified `{"flags": {...}}` form or a full config.
pub(crate) fn parse_overrides(content: &str) -> Result<HashMap<String, Setting>> {
    let document: serde_json::Value =
        serde_json::from_str(content).map_err(|e| ConfigCatError::parse(e.to_string(), content))?;

    if let Some(flags) = document.get("flags").and_then(|f| f.as_object()) {
        return flags
            .iter()
            .map(|(key, value)| {
                Setting::from_value(value.clone())
                    .map(|setting| (key.clone(), setting))
                    .ok_or_else(|| {
                        ConfigCatError::parse(
                            format!("Invalid override value for '{}': {}", key, value),
                            content,
                        )
                    })
            })
            .collect();
    }

    let config: Config = serde_json::from_value(document)
        .map_err(|e| ConfigCatError::parse(e.to_string(), content))?;
    Ok(config.entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SettingType;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simplified_format() {
        let settings = parse_overrides(
            r#"{"flags": {"enabled": true, "count": 5, "ratio": 0.5, "text": "hi"}}"#,
        )
        .unwrap();

        assert_eq!(settings["enabled"].setting_type, SettingType::Bool);
        assert_eq!(settings["count"].setting_type, SettingType::Int);
        assert_eq!(settings["ratio"].setting_type, SettingType::Double);
        assert_eq!(settings["text"].value, json!("hi"));
    }

    #[test]
    fn test_parse_full_config() {
        let settings = parse_overrides(
            r#"{"f": {"targeted": {"v": "default", "t": 1, "r": [{"v": "x", "a": "Email", "t": 2, "c": "@a.com"}]}}}"#,
        )
        .unwrap();
        assert_eq!(settings["targeted"].rollout_rules.len(), 1);
    }

    #[test]
    fn test_parse_rejects_nested_values() {
        assert!(parse_overrides(r#"{"flags": {"nested": {"a": 1}}}"#).is_err());
        assert!(parse_overrides("not json").is_err());
    }

    #[test]
    fn test_map_source() {
        let source = OverrideDataSource::map([("enabled", json!(true)), ("name", json!("x"))]);
        let local = LocalSettings::load(source, Arc::new(Hooks::new())).unwrap();
        let settings = local.settings();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings["enabled"].value, json!(true));
    }

    #[test]
    fn test_map_source_rejects_non_primitive() {
        let source = OverrideDataSource::map([("bad", json!([1, 2]))]);
        assert!(LocalSettings::load(source, Arc::new(Hooks::new())).is_err());
    }

    #[test]
    fn test_missing_file_yields_empty_settings() {
        let source = OverrideDataSource::file("/nonexistent/overrides.json", false);
        let local = LocalSettings::load(source, Arc::new(Hooks::new())).unwrap();
        assert!(local.settings().is_empty());
    }

    #[test]
    fn test_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"flags": {{"enabled": false}}}}"#).unwrap();

        let local =
            LocalSettings::load(OverrideDataSource::file(file.path(), false), Arc::new(Hooks::new()))
                .unwrap();
        assert_eq!(local.settings()["enabled"].value, json!(false));
    }
}
