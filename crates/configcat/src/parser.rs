//! # Configuration Parser
//!
//! Turns a raw configuration payload into typed values. This is what
//! configuration change listeners receive together with the new payload.
//!
//! Two payload shapes are understood:
//!
//! * a `config_v5.json` document (`{"p": {...}, "f": {...}}`), whose settings
//!   are evaluated for the given user before conversion
//! * a flat `{"key": primitive}` object, served as is
//!
//! ```rust
//! use configcat::ConfigurationParser;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Sample {
//!     #[serde(rename = "keyBool", default)]
//!     key_bool: bool,
//! }
//!
//! let json = r#"{"f": {"keyBool": {"v": true, "t": 0}}}"#;
//! let parser = ConfigurationParser::new();
//!
//! let flag: bool = parser.parse_value(json, "keyBool", None).unwrap();
//! let sample: Sample = parser.parse(json, None).unwrap();
//! assert_eq!(flag, sample.key_bool);
//! ```

use crate::error::{ConfigCatError, Result};
use crate::evaluator::RolloutEvaluator;
use crate::model::{Config, Setting, SettingValue};
use crate::user::User;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::error;

#[derive(Debug, Clone, Default)]
pub struct ConfigurationParser {
    evaluator: RolloutEvaluator,
}

impl ConfigurationParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_config(&self, json: &str) -> Result<Config> {
        if json.trim().is_empty() {
            return Err(ConfigCatError::InvalidArgument(
                "config is empty".to_string(),
            ));
        }

        let document: serde_json::Value =
            serde_json::from_str(json).map_err(|e| parse_failed(e, json))?;
        let serde_json::Value::Object(object) = &document else {
            return Err(ConfigCatError::parse("config is not a JSON object", json));
        };

        // a flat document may have flags named "f" or "p"
        let is_config_v5 = object.get("f").is_some_and(serde_json::Value::is_object)
            && object.get("p").is_none_or(serde_json::Value::is_object);
        if is_config_v5 {
            return serde_json::from_value(document).map_err(|e| parse_failed(e, json));
        }

        let mut entries = HashMap::with_capacity(object.len());
        for (key, value) in object {
            let setting = Setting::from_value(value.clone()).ok_or_else(|| {
                ConfigCatError::parse(format!("'{}' is not a primitive value", key), json)
            })?;
            entries.insert(key.clone(), setting);
        }
        Ok(Config {
            preferences: None,
            entries,
        })
    }

    /// Parses the setting identified by `key` into `T`.
    pub fn parse_value<T: SettingValue>(
        &self,
        json: &str,
        key: &str,
        user: Option<&User>,
    ) -> Result<T> {
        if key.is_empty() {
            return Err(ConfigCatError::InvalidArgument(
                "key is empty".to_string(),
            ));
        }
        if json.is_empty() {
            return Err(ConfigCatError::InvalidArgument(
                "config is empty".to_string(),
            ));
        }

        let config = self.parse_config(json)?;
        let setting = config.entries.get(key).ok_or_else(|| {
            let error = ConfigCatError::parse(format!("key '{}' not found", key), json);
            error!("Parsing of the json ({}) failed: {}", json, error);
            error
        })?;

        let result = self.evaluator.evaluate(setting, key, user);
        T::from_json(&result.value).ok_or_else(|| {
            let error = ConfigCatError::parse(
                format!(
                    "value of '{}' ({}) is not a valid {}",
                    key,
                    result.value,
                    T::type_name()
                ),
                json,
            );
            error!("Parsing of the json ({}) failed: {}", json, error);
            error
        })
    }

    /// Evaluates every setting for `user` and deserializes the result into `T`.
    pub fn parse<T: DeserializeOwned>(&self, json: &str, user: Option<&User>) -> Result<T> {
        let config = self.parse_config(json)?;
        let values = self.evaluate_all(&config, user);
        serde_json::from_value(serde_json::Value::Object(values.into_iter().collect())).map_err(
            |e| {
                error!("Parsing of the json ({}) failed: {}", json, e);
                parse_failed(e, json)
            },
        )
    }

    /// Evaluated value of every setting in `config`.
    pub fn evaluate_all(
        &self,
        config: &Config,
        user: Option<&User>,
    ) -> HashMap<String, serde_json::Value> {
        config
            .entries
            .iter()
            .map(|(key, setting)| {
                let result = self.evaluator.evaluate(setting, key, user);
                (key.clone(), result.value)
            })
            .collect()
    }
}

fn parse_failed(error: serde_json::Error, json: &str) -> ConfigCatError {
    ConfigCatError::parse(error.to_string(), json)
}
