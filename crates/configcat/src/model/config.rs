use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Parsed `config_v5.json` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(rename = "f", default)]
    pub entries: HashMap<String, Setting>,
}

impl Config {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.preferences.is_none() && self.entries.is_empty()
    }
}

/// CDN routing information embedded in every config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "u", default)]
    pub base_url: String,
    #[serde(rename = "r", default)]
    pub redirect: i32,
}

impl Preferences {
    pub fn redirect_mode(&self) -> RedirectMode {
        match self.redirect {
            1 => RedirectMode::Should,
            2 => RedirectMode::Force,
            _ => RedirectMode::No,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    No,
    Should,
    Force,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SettingType {
    #[default]
    Bool,
    String,
    Int,
    Double,
}

impl SettingType {
    /// Infers the setting type of a primitive JSON value.
    pub fn infer(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(_) => Some(SettingType::Bool),
            serde_json::Value::String(_) => Some(SettingType::String),
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some(SettingType::Int),
            serde_json::Value::Number(_) => Some(SettingType::Double),
            _ => None,
        }
    }
}

impl TryFrom<u8> for SettingType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SettingType::Bool),
            1 => Ok(SettingType::String),
            2 => Ok(SettingType::Int),
            3 => Ok(SettingType::Double),
            other => Err(format!("unknown setting type: {}", other)),
        }
    }
}

impl From<SettingType> for u8 {
    fn from(value: SettingType) -> Self {
        match value {
            SettingType::Bool => 0,
            SettingType::String => 1,
            SettingType::Int => 2,
            SettingType::Double => 3,
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingType::Bool => write!(f, "bool"),
            SettingType::String => write!(f, "string"),
            SettingType::Int => write!(f, "int"),
            SettingType::Double => write!(f, "double"),
        }
    }
}

/// A feature flag or setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    #[serde(rename = "v")]
    pub value: serde_json::Value,
    #[serde(rename = "t", default)]
    pub setting_type: SettingType,
    #[serde(rename = "p", default)]
    pub percentage_items: Vec<PercentageItem>,
    #[serde(rename = "r", default)]
    pub rollout_rules: Vec<RolloutRule>,
    #[serde(rename = "i", default)]
    pub variation_id: String,
}

impl Setting {
    /// Builds an untargeted setting from a primitive value, inferring its type.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        let setting_type = SettingType::infer(&value)?;
        Some(Self {
            value,
            setting_type,
            percentage_items: Vec::new(),
            rollout_rules: Vec::new(),
            variation_id: String::new(),
        })
    }

    pub fn has_targeting(&self) -> bool {
        !self.rollout_rules.is_empty() || !self.percentage_items.is_empty()
    }
}

/// A targeting rule, evaluated against one user attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutRule {
    #[serde(rename = "v")]
    pub value: serde_json::Value,
    #[serde(rename = "a", default)]
    pub comparison_attribute: String,
    #[serde(rename = "t", default)]
    pub comparator: Comparator,
    #[serde(rename = "c", default)]
    pub comparison_value: String,
    #[serde(rename = "i", default)]
    pub variation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageItem {
    #[serde(rename = "v")]
    pub value: serde_json::Value,
    #[serde(rename = "p", default)]
    pub percentage: i64,
    #[serde(rename = "i", default)]
    pub variation_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Comparator {
    #[default]
    IsOneOf,
    IsNotOneOf,
    Contains,
    DoesNotContain,
    SemVerIsOneOf,
    SemVerIsNotOneOf,
    SemVerLess,
    SemVerLessOrEquals,
    SemVerGreater,
    SemVerGreaterOrEquals,
    NumberEquals,
    NumberNotEquals,
    NumberLess,
    NumberLessOrEquals,
    NumberGreater,
    NumberGreaterOrEquals,
    SensitiveIsOneOf,
    SensitiveIsNotOneOf,
    /// A comparator this client does not know; rules using it never match.
    Unknown(u8),
}

const COMPARATORS: [Comparator; 18] = [
    Comparator::IsOneOf,
    Comparator::IsNotOneOf,
    Comparator::Contains,
    Comparator::DoesNotContain,
    Comparator::SemVerIsOneOf,
    Comparator::SemVerIsNotOneOf,
    Comparator::SemVerLess,
    Comparator::SemVerLessOrEquals,
    Comparator::SemVerGreater,
    Comparator::SemVerGreaterOrEquals,
    Comparator::NumberEquals,
    Comparator::NumberNotEquals,
    Comparator::NumberLess,
    Comparator::NumberLessOrEquals,
    Comparator::NumberGreater,
    Comparator::NumberGreaterOrEquals,
    Comparator::SensitiveIsOneOf,
    Comparator::SensitiveIsNotOneOf,
];

impl From<u8> for Comparator {
    fn from(value: u8) -> Self {
        COMPARATORS
            .get(usize::from(value))
            .copied()
            .unwrap_or(Comparator::Unknown(value))
    }
}

impl From<Comparator> for u8 {
    fn from(value: Comparator) -> Self {
        match value {
            Comparator::Unknown(raw) => raw,
            known => COMPARATORS
                .iter()
                .position(|c| *c == known)
                .map(|index| index as u8)
                .unwrap_or(u8::MAX),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Comparator::IsOneOf => "IS ONE OF",
            Comparator::IsNotOneOf => "IS NOT ONE OF",
            Comparator::Contains => "CONTAINS",
            Comparator::DoesNotContain => "DOES NOT CONTAIN",
            Comparator::SemVerIsOneOf => "IS ONE OF (SemVer)",
            Comparator::SemVerIsNotOneOf => "IS NOT ONE OF (SemVer)",
            Comparator::SemVerLess => "< (SemVer)",
            Comparator::SemVerLessOrEquals => "<= (SemVer)",
            Comparator::SemVerGreater => "> (SemVer)",
            Comparator::SemVerGreaterOrEquals => ">= (SemVer)",
            Comparator::NumberEquals => "= (Number)",
            Comparator::NumberNotEquals => "<> (Number)",
            Comparator::NumberLess => "< (Number)",
            Comparator::NumberLessOrEquals => "<= (Number)",
            Comparator::NumberGreater => "> (Number)",
            Comparator::NumberGreaterOrEquals => ">= (Number)",
            Comparator::SensitiveIsOneOf => "IS ONE OF (Sensitive)",
            Comparator::SensitiveIsNotOneOf => "IS NOT ONE OF (Sensitive)",
            Comparator::Unknown(raw) => return write!(f, "UNKNOWN ({})", raw),
        };
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_config_v5() {
        let payload = json!({
            "p": {"u": "https://cdn-global.configcat.com", "r": 0},
            "f": {
                "isAwesome": {
                    "v": false,
                    "t": 0,
                    "i": "v-default",
                    "r": [
                        {"v": true, "a": "Email", "t": 2, "c": "@example.com", "i": "v-rule"}
                    ],
                    "p": [
                        {"v": true, "p": 30, "i": "v-30"},
                        {"v": false, "p": 70, "i": "v-70"}
                    ]
                }
            }
        });

        let config: Config = serde_json::from_value(payload).unwrap();
        let setting = &config.entries["isAwesome"];

        assert_eq!(setting.setting_type, SettingType::Bool);
        assert_eq!(setting.variation_id, "v-default");
        assert_eq!(setting.rollout_rules[0].comparator, Comparator::Contains);
        assert_eq!(setting.percentage_items[1].percentage, 70);
        assert_eq!(
            config.preferences.unwrap().redirect_mode(),
            RedirectMode::No
        );
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let config: Config = serde_json::from_str(r#"{"f": {"k": {"v": "text"}}}"#).unwrap();
        let setting = &config.entries["k"];
        assert!(setting.rollout_rules.is_empty());
        assert!(setting.percentage_items.is_empty());
        assert_eq!(setting.variation_id, "");
        assert!(config.preferences.is_none());
    }

    #[test]
    fn test_unknown_comparator_is_preserved() {
        let rule: RolloutRule =
            serde_json::from_value(json!({"v": 1, "a": "Email", "t": 42, "c": "x"})).unwrap();
        assert_eq!(rule.comparator, Comparator::Unknown(42));
        assert_eq!(u8::from(rule.comparator), 42);
    }

    #[test]
    fn test_comparator_round_trip_index() {
        for (index, comparator) in COMPARATORS.iter().enumerate() {
            assert_eq!(Comparator::from(index as u8), *comparator);
            assert_eq!(u8::from(*comparator), index as u8);
        }
    }

    #[test]
    fn test_invalid_setting_type_rejected() {
        let result = serde_json::from_str::<Setting>(r#"{"v": 1, "t": 9}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_setting_from_value_infers_type() {
        assert_eq!(
            Setting::from_value(json!(true)).unwrap().setting_type,
            SettingType::Bool
        );
        assert_eq!(
            Setting::from_value(json!(5)).unwrap().setting_type,
            SettingType::Int
        );
        assert_eq!(
            Setting::from_value(json!(5.5)).unwrap().setting_type,
            SettingType::Double
        );
        assert_eq!(
            Setting::from_value(json!("x")).unwrap().setting_type,
            SettingType::String
        );
        assert!(Setting::from_value(json!({"nested": true})).is_none());
    }
}
