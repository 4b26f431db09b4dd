use super::config::SettingType;
use serde::Serialize;
use std::fmt;

/// Types a setting can be read as.
///
/// Conversion is strict for booleans and strings. Integers accept any
/// integral JSON number that fits, doubles accept any JSON number.
pub trait SettingValue: Sized + Clone + Send + Sync + 'static {
    fn from_json(value: &serde_json::Value) -> Option<Self>;

    fn to_value(&self) -> Value;

    /// The setting types this Rust type can be read from.
    fn accepts(setting_type: SettingType) -> bool;

    fn type_name() -> &'static str;
}

impl SettingValue for bool {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        value.as_bool()
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn accepts(setting_type: SettingType) -> bool {
        setting_type == SettingType::Bool
    }

    fn type_name() -> &'static str {
        "bool"
    }
}

impl SettingValue for i64 {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        value.as_i64()
    }

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn accepts(setting_type: SettingType) -> bool {
        setting_type == SettingType::Int
    }

    fn type_name() -> &'static str {
        "i64"
    }
}

impl SettingValue for i32 {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        value.as_i64().and_then(|n| i32::try_from(n).ok())
    }

    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }

    fn accepts(setting_type: SettingType) -> bool {
        setting_type == SettingType::Int
    }

    fn type_name() -> &'static str {
        "i32"
    }
}

impl SettingValue for f64 {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        value.as_f64()
    }

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn accepts(setting_type: SettingType) -> bool {
        matches!(setting_type, SettingType::Double | SettingType::Int)
    }

    fn type_name() -> &'static str {
        "f64"
    }
}

impl SettingValue for String {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn accepts(setting_type: SettingType) -> bool {
        setting_type == SettingType::String
    }

    fn type_name() -> &'static str {
        "String"
    }
}

impl SettingValue for Value {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        Value::from_json(value)
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn accepts(_: SettingType) -> bool {
        true
    }

    fn type_name() -> &'static str {
        "Value"
    }
}

/// A setting value whose type is only known at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Double)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Double(d) => serde_json::Value::from(d),
            Value::String(s) => serde_json::Value::String(s),
        }
    }
}
