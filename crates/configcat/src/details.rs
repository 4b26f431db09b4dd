use crate::model::{PercentageItem, RolloutRule, SettingValue, Value};
use crate::user::User;
use chrono::{DateTime, Utc};
use std::fmt;

/// Why an evaluation fell back to the default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConfigMissing,
    FlagNotFound,
    TypeMismatch,
    InvalidArgument,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ConfigMissing => write!(f, "config missing"),
            FailureKind::FlagNotFound => write!(f, "flag not found"),
            FailureKind::TypeMismatch => write!(f, "type mismatch"),
            FailureKind::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl EvaluationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for EvaluationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Everything known about a single flag evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDetails<T> {
    pub value: T,
    pub key: String,
    pub variation_id: Option<String>,
    pub user: Option<User>,
    pub is_default_value: bool,
    pub error: Option<EvaluationFailure>,
    pub fetch_time: Option<DateTime<Utc>>,
    pub matched_rule: Option<RolloutRule>,
    pub matched_percentage: Option<PercentageItem>,
}

impl<T> EvaluationDetails<T> {
    pub(crate) fn from_default(
        key: &str,
        value: T,
        user: Option<&User>,
        error: EvaluationFailure,
    ) -> Self {
        Self {
            value,
            key: key.to_string(),
            variation_id: None,
            user: user.cloned(),
            is_default_value: true,
            error: Some(error),
            fetch_time: None,
            matched_rule: None,
            matched_percentage: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<T: SettingValue> EvaluationDetails<T> {
    /// Type erased copy, as handed to `on_flag_evaluated` hooks.
    pub fn to_dynamic(&self) -> EvaluationDetails<Value> {
        EvaluationDetails {
            value: self.value.to_value(),
            key: self.key.clone(),
            variation_id: self.variation_id.clone(),
            user: self.user.clone(),
            is_default_value: self.is_default_value,
            error: self.error.clone(),
            fetch_time: self.fetch_time,
            matched_rule: self.matched_rule.clone(),
            matched_percentage: self.matched_percentage.clone(),
        }
    }
}
