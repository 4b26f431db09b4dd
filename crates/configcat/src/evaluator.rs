//! # Rollout Evaluation
//!
//! Resolves a [`Setting`] for a [`User`]:
//!
//! 1. targeting rules are checked in order, the first match wins
//! 2. otherwise the user falls into a percentage bucket, if the setting has any
//! 3. otherwise the setting's default value is served
//!
//! Percentage buckets are derived from the SHA-1 of the flag key concatenated
//! with the user identifier, so a user stays in the same bucket across
//! evaluations and processes.

use crate::model::{Comparator, PercentageItem, RolloutRule, Setting};
use crate::user::User;
use sha1::{Digest, Sha1};
use std::fmt::Write as _;
use tracing::{info, warn};

/// Outcome of evaluating one setting.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub value: serde_json::Value,
    pub variation_id: String,
    pub matched_rule: Option<RolloutRule>,
    pub matched_percentage: Option<PercentageItem>,
}

#[derive(Debug, Clone, Default)]
pub struct RolloutEvaluator;

impl RolloutEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, setting: &Setting, key: &str, user: Option<&User>) -> EvaluationResult {
        let mut log = EvaluationLog::new(key);
        let result = self.evaluate_with_log(setting, key, user, &mut log);
        info!(target: "configcat::evaluate", flag_key = %key, "{}", log.finish());
        result
    }

    fn evaluate_with_log(
        &self,
        setting: &Setting,
        key: &str,
        user: Option<&User>,
        log: &mut EvaluationLog,
    ) -> EvaluationResult {
        let Some(user) = user else {
            if setting.has_targeting() {
                warn!(
                    flag_key = %key,
                    "Cannot evaluate targeting rules and % options for setting '{}' (User Object is missing). \
                     You should pass a User Object to the evaluation methods like `get_value()` in order to make targeting work properly.",
                    key
                );
            }
            log.returning(&setting.value);
            return default_result(setting);
        };

        log.user(user);

        for rule in &setting.rollout_rules {
            let user_value = user.attribute(&rule.comparison_attribute).unwrap_or_default();
            if rule.comparison_value.is_empty() || user_value.is_empty() {
                log.no_match(rule, user_value);
                continue;
            }

            match matches(rule, user_value) {
                Ok(true) => {
                    log.matched(rule, user_value);
                    return EvaluationResult {
                        value: rule.value.clone(),
                        variation_id: rule.variation_id.clone(),
                        matched_rule: Some(rule.clone()),
                        matched_percentage: None,
                    };
                }
                Ok(false) => log.no_match(rule, user_value),
                Err(reason) => {
                    let message = log.format_error(rule, user_value, &reason);
                    warn!(flag_key = %key, "{}", message);
                }
            }
        }

        if !setting.percentage_items.is_empty() {
            let scaled = percentage_bucket(key, user.identifier());
            let mut bucket = 0;
            for item in &setting.percentage_items {
                bucket += item.percentage;
                if scaled < bucket {
                    log.percentage(scaled, &item.value);
                    return EvaluationResult {
                        value: item.value.clone(),
                        variation_id: item.variation_id.clone(),
                        matched_rule: None,
                        matched_percentage: Some(item.clone()),
                    };
                }
            }
        }

        log.returning(&setting.value);
        default_result(setting)
    }
}

fn default_result(setting: &Setting) -> EvaluationResult {
    EvaluationResult {
        value: setting.value.clone(),
        variation_id: setting.variation_id.clone(),
        matched_rule: None,
        matched_percentage: None,
    }
}

/// Maps a user into the `[0, 100)` range.
pub fn percentage_bucket(key: &str, identifier: &str) -> i64 {
    let hash = sha1_hex(&format!("{}{}", key, identifier));
    // 7 hex digits always fit in an i64
    i64::from_str_radix(&hash[..7], 16).unwrap_or_default() % 100
}

pub(crate) fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

fn split_list(comparison_value: &str) -> impl Iterator<Item = &str> {
    comparison_value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_semver(value: &str) -> Result<semver::Version, String> {
    let value = value.trim();
    let version = value.strip_prefix(['v', 'V']).unwrap_or(value);
    semver::Version::parse(version).map_err(|e| e.to_string())
}

fn parse_number(value: &str) -> Result<f64, String> {
    value
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| format!("{} ({})", e, value))
}

/// Returns `Err` when either side cannot be interpreted for the comparator.
fn matches(rule: &RolloutRule, user_value: &str) -> Result<bool, String> {
    let comparison_value = rule.comparison_value.as_str();
    match rule.comparator {
        Comparator::IsOneOf => Ok(split_list(comparison_value).any(|v| v == user_value)),
        Comparator::IsNotOneOf => Ok(!split_list(comparison_value).any(|v| v == user_value)),
        Comparator::Contains => Ok(user_value.contains(comparison_value)),
        Comparator::DoesNotContain => Ok(!user_value.contains(comparison_value)),
        Comparator::SemVerIsOneOf | Comparator::SemVerIsNotOneOf => {
            let user_version = parse_semver(user_value)?;
            let mut matched = false;
            for candidate in split_list(comparison_value) {
                let version = parse_semver(candidate)?;
                matched |= user_version.cmp_precedence(&version).is_eq();
            }
            Ok(matched == (rule.comparator == Comparator::SemVerIsOneOf))
        }
        Comparator::SemVerLess
        | Comparator::SemVerLessOrEquals
        | Comparator::SemVerGreater
        | Comparator::SemVerGreaterOrEquals => {
            let user_version = parse_semver(user_value)?;
            let version = parse_semver(comparison_value)?;
            let ordering = user_version.cmp_precedence(&version);
            Ok(match rule.comparator {
                Comparator::SemVerLess => ordering.is_lt(),
                Comparator::SemVerLessOrEquals => ordering.is_le(),
                Comparator::SemVerGreater => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        Comparator::NumberEquals
        | Comparator::NumberNotEquals
        | Comparator::NumberLess
        | Comparator::NumberLessOrEquals
        | Comparator::NumberGreater
        | Comparator::NumberGreaterOrEquals => {
            let user_number = parse_number(user_value)?;
            let number = parse_number(comparison_value)?;
            Ok(match rule.comparator {
                Comparator::NumberEquals => user_number == number,
                Comparator::NumberNotEquals => user_number != number,
                Comparator::NumberLess => user_number < number,
                Comparator::NumberLessOrEquals => user_number <= number,
                Comparator::NumberGreater => user_number > number,
                _ => user_number >= number,
            })
        }
        Comparator::SensitiveIsOneOf => {
            let hashed = sha1_hex(user_value);
            Ok(split_list(comparison_value).any(|v| v == hashed))
        }
        Comparator::SensitiveIsNotOneOf => {
            let hashed = sha1_hex(user_value);
            Ok(!split_list(comparison_value).any(|v| v == hashed))
        }
        Comparator::Unknown(raw) => Err(format!("unsupported comparator {}", raw)),
    }
}

/// Human readable trace of a single evaluation.
struct EvaluationLog {
    buffer: String,
}

impl EvaluationLog {
    fn new(key: &str) -> Self {
        Self {
            buffer: format!("Evaluating get_value({})", key),
        }
    }

    fn user(&mut self, user: &User) {
        let _ = write!(self.buffer, "\nUser object: {}", user);
    }

    fn condition(rule: &RolloutRule, user_value: &str) -> String {
        let comparison_value = match rule.comparator {
            Comparator::SensitiveIsOneOf | Comparator::SensitiveIsNotOneOf => "<hashed values>",
            _ => rule.comparison_value.as_str(),
        };
        format!(
            "Evaluating rule: [{}:{}] [{}] [{}]",
            rule.comparison_attribute, user_value, rule.comparator, comparison_value
        )
    }

    fn matched(&mut self, rule: &RolloutRule, user_value: &str) {
        let _ = write!(
            self.buffer,
            "\n{} => match, returning: {}",
            Self::condition(rule, user_value),
            rule.value
        );
    }

    fn no_match(&mut self, rule: &RolloutRule, user_value: &str) {
        let _ = write!(
            self.buffer,
            "\n{} => no match",
            Self::condition(rule, user_value)
        );
    }

    fn format_error(&mut self, rule: &RolloutRule, user_value: &str, reason: &str) -> String {
        let message = format!(
            "{} => SKIP rule. Validation error: {}",
            Self::condition(rule, user_value),
            reason
        );
        let _ = write!(self.buffer, "\n{}", message);
        message
    }

    fn percentage(&mut self, bucket: i64, value: &serde_json::Value) {
        let _ = write!(
            self.buffer,
            "\nEvaluating % options (bucket {}). Returning {}",
            bucket, value
        );
    }

    fn returning(&mut self, value: &serde_json::Value) {
        let _ = write!(self.buffer, "\nReturning {}", value);
    }

    fn finish(self) -> String {
        self.buffer
    }
}
