//! ConfigCat Provider for OpenFeature
//!
//! Evaluates OpenFeature flags with a [`ConfigCatClient`]. Targeting rules and
//! percentage rollouts run locally against the downloaded config.
//!
//! # Installation
//!
//! Add the dependency in your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! open-feature-configcat = "0.1"
//! open-feature = "0.2"
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use configcat::ClientOptions;
//! use open_feature::provider::FeatureProvider;
//! use open_feature::EvaluationContext;
//! use open_feature_configcat::ConfigCatProvider;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = ConfigCatProvider::new(
//!         "PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ",
//!         ClientOptions::default(),
//!     )
//!     .unwrap();
//!
//!     let context = EvaluationContext::default()
//!         .with_targeting_key("user-123")
//!         .with_custom_field("email", "user@example.com");
//!
//!     let result = provider.resolve_bool_value("isPOCFeatureEnabled", &context).await;
//!     println!("Feature enabled: {}", result.unwrap().value);
//! }
//! ```
//!
//! # Context mapping
//!
//! | EvaluationContext | ConfigCat user |
//! |-------------------|----------------|
//! | `targeting_key` | Identifier |
//! | `email` | Email |
//! | `country` | Country |
//! | any other primitive | custom attribute |
//!
//! Struct fields are ignored. Struct flags do not exist in ConfigCat, so
//! `resolve_struct_value` always fails with `TypeMismatch`.

pub mod error;

use async_trait::async_trait;
use configcat::{ClientBuilder, ClientOptions, ConfigCatClient, SettingValue, User};
use open_feature::provider::{FeatureProvider, ProviderMetadata, ResolutionDetails};
use open_feature::{
    EvaluationContext, EvaluationContextFieldValue, EvaluationError, EvaluationErrorCode,
    EvaluationReason as Reason, StructValue,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub use error::ConfigCatProviderError;
pub use error::ConfigCatProviderError as Error;

/// The ConfigCat OpenFeature provider.
pub struct ConfigCatProvider {
    metadata: ProviderMetadata,
    client: Arc<ConfigCatClient>,
}

impl fmt::Debug for ConfigCatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigCatProvider")
            .field("metadata", &self.metadata)
            .field("client", &self.client)
            .finish()
    }
}

impl ConfigCatProvider {
    /// Builds a client for `sdk_key` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigCatProviderError::Config`] if the SDK key is empty, the
    /// base URL is invalid, or auto polling is requested outside a tokio runtime.
    #[instrument(skip(sdk_key, options))]
    pub fn new(sdk_key: &str, options: ClientOptions) -> Result<Self, ConfigCatProviderError> {
        debug!("Initializing ConfigCatProvider");
        let client = ClientBuilder::with_options(options).build(sdk_key)?;
        Ok(Self::from_client(Arc::new(client)))
    }

    /// Creates a provider from an existing client.
    pub fn from_client(client: Arc<ConfigCatClient>) -> Self {
        Self {
            metadata: ProviderMetadata::new("configcat"),
            client,
        }
    }

    pub fn client(&self) -> &Arc<ConfigCatClient> {
        &self.client
    }

    async fn resolve<T: SettingValue + Default>(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<T>, EvaluationError> {
        validate_flag_key(flag_key)?;
        let user = context_to_user(context);
        let details = self
            .client
            .get_value_details(flag_key, user.as_ref(), T::default())
            .await;

        if let Some(failure) = details.error {
            return Err(ConfigCatProviderError::from(failure).into());
        }

        let reason = if details.matched_rule.is_some() || details.matched_percentage.is_some() {
            Reason::TargetingMatch
        } else {
            Reason::Default
        };

        Ok(ResolutionDetails {
            value: details.value,
            reason: Some(reason),
            variant: details.variation_id,
            flag_metadata: None,
        })
    }
}

#[async_trait]
impl FeatureProvider for ConfigCatProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    #[instrument(skip(self, context))]
    async fn resolve_bool_value(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<bool>, EvaluationError> {
        debug!("Resolving boolean flag: {}", flag_key);
        self.resolve(flag_key, context).await
    }

    #[instrument(skip(self, context))]
    async fn resolve_string_value(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<String>, EvaluationError> {
        debug!("Resolving string flag: {}", flag_key);
        self.resolve(flag_key, context).await
    }

    #[instrument(skip(self, context))]
    async fn resolve_int_value(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<i64>, EvaluationError> {
        debug!("Resolving integer flag: {}", flag_key);
        self.resolve(flag_key, context).await
    }

    #[instrument(skip(self, context))]
    async fn resolve_float_value(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<f64>, EvaluationError> {
        debug!("Resolving float flag: {}", flag_key);
        self.resolve(flag_key, context).await
    }

    #[instrument(skip(self, _context))]
    async fn resolve_struct_value(
        &self,
        flag_key: &str,
        _context: &EvaluationContext,
    ) -> Result<ResolutionDetails<StructValue>, EvaluationError> {
        validate_flag_key(flag_key)?;
        Err(EvaluationError {
            code: EvaluationErrorCode::TypeMismatch,
            message: Some(format!(
                "Flag '{}' cannot be resolved as a struct, ConfigCat settings are bool, int, double or string",
                flag_key
            )),
        })
    }
}

/// Validate that a flag key is not empty.
pub fn validate_flag_key(flag_key: &str) -> Result<(), EvaluationError> {
    if flag_key.is_empty() {
        return Err(EvaluationError {
            code: EvaluationErrorCode::General("Invalid flag key".to_string()),
            message: Some("Flag key cannot be empty".to_string()),
        });
    }
    Ok(())
}

/// Convert an OpenFeature EvaluationContext to a ConfigCat user.
///
/// Returns `None` for an empty context so that targeting is skipped.
pub fn context_to_user(context: &EvaluationContext) -> Option<User> {
    if context.targeting_key.is_none() && context.custom_fields.is_empty() {
        return None;
    }

    let mut builder = User::builder();
    let mut custom = HashMap::new();
    for (key, value) in &context.custom_fields {
        let value = match value {
            EvaluationContextFieldValue::Bool(b) => b.to_string(),
            EvaluationContextFieldValue::Int(i) => i.to_string(),
            EvaluationContextFieldValue::Float(f) => f.to_string(),
            EvaluationContextFieldValue::String(s) => s.clone(),
            EvaluationContextFieldValue::DateTime(dt) => dt.to_string(),
            EvaluationContextFieldValue::Struct(_) => {
                warn!(
                    "Attribute '{}': Struct values in evaluation context are not supported as ConfigCat user attributes and will be ignored.",
                    key
                );
                continue;
            }
        };
        match key.as_str() {
            "email" | "Email" => builder = builder.email(value),
            "country" | "Country" => builder = builder.country(value),
            _ => {
                custom.insert(key.clone(), value);
            }
        }
    }

    let identifier = context.targeting_key.clone().unwrap_or_default();
    Some(builder.custom(custom).build(identifier))
}
