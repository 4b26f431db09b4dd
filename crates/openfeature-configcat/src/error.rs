use configcat::{ConfigCatError, EvaluationFailure, FailureKind};
use thiserror::Error;

/// Errors raised by the ConfigCat provider.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigCatProviderError {
    /// The client could not be built from the given options
    #[error("Configuration error: {0}")]
    Config(String),

    /// No config has been downloaded or loaded yet
    #[error("Provider not ready: {0}")]
    NotReady(String),

    #[error("Flag not found: {0}")]
    FlagNotFound(String),

    /// The setting's type differs from the requested one
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl From<ConfigCatError> for ConfigCatProviderError {
    fn from(error: ConfigCatError) -> Self {
        ConfigCatProviderError::Config(error.to_string())
    }
}

impl From<EvaluationFailure> for ConfigCatProviderError {
    fn from(failure: EvaluationFailure) -> Self {
        match failure.kind {
            FailureKind::ConfigMissing => ConfigCatProviderError::NotReady(failure.message),
            FailureKind::FlagNotFound => ConfigCatProviderError::FlagNotFound(failure.message),
            FailureKind::TypeMismatch => ConfigCatProviderError::TypeMismatch(failure.message),
            FailureKind::InvalidArgument => ConfigCatProviderError::Evaluation(failure.message),
        }
    }
}

/// Map ConfigCatProviderError to OpenFeature EvaluationError
impl From<ConfigCatProviderError> for open_feature::EvaluationError {
    fn from(error: ConfigCatProviderError) -> Self {
        use open_feature::EvaluationErrorCode;

        let (code, message) = match error {
            ConfigCatProviderError::Config(msg) => (
                EvaluationErrorCode::General("Configuration error".to_string()),
                msg,
            ),
            ConfigCatProviderError::NotReady(msg) => (EvaluationErrorCode::ProviderNotReady, msg),
            ConfigCatProviderError::FlagNotFound(msg) => (EvaluationErrorCode::FlagNotFound, msg),
            ConfigCatProviderError::TypeMismatch(msg) => (EvaluationErrorCode::TypeMismatch, msg),
            ConfigCatProviderError::Evaluation(msg) => (
                EvaluationErrorCode::General("Evaluation error".to_string()),
                msg,
            ),
        };
        open_feature::EvaluationError {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_feature::EvaluationErrorCode;

    #[test]
    fn test_failure_kinds_map_to_error_codes() {
        let cases = [
            (FailureKind::ConfigMissing, EvaluationErrorCode::ProviderNotReady),
            (FailureKind::FlagNotFound, EvaluationErrorCode::FlagNotFound),
            (FailureKind::TypeMismatch, EvaluationErrorCode::TypeMismatch),
        ];
        for (kind, code) in cases {
            let error: ConfigCatProviderError = EvaluationFailure::new(kind, "message").into();
            let evaluation_error: open_feature::EvaluationError = error.into();
            assert_eq!(evaluation_error.code, code);
            assert_eq!(evaluation_error.message.as_deref(), Some("message"));
        }
    }

    #[test]
    fn test_client_errors_are_configuration_errors() {
        let error: ConfigCatProviderError =
            ConfigCatError::InvalidArgument("sdk_key cannot be empty".to_string()).into();
        assert!(matches!(error, ConfigCatProviderError::Config(_)));
    }
}
