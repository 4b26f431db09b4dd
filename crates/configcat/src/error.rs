use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigCatError>;

#[derive(Error, Debug)]
pub enum ConfigCatError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Fetch error: {0}")]
    Fetch(String),
    /// Keeps the payload that could not be parsed so callers can report it.
    #[error("Parsing failed: {message}")]
    Parse { message: String, json: String },
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Client is closed")]
    Closed,
}

impl ConfigCatError {
    pub fn parse(message: impl Into<String>, json: impl Into<String>) -> Self {
        ConfigCatError::Parse {
            message: message.into(),
            json: json.into(),
        }
    }

    /// The JSON that failed to parse, if this is a parse error.
    pub fn json(&self) -> Option<&str> {
        match self {
            ConfigCatError::Parse { json, .. } => Some(json),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigCatError {
    fn from(error: serde_json::Error) -> Self {
        ConfigCatError::parse(error.to_string(), String::new())
    }
}

impl From<reqwest::Error> for ConfigCatError {
    fn from(error: reqwest::Error) -> Self {
        ConfigCatError::Fetch(error.to_string())
    }
}

impl From<notify::Error> for ConfigCatError {
    fn from(error: notify::Error) -> Self {
        ConfigCatError::Io(std::io::Error::other(error))
    }
}

impl From<url::ParseError> for ConfigCatError {
    fn from(error: url::ParseError) -> Self {
        ConfigCatError::Config(format!("Invalid URL: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for ConfigCatError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        ConfigCatError::Timeout(error.to_string())
    }
}
