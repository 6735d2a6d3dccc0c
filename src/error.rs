use thiserror::Error;

/// Errors that can occur while talking to the storage service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CloudError {
    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Service error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("Credential encryption failed: {0}")]
    Encryption(String),
}

impl From<reqwest::Error> for CloudError {
    fn from(e: reqwest::Error) -> Self {
        CloudError::Http(e.to_string())
    }
}

/// Errors that can occur when delivering a report to a webhook
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),

    #[error("Webhook rejected the message: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
