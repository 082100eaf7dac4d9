use thiserror::Error;

/// Bootstrap-time failures: configuration, logging, HTTP client construction.
///
/// Runtime collaborator failures use [`crate::http::ServiceError`] instead and
/// never escape a subsystem.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Observability error: {0}")]
    ObservabilityError(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}
