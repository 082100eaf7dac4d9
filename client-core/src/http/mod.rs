//! Shared HTTP plumbing for collaborator clients.
//!
//! Every collaborator call ends in either a decoded payload or a
//! [`ServiceError`]; status handling and structured-detail extraction live
//! here so each client only describes its own endpoints.

use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::error::AppError;

/// Failure of a call to an external collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service responded with status {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("Not found: {path}")]
    NotFound { path: String, detail: Option<String> },

    #[error("Invalid response payload: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Structured error detail supplied by the service, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ServiceError::Status { detail, .. } | ServiceError::NotFound { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Transport(_) => "transport",
            ServiceError::Status { .. } => "status",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else if err.is_timeout() {
            ServiceError::Transport(format!("request timed out: {}", err))
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

/// Error body convention of the backend: `{"detail": "..."}`. The detail may
/// also be a JSON structure (validation errors), which is kept as JSON text.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Extract the `detail` field from an error body, if it has one.
pub fn parse_error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Pass successful responses through; turn anything else into a [`ServiceError`].
pub async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let path = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let detail = parse_error_detail(&body);

    tracing::debug!(status = %status, path = %path, body = %body, "Collaborator call failed");

    if status == StatusCode::NOT_FOUND {
        return Err(ServiceError::NotFound { path, detail });
    }

    Err(ServiceError::Status {
        status: status.as_u16(),
        detail,
    })
}

/// Check status, then decode the body against `T`.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Build the shared reqwest client with connect and overall timeouts.
pub fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()?)
}

/// Parse and check the collaborator origin once, at client construction.
pub fn parse_base_url(base_url: &str) -> Result<Url, AppError> {
    let url = Url::parse(base_url)
        .map_err(|e| AppError::InvalidConfig(format!("invalid base URL {}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(AppError::InvalidConfig(format!(
            "base URL cannot carry a path: {}",
            base_url
        )));
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ServiceError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ServiceError::Transport(format!("cannot build a path on {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
