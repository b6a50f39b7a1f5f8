use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures raised while fetching, parsing or scoring source data.
///
/// None of these escape the registry boundary: connectors record them in
/// `SourceState`, the normalizer skips the offending record and the ensemble
/// substitutes a neutral vote.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("model '{model}' exceeded its {budget:?} budget")]
    ModelTimeout { model: String, budget: Duration },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Stable, serializable classification of a `SourceError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    RateLimited,
    Unauthorized,
    Forbidden,
    Malformed,
    ModelTimeout,
    Unknown,
}

impl SourceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SourceError::ConnectionTimeout(_) => ErrorClass::Timeout,
            SourceError::RateLimited(_) => ErrorClass::RateLimited,
            SourceError::Unauthorized(_) => ErrorClass::Unauthorized,
            SourceError::Forbidden(_) => ErrorClass::Forbidden,
            SourceError::MalformedPayload(_) => ErrorClass::Malformed,
            SourceError::ModelTimeout { .. } => ErrorClass::ModelTimeout,
            SourceError::Http(_) | SourceError::Unknown(_) => ErrorClass::Unknown,
        }
    }

    /// Whether a delayed retry can plausibly succeed.
    /// Credential problems will not fix themselves between attempts.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            SourceError::Unauthorized(_) | SourceError::Forbidden(_) | SourceError::RateLimited(_)
        )
    }

    /// Map a non-success HTTP status to the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, truncate(body, 160))
        };
        match status.as_u16() {
            401 => SourceError::Unauthorized(detail),
            403 => SourceError::Forbidden(detail),
            429 => SourceError::RateLimited(detail),
            _ => SourceError::Http(detail),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::ConnectionTimeout(Duration::ZERO)
        } else if let Some(status) = e.status() {
            SourceError::from_status(status, "")
        } else if e.is_decode() {
            SourceError::MalformedPayload(e.to_string())
        } else {
            SourceError::Http(e.to_string())
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
