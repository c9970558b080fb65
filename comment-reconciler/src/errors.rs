//! Crate-wide error hierarchy for comment-reconciler.
//!
//! The decision layer (indexing, resolving, grouping, reconciling, summary)
//! never fails for recoverable conditions; those are data. Errors here cover
//! invalid inputs, configuration, and the platform boundary.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type MrResult<T> = Result<T, Error>;

/// Root error type for the comment-reconciler crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Platform (GitHub/GitLab) related failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration problems (bad/missing tokens, danger id, policy, etc.).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input validation errors (half-located findings, bad ids, etc.).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Detailed provider-specific error used inside the platform layer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429), with the `Retry-After` delay when the
    /// platform sent one in seconds.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Gateway/Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (4xx/3xx) not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing provider token")]
    MissingToken,

    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid danger id: {0:?}")]
    InvalidDangerId(String),

    #[error("invalid dismiss policy: {0}")]
    InvalidDismissPolicy(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(ProviderError::from(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Provider(ProviderError::Serde(e))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if let Some(status) = e.status() {
            return ProviderError::from_status(status.as_u16());
        }
        ProviderError::Network(e.to_string())
    }
}

impl ProviderError {
    /// Maps a non-success HTTP status code to the matching variant.
    pub fn from_status(code: u16) -> Self {
        Self::from_status_with_retry(code, None)
    }

    /// Like [`from_status`](Self::from_status), carrying the parsed
    /// `Retry-After` value into `RateLimited`.
    pub fn from_status_with_retry(code: u16, retry_after_secs: Option<u64>) -> Self {
        match code {
            401 => ProviderError::Unauthorized,
            403 => ProviderError::Forbidden,
            404 => ProviderError::NotFound,
            429 => ProviderError::RateLimited { retry_after_secs },
            500..=599 => ProviderError::Server(code),
            _ => ProviderError::HttpStatus(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            ProviderError::from_status(401),
            ProviderError::Unauthorized
        ));
        assert!(matches!(
            ProviderError::from_status(429),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            ProviderError::from_status_with_retry(429, Some(30)),
            ProviderError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
        assert!(matches!(
            ProviderError::from_status(502),
            ProviderError::Server(502)
        ));
        assert!(matches!(
            ProviderError::from_status(422),
            ProviderError::HttpStatus(422)
        ));
    }
}
