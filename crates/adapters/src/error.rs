use std::io;
use std::path::Path;

use blog_core::{ImageError, LanguageModelError, SearchError};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("io error at `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("prediction {id} did not finish within {waited_secs}s")]
    PredictionTimeout { id: String, waited_secs: u64 },
    #[error("operation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: Box<AdapterError>,
    },
    #[error("API returned an empty response")]
    EmptyResponse,
}

impl AdapterError {
    pub fn retry_exhausted(attempts: usize, source: AdapterError) -> Self {
        AdapterError::RetryExhausted {
            attempts,
            source: Box::new(source),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        AdapterError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Transport failures, rate limiting and server errors may succeed on a
    /// second attempt. Everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Http(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.status().map(is_retryable_status).unwrap_or(false)
            }
            AdapterError::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl From<AdapterError> for LanguageModelError {
    fn from(err: AdapterError) -> Self {
        LanguageModelError::new(err)
    }
}

impl From<AdapterError> for ImageError {
    fn from(err: AdapterError) -> Self {
        ImageError::provider(err)
    }
}

impl From<AdapterError> for SearchError {
    fn from(err: AdapterError) -> Self {
        SearchError::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limits_and_server_errors_are_retryable() {
        let status = |code: u16| AdapterError::HttpStatus {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!AdapterError::EmptyResponse.is_retryable());
        assert!(!AdapterError::InvalidConfig("x".into()).is_retryable());
    }
}
