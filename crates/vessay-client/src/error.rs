//! Client error types.

use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by network collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} rate limit exceeded: {body}")]
    RateLimited { service: String, body: String },

    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {source}")]
    Request {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid {service} response: {message}")]
    InvalidResponse { service: String, message: String },

    #[error("missing credential: {0} is not set")]
    MissingCredential(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Map a non-success HTTP status to an error, keeping the body text.
    pub fn from_status(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let service = service.into();
        let body = body.into();
        if status == 429 {
            Self::RateLimited { service, body }
        } else {
            Self::Http {
                service,
                status,
                body,
            }
        }
    }

    pub fn request(service: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            service: service.into(),
            source,
        }
    }

    pub fn invalid_response(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is a rate-limit signal that warrants backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(ClientError::from_status("anthropic", 429, "slow down").is_rate_limited());

        let err = ClientError::from_status("deepgram", 401, "bad key");
        assert!(!err.is_rate_limited());
        assert_eq!(err.to_string(), "deepgram returned HTTP 401: bad key");
    }

    #[test]
    fn test_parse_errors_are_not_retryable() {
        assert!(!ClientError::invalid_response("anthropic", "no content").is_rate_limited());
        assert!(!ClientError::MissingCredential("ANTHROPIC_API_KEY".into()).is_rate_limited());
    }
}
