//! Upstream error taxonomy and response classification.
//!
//! The forwarder's retry policy is driven entirely by these variants:
//! `TokenExpired` triggers one forced token refresh, `RateLimited` triggers
//! one model fallback, everything else is terminal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rejected the API token: {message}")]
    TokenExpired { message: String },

    #[error("upstream rate limit: {message}")]
    RateLimited {
        /// Seconds from the `Retry-After` header, when the upstream sent one.
        retry_after: Option<u64>,
        message: String,
    },

    #[error("upstream returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid upstream response: {0}")]
    Decode(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// Body substrings that mark an HTTP 500 as a leaked credential failure.
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "timeout",
    "expired",
    "unauthorized",
    "authentication",
    "invalid token",
    "token expired",
    "access denied",
    "forbidden",
    "credential",
];

/// Body substrings that mark an HTTP 500 as a disguised rate limit.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "quota exceeded",
    "too many requests",
    "429",
    "throttled",
    "usage limit",
];

/// Classify a non-success upstream response.
///
/// 401 and 429 are unambiguous. Some deployments leak token expiry and
/// throttling as 500s, so their bodies are sniffed for known markers,
/// credential markers first.
pub fn classify_response(status: u16, retry_after: Option<u64>, body: &str) -> UpstreamError {
    match status {
        401 => UpstreamError::TokenExpired {
            message: body.to_string(),
        },
        429 => UpstreamError::RateLimited {
            retry_after,
            message: body.to_string(),
        },
        500 => {
            let lowered = body.to_lowercase();
            if AUTH_FAILURE_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
            {
                return UpstreamError::TokenExpired {
                    message: body.to_string(),
                };
            }
            if RATE_LIMIT_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
            {
                return UpstreamError::RateLimited {
                    retry_after,
                    message: body.to_string(),
                };
            }
            UpstreamError::Api {
                status,
                message: body.to_string(),
            }
        }
        _ => UpstreamError::Api {
            status,
            message: body.to_string(),
        },
    }
}
