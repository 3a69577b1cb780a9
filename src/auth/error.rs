//! Auth error types

use thiserror::Error;

use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Device authorization ended without a usable token.
    #[error("device authorization failed: {0}")]
    DeviceFlow(String),

    /// The device code expired or the polling budget ran out.
    #[error("device authorization timed out")]
    DeviceFlowTimeout,

    /// The user rejected the authorization request.
    #[error("device authorization denied by user")]
    AccessDenied,

    #[error("credential store: {0}")]
    Store(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Token exchange against the Copilot backend failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub type Result<T> = std::result::Result<T, AuthError>;
