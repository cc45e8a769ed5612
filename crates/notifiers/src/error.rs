//! Notifier Error Types

use thiserror::Error;

/// Errors raised while constructing a channel or talking to its provider
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Required credential absent from the environment
    #[error("{0} not configured")]
    MissingCredential(&'static str),

    /// Channel configuration is unusable
    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// Construction-time liveness check did not pass
    #[error("Liveness check failed: {0}")]
    LivenessCheckFailed(String),

    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with an error
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Provider throttled the request
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// SMTP transport failure
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Invalid mailbox address
    #[error("Invalid e-mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// E-mail message could not be assembled
    #[error("Failed to build e-mail: {0}")]
    Message(#[from] lettre::error::Error),

    /// Unexpected response body
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Incident reference that cannot be used in a provider URL
    #[error("Invalid incident key: '{0}'")]
    InvalidIncidentKey(String),

    /// Requested resource does not exist on the provider side
    #[error("Not found: {0}")]
    NotFound(String),
}
