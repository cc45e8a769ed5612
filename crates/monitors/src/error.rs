//! Query Error Types

use thiserror::Error;

/// Failure talking to a telemetry source
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Query failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Query returned error status: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No configured host answered the liveness ping
    #[error("Could not connect to {0}")]
    Unavailable(String),

    #[error("Invalid source configuration: {0}")]
    InvalidConfig(String),
}
