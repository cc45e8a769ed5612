//! Alerting Error Types

use notifiers::{NotifierError, ParseSeverityError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    /// Severity outside `critical`, `high`, `warning`
    #[error(transparent)]
    InvalidSeverity(#[from] ParseSeverityError),

    /// A channel's `send` panicked or was aborted
    #[error("Channel {channel} failed unexpectedly: {message}")]
    ChannelPanicked { channel: String, message: String },

    /// No registered channel offers incident tracking
    #[error("not configured")]
    NotConfigured,

    /// Ticketing provider rejected an incident operation
    #[error(transparent)]
    Incident(#[from] NotifierError),
}
