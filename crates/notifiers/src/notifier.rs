//! Notifier Capability Interfaces

use crate::{Metadata, NotifierError, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one delivery attempt on one channel. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResult {
    pub channel: String,
    pub success: bool,
    /// Provider payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationResult {
    /// Successful delivery
    pub fn sent(channel: impl Into<String>, response: Value) -> Self {
        Self {
            channel: channel.into(),
            success: true,
            response: Some(response),
            error: None,
        }
    }

    /// Failed delivery
    pub fn failed(channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }
}

/// A channel-specific delivery adapter.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel identifier as referenced by escalation policies
    fn channel(&self) -> &str;

    /// Deliver one formatted notification. Must not fail past its own
    /// boundary: auth, network, payload and rate-limit failures are returned
    /// as a failed [`NotificationResult`]. No retries.
    async fn send(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> NotificationResult;

    /// Incident lifecycle extension, if this channel supports it
    fn as_incident_tracker(&self) -> Option<&dyn IncidentTracker> {
        None
    }
}

/// Opaque reference to an incident owned by the ticketing provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentHandle {
    /// Provider-side key, e.g. `OPS-42`
    pub key: String,
    /// Provider-side numeric or opaque id
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Acknowledgement of an incident update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentAck {
    pub key: String,
    pub status: String,
    pub commented: bool,
}

/// Incident lifecycle operations, only offered by ticketing channels.
#[async_trait]
pub trait IncidentTracker: Send + Sync {
    async fn create_incident(
        &self,
        title: &str,
        description: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> Result<IncidentHandle, NotifierError>;

    async fn update_incident(
        &self,
        incident: &str,
        status: &str,
        comment: Option<&str>,
        metadata: &Metadata,
    ) -> Result<IncidentAck, NotifierError>;
}
