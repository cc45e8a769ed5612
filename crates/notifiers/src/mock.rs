//! In-process notifier for tests and dry runs

use crate::notifier::{IncidentAck, IncidentHandle, IncidentTracker, NotificationResult, Notifier};
use crate::{Metadata, NotifierError, Severity};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// How a [`MockNotifier`] answers `send`
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed,
    Fail(String),
    /// Panics inside `send`
    Panic,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub metadata: Metadata,
}

/// Records every notification it is asked to deliver
pub struct MockNotifier {
    channel: String,
    behavior: MockBehavior,
    incidents: bool,
    next_id: AtomicU64,
    calls: Mutex<Vec<SentNotification>>,
}

impl MockNotifier {
    pub fn new(channel: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            channel: channel.into(),
            behavior,
            incidents: false,
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(channel: impl Into<String>) -> Self {
        Self::new(channel, MockBehavior::Succeed)
    }

    pub fn failing(channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(channel, MockBehavior::Fail(error.into()))
    }

    pub fn panicking(channel: impl Into<String>) -> Self {
        Self::new(channel, MockBehavior::Panic)
    }

    /// Also act as an incident tracker
    pub fn with_incidents(mut self) -> Self {
        self.incidents = true;
        self
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<SentNotification> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, title: &str, message: &str, severity: Severity, metadata: &Metadata) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(SentNotification {
                title: title.to_string(),
                message: message.to_string(),
                severity,
                metadata: metadata.clone(),
            });
        }
    }

    fn key(&self) -> String {
        format!("MOCK-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn send(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> NotificationResult {
        self.record(title, message, severity, metadata);
        match &self.behavior {
            MockBehavior::Succeed => {
                NotificationResult::sent(&self.channel, json!({ "delivered": title }))
            }
            MockBehavior::Fail(error) => NotificationResult::failed(&self.channel, error.clone()),
            MockBehavior::Panic => panic!("mock notifier '{}' panicked", self.channel),
        }
    }

    fn as_incident_tracker(&self) -> Option<&dyn IncidentTracker> {
        if self.incidents {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl IncidentTracker for MockNotifier {
    async fn create_incident(
        &self,
        title: &str,
        description: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> Result<IncidentHandle, NotifierError> {
        self.record(title, description, severity, metadata);
        if let MockBehavior::Fail(error) = &self.behavior {
            return Err(NotifierError::InvalidConfig(error.clone()));
        }
        let key = self.key();
        Ok(IncidentHandle {
            id: key.trim_start_matches("MOCK-").to_string(),
            key,
            url: None,
        })
    }

    async fn update_incident(
        &self,
        incident: &str,
        status: &str,
        comment: Option<&str>,
        _metadata: &Metadata,
    ) -> Result<IncidentAck, NotifierError> {
        if let MockBehavior::Fail(error) = &self.behavior {
            return Err(NotifierError::InvalidConfig(error.clone()));
        }
        Ok(IncidentAck {
            key: incident.to_string(),
            status: status.to_string(),
            commented: comment.is_some(),
        })
    }
}
