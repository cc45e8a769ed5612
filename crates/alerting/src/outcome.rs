//! Dispatch results

use crate::AlertError;
use notifiers::NotificationResult;
use serde::Serialize;
use serde_json::Value;

/// Per-channel results of one alert, in escalation order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DispatchOutcome {
    results: Vec<NotificationResult>,
}

impl DispatchOutcome {
    pub(crate) fn push(&mut self, result: NotificationResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[NotificationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<NotificationResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Channels attempted, in order
    pub fn channels(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.channel.as_str()).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

impl IntoIterator for DispatchOutcome {
    type Item = NotificationResult;
    type IntoIter = std::vec::IntoIter<NotificationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Structured result of an incident create or update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IncidentOutcome {
    pub fn succeeded(response: Value) -> Self {
        Self {
            success: true,
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(error: &AlertError) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.to_string()),
        }
    }
}
