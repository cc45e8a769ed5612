//! Detected anomalies

use chrono::{DateTime, Utc};
use notifiers::{Metadata, Severity};
use serde::Serialize;

/// One anomaly emitted by a monitor for a single check cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub metadata: Metadata,
    /// Name of the monitor that produced it
    pub source: String,
    pub detected_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            metadata: Metadata::new(),
            source: source.into(),
            detected_at: Utc::now(),
        }
    }

    /// Append a metadata entry, keeping insertion order
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_order() {
        let finding = Finding::new("prometheus", "t", "m", Severity::High)
            .with_metadata("metric", "cpu")
            .with_metadata("threshold", 90.0)
            .with_metadata("current_value", 97.5);

        let keys: Vec<_> = finding.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["metric", "threshold", "current_value"]);
        assert_eq!(finding.metadata["current_value"], "97.5");
        assert_eq!(finding.source, "prometheus");
    }
}
