//! Telemetry source boundary

use crate::QueryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Closed time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `length` leading up to now
    pub fn last(length: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - chrono::Duration::seconds(length.as_secs() as i64),
            end,
        }
    }

    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// One observation of a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// One matching log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Raw `@timestamp` as stored by the log source
    pub timestamp: String,
    pub message: String,
    /// Index target the entry came from
    pub index: String,
    /// Every other field of the document
    pub fields: Map<String, Value>,
}

/// Time-windowed metric queries
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// All samples of every series of `metric` within `window`
    async fn query(&self, metric: &str, window: &TimeWindow) -> Result<Vec<Sample>, QueryError>;
}

/// Pattern search over log indices
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Entries matching `pattern` within `window` across `indices`
    async fn search(
        &self,
        pattern: &str,
        window: &TimeWindow,
        indices: &[String],
    ) -> Result<Vec<LogEntry>, QueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_length() {
        let window = TimeWindow::last(Duration::from_secs(300));
        assert_eq!(window.seconds(), 300);
        assert!(window.start < window.end);
    }
}
