//! Telemetry Monitors
//!
//! A [`Monitor`] owns a polling interval and, on every `check`, queries its
//! source, turns anomalies into findings for the alert manager and records a
//! `monitor_check` audit event. Query failures are contained per metric or
//! per pattern and never escape `check`.

mod builder;
mod elasticsearch;
mod error;
mod monitor;
mod pattern;
mod prometheus;
mod source;
mod threshold;

pub use builder::{build_monitors, MonitorsConfig};
pub use elasticsearch::{ElasticsearchClient, ElasticsearchConfig, PatternRule};
pub use error::QueryError;
pub use monitor::Monitor;
pub use pattern::{summarize_matches, LogPatternMonitor, MAX_SAMPLES};
pub use prometheus::{MetricRule, PrometheusClient, PrometheusConfig};
pub use source::{LogEntry, LogSource, MetricSource, Sample, TimeWindow};
pub use threshold::{evaluate_threshold, MetricThresholdMonitor};

/// Environment variables carrying source credentials
pub mod env {
    pub const PROM_USERNAME: &str = "PROM_USERNAME";
    pub const PROM_PASSWORD: &str = "PROM_PASSWORD";
    pub const ES_API_KEY: &str = "ES_API_KEY";
}
