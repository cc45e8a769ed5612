//! Metric-threshold monitor

use crate::source::{MetricSource, Sample, TimeWindow};
use crate::{Monitor, MetricRule};
use alerting::{AlertManager, Finding};
use async_trait::async_trait;
use audit_log::AuditLog;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const MONITOR_NAME: &str = "prometheus";

/// Highest sample iff it strictly exceeds `threshold`. NaN samples are
/// ignored; an empty series never violates.
pub fn evaluate_threshold(samples: &[Sample], threshold: f64) -> Option<Sample> {
    samples
        .iter()
        .filter(|s| !s.value.is_nan())
        .max_by(|a, b| a.value.total_cmp(&b.value))
        .filter(|max| max.value > threshold)
        .copied()
}

/// Alerts when a metric's maximum over the query window crosses its threshold
pub struct MetricThresholdMonitor {
    source: Arc<dyn MetricSource>,
    rules: Vec<MetricRule>,
    interval: Duration,
    window: Duration,
    alerts: Arc<AlertManager>,
    audit: Arc<AuditLog>,
}

impl MetricThresholdMonitor {
    pub fn new(
        source: Arc<dyn MetricSource>,
        rules: Vec<MetricRule>,
        interval: Duration,
        window: Duration,
        alerts: Arc<AlertManager>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            source,
            rules,
            interval,
            window,
            alerts,
            audit,
        }
    }

    fn finding(rule: &MetricRule, violation: &Sample) -> Finding {
        Finding::new(
            MONITOR_NAME,
            format!("Metric Threshold Violation: {}", rule.name),
            format!(
                "Metric {} exceeded threshold of {}. Current value: {}",
                rule.name, rule.threshold, violation.value
            ),
            rule.severity,
        )
        .with_metadata("metric", &rule.name)
        .with_metadata("threshold", rule.threshold)
        .with_metadata("current_value", violation.value)
        .with_metadata("timestamp", violation.timestamp.to_rfc3339())
    }
}

#[async_trait]
impl Monitor for MetricThresholdMonitor {
    fn name(&self) -> &str {
        MONITOR_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn check(&self) {
        let window = TimeWindow::last(self.window);
        let mut violations = 0usize;

        for rule in &self.rules {
            let samples = match self.source.query(&rule.name, &window).await {
                Ok(samples) => samples,
                Err(e) => {
                    error!("Error checking metric {}: {}", rule.name, e);
                    metrics::counter!("escalation_query_failures_total", "monitor" => MONITOR_NAME)
                        .increment(1);
                    self.audit.log_error(
                        "prometheus_monitor",
                        &format!("Failed to check metric {}", rule.name),
                        json!({ "error": e.to_string() }),
                    );
                    continue;
                }
            };

            let Some(violation) = evaluate_threshold(&samples, rule.threshold) else {
                debug!("Metric {} within threshold {}", rule.name, rule.threshold);
                continue;
            };

            violations += 1;
            info!(
                "Metric {} exceeded threshold {} (value {})",
                rule.name, rule.threshold, violation.value
            );
            self.alerts.dispatch(&Self::finding(rule, &violation)).await;
        }

        metrics::counter!("escalation_monitor_checks_total", "monitor" => MONITOR_NAME).increment(1);
        self.audit.log_monitor_check(
            MONITOR_NAME,
            json!({
                "metrics_checked": self.rules.len(),
                "violations_found": violations,
            }),
            violations > 0,
        );
    }
}
