//! Log-pattern monitor

use crate::source::{LogEntry, LogSource, TimeWindow};
use crate::{Monitor, PatternRule};
use alerting::{AlertManager, Finding};
use async_trait::async_trait;
use audit_log::AuditLog;
use indexmap::IndexMap;
use notifiers::Severity;
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const MONITOR_NAME: &str = "elasticsearch";

/// Sample lines quoted in a pattern alert
pub const MAX_SAMPLES: usize = 5;

/// Build the alert for all matches of one `(pattern, severity)` group.
/// No matches, no finding.
pub fn summarize_matches(
    pattern: &str,
    severity: Severity,
    matches: &[LogEntry],
    interval: Duration,
) -> Option<Finding> {
    if matches.is_empty() {
        return None;
    }

    let mut message = format!(
        "Found {} matching log entries in the last interval.\n\nSample messages:\n",
        matches.len()
    );
    for entry in matches.iter().take(MAX_SAMPLES) {
        let _ = writeln!(message, "- {}: {}", entry.timestamp, entry.message);
    }

    let indices: BTreeSet<&str> = matches.iter().map(|m| m.index.as_str()).collect();

    Some(
        Finding::new(
            MONITOR_NAME,
            format!("Log Pattern Detected: {}", pattern),
            message,
            severity,
        )
        .with_metadata("pattern", pattern)
        .with_metadata("match_count", matches.len())
        .with_metadata("indices", indices.into_iter().collect::<Vec<_>>().join(", "))
        .with_metadata("time_range", format!("Last {} seconds", interval.as_secs())),
    )
}

/// Alerts on log entries matching configured patterns
pub struct LogPatternMonitor {
    source: Arc<dyn LogSource>,
    indices: Vec<String>,
    rules: Vec<PatternRule>,
    interval: Duration,
    alerts: Arc<AlertManager>,
    audit: Arc<AuditLog>,
}

impl LogPatternMonitor {
    pub fn new(
        source: Arc<dyn LogSource>,
        indices: Vec<String>,
        rules: Vec<PatternRule>,
        interval: Duration,
        alerts: Arc<AlertManager>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            source,
            indices,
            rules,
            interval,
            alerts,
            audit,
        }
    }
}

#[async_trait]
impl Monitor for LogPatternMonitor {
    fn name(&self) -> &str {
        MONITOR_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn check(&self) {
        let window = TimeWindow::last(self.interval);
        let mut groups: IndexMap<(&str, Severity), Vec<LogEntry>> = IndexMap::new();

        for rule in &self.rules {
            debug!("Checking pattern: {} (severity: {})", rule.pattern, rule.severity);
            match self.source.search(&rule.pattern, &window, &self.indices).await {
                Ok(entries) => {
                    if !entries.is_empty() {
                        info!("Found {} matches for pattern: {}", entries.len(), rule.pattern);
                    }
                    groups
                        .entry((rule.pattern.as_str(), rule.severity))
                        .or_default()
                        .extend(entries);
                }
                Err(e) => {
                    error!("Error searching logs for pattern {}: {}", rule.pattern, e);
                    metrics::counter!("escalation_query_failures_total", "monitor" => MONITOR_NAME)
                        .increment(1);
                    self.audit.log_error(
                        "elasticsearch_monitor",
                        &format!("Log search failed for pattern: {}", rule.pattern),
                        json!({ "error": e.to_string() }),
                    );
                }
            }
        }

        let mut matches_found = 0usize;
        for ((pattern, severity), entries) in &groups {
            matches_found += entries.len();
            if let Some(finding) = summarize_matches(pattern, *severity, entries, self.interval) {
                info!("Sending alert for pattern '{}' with severity '{}'", pattern, severity);
                self.alerts.dispatch(&finding).await;
            }
        }

        metrics::counter!("escalation_monitor_checks_total", "monitor" => MONITOR_NAME).increment(1);
        self.audit.log_monitor_check(
            MONITOR_NAME,
            json!({
                "patterns_checked": self.rules.len(),
                "matches_found": matches_found,
            }),
            matches_found > 0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryError;
    use alerting::{EscalationPolicy, EscalationRouter, EscalationRule, NotifierRegistry};
    use audit_log::{AuditEventType, MemorySink};
    use notifiers::MockNotifier;
    use serde_json::Map;

    fn entry(index: &str, n: usize) -> LogEntry {
        LogEntry {
            timestamp: format!("2024-01-01T00:00:{:02}Z", n),
            message: format!("ERROR request {} failed", n),
            index: index.to_string(),
            fields: Map::new(),
        }
    }

    /// Returns canned entries per pattern; unknown patterns fail
    struct CannedSource {
        entries: Vec<(&'static str, Vec<LogEntry>)>,
    }

    #[async_trait]
    impl LogSource for CannedSource {
        async fn search(
            &self,
            pattern: &str,
            _window: &TimeWindow,
            _indices: &[String],
        ) -> Result<Vec<LogEntry>, QueryError> {
            self.entries
                .iter()
                .find(|(p, _)| *p == pattern)
                .map(|(_, entries)| entries.clone())
                .ok_or_else(|| QueryError::Status {
                    status: 500,
                    body: "search failed".to_string(),
                })
        }
    }

    fn monitor(
        entries: Vec<(&'static str, Vec<LogEntry>)>,
        rules: Vec<PatternRule>,
    ) -> (LogPatternMonitor, Arc<MockNotifier>, Arc<MemorySink>) {
        let slack = Arc::new(MockNotifier::succeeding("slack"));
        let mut policy = EscalationPolicy::new();
        policy.insert(Severity::High, EscalationRule::new(["slack"]));
        policy.insert(Severity::Critical, EscalationRule::new(["slack"]));
        let (audit, sink) = AuditLog::in_memory();
        let audit = Arc::new(audit);
        let alerts = Arc::new(AlertManager::new(
            NotifierRegistry::new().with(slack.clone()),
            EscalationRouter::new(policy),
            audit.clone(),
        ));
        let monitor = LogPatternMonitor::new(
            Arc::new(CannedSource { entries }),
            vec!["app-logs".to_string(), "sys-logs".to_string()],
            rules,
            Duration::from_secs(300),
            alerts,
            audit,
        );
        (monitor, slack, sink)
    }

    fn rule(pattern: &str, severity: Severity) -> PatternRule {
        PatternRule {
            pattern: pattern.to_string(),
            severity,
        }
    }

    #[test]
    fn test_summary_lists_five_samples() {
        let matches: Vec<LogEntry> = (0..7)
            .map(|n| entry(if n % 2 == 0 { "app-logs" } else { "sys-logs" }, n))
            .collect();

        let finding =
            summarize_matches("ERROR", Severity::High, &matches, Duration::from_secs(300)).unwrap();

        assert_eq!(finding.title, "Log Pattern Detected: ERROR");
        assert_eq!(finding.severity, Severity::High);
        let samples = finding.message.lines().filter(|l| l.starts_with("- ")).count();
        assert_eq!(samples, MAX_SAMPLES);
        assert!(finding
            .message
            .starts_with("Found 7 matching log entries in the last interval.\n\nSample messages:\n"));
        assert!(finding.message.contains("- 2024-01-01T00:00:00Z: ERROR request 0 failed\n"));
        assert_eq!(finding.metadata["match_count"], "7");
        assert_eq!(finding.metadata["indices"], "app-logs, sys-logs");
        assert_eq!(finding.metadata["time_range"], "Last 300 seconds");
    }

    #[test]
    fn test_no_matches_no_finding() {
        assert!(summarize_matches("ERROR", Severity::High, &[], Duration::from_secs(60)).is_none());
    }

    #[tokio::test]
    async fn test_check_alerts_once_per_group() {
        let errors: Vec<LogEntry> = (0..7).map(|n| entry("app-logs", n)).collect();
        let (monitor, slack, sink) = monitor(
            vec![("ERROR", errors), ("OutOfMemory", vec![])],
            vec![rule("ERROR", Severity::High), rule("OutOfMemory", Severity::Critical)],
        );

        monitor.check().await;

        let calls = slack.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].metadata["match_count"], "7");
        assert_eq!(calls[0].metadata["indices"], "app-logs");

        let check = sink.records().into_iter().last().unwrap();
        assert_eq!(check.event_type, AuditEventType::MonitorCheck);
        assert_eq!(check.details["metrics"]["patterns_checked"], 2);
        assert_eq!(check.details["metrics"]["matches_found"], 7);
        assert_eq!(check.details["issues_found"], true);
    }

    #[tokio::test]
    async fn test_duplicate_rules_share_a_group() {
        let (monitor, slack, _) = monitor(
            vec![("ERROR", vec![entry("app-logs", 1)])],
            vec![rule("ERROR", Severity::High), rule("ERROR", Severity::High)],
        );

        monitor.check().await;

        let calls = slack.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].metadata["match_count"], "2");
    }

    #[tokio::test]
    async fn test_search_failure_is_audited_and_contained() {
        let (monitor, slack, sink) = monitor(
            vec![("ERROR", vec![entry("app-logs", 1)])],
            vec![rule("Timeout", Severity::High), rule("ERROR", Severity::High)],
        );

        monitor.check().await;

        assert_eq!(slack.calls().len(), 1);
        let records = sink.records();
        assert_eq!(records[0].event_type, AuditEventType::Error);
        assert_eq!(
            records[0].details["error_message"],
            "Log search failed for pattern: Timeout"
        );
        assert_eq!(records.last().unwrap().event_type, AuditEventType::MonitorCheck);
    }
}
