//! Audit Log Implementation

use crate::sink::{AuditSink, FileSink, MemorySink};
use crate::AuditError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether events are recorded at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// JSON-lines output file
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Retention hint for external rotation (days); not enforced here
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/audit.log")
}

fn default_retention_days() -> u32 {
    90
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            log_file: default_log_file(),
            retention_days: default_retention_days(),
        }
    }
}

/// Kind of audited event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    MonitorCheck,
    AlertSent,
    Error,
    SystemEvent,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::MonitorCheck => "monitor_check",
            AuditEventType::AlertSent => "alert_sent",
            AuditEventType::Error => "error",
            AuditEventType::SystemEvent => "system_event",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of the audit entry itself (not of the alert it describes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

/// One immutable audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: AuditLevel,
    pub details: Value,
}

/// Append-only audit trail shared by the alert manager and monitors
pub struct AuditLog {
    enabled: bool,
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    /// Open a file-backed audit log as described by `config`
    pub fn open(config: &AuditConfig) -> Result<Self, AuditError> {
        if !config.enabled {
            info!("Audit logging disabled");
            return Ok(Self::disabled());
        }

        let sink = FileSink::open(&config.log_file)?;
        info!(
            "Audit logging enabled. Writing to {} (retention {} days)",
            config.log_file.display(),
            config.retention_days
        );
        Ok(Self::with_sink(Arc::new(sink)))
    }

    /// Audit log writing into an arbitrary sink
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            enabled: true,
            sink,
        }
    }

    /// Audit log backed by memory; the sink handle is returned for inspection
    pub fn in_memory() -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Self::with_sink(sink.clone()), sink)
    }

    /// Audit log that drops every event
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sink: Arc::new(MemorySink::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record one event. Write failures are reported to the diagnostic
    /// stream only; callers never observe them.
    pub fn log_event(&self, event_type: AuditEventType, severity: AuditLevel, details: Value) {
        if !self.enabled {
            return;
        }

        let record = AuditRecord {
            timestamp: Utc::now(),
            event_type,
            severity,
            details,
        };

        let result = serde_json::to_string(&record)
            .map_err(AuditError::from)
            .and_then(|line| self.sink.append(&line));

        if let Err(e) = result {
            error!(event_type = %event_type, "Failed to write audit log: {}", e);
        }
    }

    /// Record the outcome of one monitor check
    pub fn log_monitor_check(&self, monitor: &str, metrics: Value, issues_found: bool) {
        self.log_event(
            AuditEventType::MonitorCheck,
            AuditLevel::Info,
            json!({
                "monitor": monitor,
                "metrics": metrics,
                "issues_found": issues_found,
            }),
        );
    }

    /// Record one per-channel delivery attempt
    pub fn log_alert_sent(
        &self,
        channel: &str,
        title: &str,
        alert_severity: &str,
        success: bool,
        error: Option<&str>,
    ) {
        let mut details = json!({
            "channel": channel,
            "title": title,
            "alert_severity": alert_severity,
            "success": success,
        });
        if let Some(error) = error {
            details["error"] = json!(error);
        }

        let level = if success {
            AuditLevel::Warning
        } else {
            AuditLevel::Error
        };
        self.log_event(AuditEventType::AlertSent, level, details);
    }

    /// Record a non-fatal failure in `component`
    pub fn log_error(&self, component: &str, error_message: &str, details: Value) {
        self.log_event(
            AuditEventType::Error,
            AuditLevel::Error,
            json!({
                "component": component,
                "error_message": error_message,
                "details": details,
            }),
        );
    }

    /// Record a lifecycle or incident event
    pub fn log_system_event(&self, event_name: &str, details: Value) {
        self.log_event(
            AuditEventType::SystemEvent,
            AuditLevel::Info,
            json!({
                "event_name": event_name,
                "details": details,
            }),
        );
    }
}
