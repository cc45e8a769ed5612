//! Alert Manager Implementation

use crate::{
    AlertError, AlertingConfig, DispatchOutcome, EscalationPolicy, EscalationRouter, Finding,
    IncidentOutcome, NotifierRegistry,
};
use audit_log::AuditLog;
use notifiers::{Metadata, NotificationResult, Notifier, Severity};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Owns the registry and the escalation policy; dispatches alerts to every
/// channel the policy names for a severity
pub struct AlertManager {
    registry: NotifierRegistry,
    router: EscalationRouter,
    audit: Arc<AuditLog>,
}

impl AlertManager {
    /// Create a new alert manager and cross-check the policy against the registry
    pub fn new(registry: NotifierRegistry, router: EscalationRouter, audit: Arc<AuditLog>) -> Self {
        info!(
            "Creating alert manager with channels: {:?}",
            registry.channels()
        );

        for channel in router.referenced_channels() {
            if !registry.contains(channel) {
                warn!(
                    channel = %channel,
                    "Escalation policy references channel '{}' but it is not configured",
                    channel
                );
            }
        }
        for severity in router.unrouted_severities() {
            warn!(severity = %severity, "No escalation rule for severity {}", severity);
        }

        Self {
            registry,
            router,
            audit,
        }
    }

    /// Construct every enabled channel and build the manager around the survivors
    pub async fn from_config(
        alerting: &AlertingConfig,
        policy: EscalationPolicy,
        audit: Arc<AuditLog>,
    ) -> Self {
        let registry = NotifierRegistry::from_config(alerting, &audit).await;
        Self::new(registry, EscalationRouter::new(policy), audit)
    }

    pub fn registry(&self) -> &NotifierRegistry {
        &self.registry
    }

    pub fn router(&self) -> &EscalationRouter {
        &self.router
    }

    /// Send an alert to every channel configured for `severity`.
    ///
    /// An unrecognised severity is rejected before any channel is tried and
    /// yields an empty outcome. Channel failures never escape; each becomes a
    /// failed result in the returned outcome.
    pub async fn send_alert(
        &self,
        title: &str,
        message: &str,
        severity: &str,
        metadata: &Metadata,
    ) -> DispatchOutcome {
        match parse_severity(severity) {
            Ok(severity) => self.deliver(title, message, severity, metadata).await,
            Err(e) => {
                error!("{}", e);
                self.audit.log_error(
                    "alert_manager",
                    &e.to_string(),
                    json!({ "title": title, "severity": severity }),
                );
                DispatchOutcome::default()
            }
        }
    }

    /// Send a monitor finding
    pub async fn dispatch(&self, finding: &Finding) -> DispatchOutcome {
        debug!(
            source = %finding.source,
            "Dispatching finding '{}' ({})",
            finding.title,
            finding.severity
        );
        self.deliver(
            &finding.title,
            &finding.message,
            finding.severity,
            &finding.metadata,
        )
        .await
    }

    async fn deliver(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let channels = self.router.channels_for(severity);
        if channels.is_empty() {
            warn!("No channels configured for severity level: {}", severity);
            return outcome;
        }

        for channel in channels {
            let Some(notifier) = self.registry.get(channel) else {
                warn!(channel = %channel, "Channel {} is not configured; skipping", channel);
                continue;
            };

            let result = send_isolated(notifier, channel, title, message, severity, metadata).await;

            let outcome_label = if result.success { "success" } else { "failure" };
            metrics::counter!(
                "escalation_notifications_total",
                "channel" => channel.clone(),
                "outcome" => outcome_label
            )
            .increment(1);

            self.audit.log_alert_sent(
                channel,
                title,
                severity.as_str(),
                result.success,
                result.error.as_deref(),
            );
            outcome.push(result);
        }

        info!(
            "Alert '{}' dispatched: {} succeeded, {} failed",
            title,
            outcome.succeeded(),
            outcome.failed()
        );
        outcome
    }

    /// Open an incident on the ticketing channel
    pub async fn create_incident(
        &self,
        title: &str,
        description: &str,
        severity: &str,
        metadata: &Metadata,
    ) -> IncidentOutcome {
        let severity = match parse_severity(severity) {
            Ok(severity) => severity,
            Err(e) => {
                error!("{}", e);
                return IncidentOutcome::failed(&e);
            }
        };

        let Some((channel, notifier)) = self.registry.incident_channel() else {
            return self.not_configured("create_incident");
        };
        let Some(tracker) = notifier.as_incident_tracker() else {
            return self.not_configured("create_incident");
        };

        match tracker
            .create_incident(title, description, severity, metadata)
            .await
        {
            Ok(handle) => {
                info!(channel = %channel, "Created incident {}", handle.key);
                self.audit.log_system_event(
                    "incident_created",
                    json!({
                        "channel": channel,
                        "incident": handle.key,
                        "title": title,
                        "severity": severity,
                    }),
                );
                IncidentOutcome::succeeded(json!(handle))
            }
            Err(e) => self.incident_failed("create_incident", channel, AlertError::from(e)),
        }
    }

    /// Update status (and optionally comment on) an existing incident
    pub async fn update_incident(
        &self,
        incident: &str,
        status: &str,
        comment: Option<&str>,
        metadata: &Metadata,
    ) -> IncidentOutcome {
        let Some((channel, notifier)) = self.registry.incident_channel() else {
            return self.not_configured("update_incident");
        };
        let Some(tracker) = notifier.as_incident_tracker() else {
            return self.not_configured("update_incident");
        };

        match tracker
            .update_incident(incident, status, comment, metadata)
            .await
        {
            Ok(ack) => {
                info!(channel = %channel, "Updated incident {} to {}", ack.key, ack.status);
                self.audit.log_system_event(
                    "incident_updated",
                    json!({
                        "channel": channel,
                        "incident": ack.key,
                        "status": ack.status,
                        "commented": ack.commented,
                    }),
                );
                IncidentOutcome::succeeded(json!(ack))
            }
            Err(e) => self.incident_failed("update_incident", channel, AlertError::from(e)),
        }
    }

    fn not_configured(&self, operation: &str) -> IncidentOutcome {
        error!("Cannot {}: incident tracking channel not configured", operation);
        IncidentOutcome::failed(&AlertError::NotConfigured)
    }

    fn incident_failed(&self, operation: &str, channel: &str, e: AlertError) -> IncidentOutcome {
        let message = format!("Failed to {}: {}", operation.replace('_', " "), e);
        error!(channel = %channel, "{}", message);
        self.audit
            .log_error("alert_manager", &message, json!({ "channel": channel }));
        IncidentOutcome::failed(&e)
    }
}

fn parse_severity(severity: &str) -> Result<Severity, AlertError> {
    Ok(severity.parse::<Severity>()?)
}

/// Run one `send` on its own task so a panicking channel cannot take the
/// dispatch loop down with it
async fn send_isolated(
    notifier: Arc<dyn Notifier>,
    channel: &str,
    title: &str,
    message: &str,
    severity: Severity,
    metadata: &Metadata,
) -> NotificationResult {
    let title = title.to_owned();
    let message = message.to_owned();
    let metadata = metadata.clone();

    let task = tokio::spawn(async move { notifier.send(&title, &message, severity, &metadata).await });

    match task.await {
        Ok(result) => result,
        Err(e) => {
            let e = AlertError::ChannelPanicked {
                channel: channel.to_string(),
                message: e.to_string(),
            };
            error!(channel = %channel, "{}", e);
            NotificationResult::failed(channel, e.to_string())
        }
    }
}
