//! Engine wiring
//!
//! Builds the audit log, the alert manager and the monitors from a validated
//! configuration, then hands the monitors to the scheduler until shutdown.

use crate::config::Settings;
use alerting::AlertManager;
use audit_log::{AuditError, AuditLog};
use metrics_exporter_prometheus::PrometheusBuilder;
use monitor_scheduler::Scheduler;
use monitors::build_monitors;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to open audit log: {0}")]
    Audit(#[from] AuditError),

    #[error("No monitor could be initialized")]
    NoMonitors,

    #[error("Failed to install metrics exporter: {0}")]
    Metrics(String),
}

/// A fully wired escalation engine
pub struct Engine {
    run_id: Uuid,
    alerts: Arc<AlertManager>,
    audit: Arc<AuditLog>,
    scheduler: Scheduler,
    monitor_names: Vec<String>,
}

impl Engine {
    /// Construct every component. Channel and monitor failures degrade the
    /// engine; only an unopenable audit log or zero monitors are fatal.
    pub async fn build(settings: &Settings) -> Result<Self, EngineError> {
        let audit = Arc::new(AuditLog::open(&settings.audit)?);

        let alerts = Arc::new(
            AlertManager::from_config(
                &settings.alerting,
                settings.escalation.clone(),
                audit.clone(),
            )
            .await,
        );
        if alerts.registry().is_empty() {
            warn!("No alert channel could be initialized; findings will only be audited");
        }

        let monitors = build_monitors(&settings.monitors, alerts.clone(), audit.clone()).await;
        if monitors.is_empty() {
            return Err(EngineError::NoMonitors);
        }

        let mut scheduler = Scheduler::new(settings.scheduler.clone(), audit.clone());
        let monitor_names = monitors.iter().map(|m| m.name().to_string()).collect();
        for monitor in monitors {
            scheduler.register(monitor);
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            alerts,
            audit,
            scheduler,
            monitor_names,
        })
    }

    pub fn alerts(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    pub fn monitor_names(&self) -> &[String] {
        &self.monitor_names
    }

    /// Run the scheduling loop until `shutdown` fires
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        info!(
            "Starting monitoring system (run {}) with monitors {:?}",
            self.run_id, self.monitor_names
        );
        self.audit.log_system_event(
            "engine_started",
            json!({
                "run_id": self.run_id.to_string(),
                "channels": self.alerts.registry().channels(),
                "monitors": self.monitor_names,
            }),
        );

        self.scheduler.run(shutdown).await;

        self.audit.log_system_event(
            "engine_stopped",
            json!({ "run_id": self.run_id.to_string() }),
        );
        info!("Monitoring system stopped");
    }
}

/// Serve Prometheus metrics on `addr`
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<(), EngineError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| EngineError::Metrics(e.to_string()))?;
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
