//! Monitor construction from configuration

use crate::{
    ElasticsearchClient, ElasticsearchConfig, LogPatternMonitor, MetricThresholdMonitor, Monitor,
    PrometheusClient, PrometheusConfig, QueryError,
};
use alerting::AlertManager;
use audit_log::AuditLog;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// `monitors` section of the configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorsConfig {
    #[serde(default)]
    pub prometheus: Option<PrometheusConfig>,
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchConfig>,
}

impl MonitorsConfig {
    pub fn enabled_monitors(&self) -> Vec<&'static str> {
        let mut enabled = Vec::new();
        if self.prometheus.as_ref().is_some_and(|c| c.enabled) {
            enabled.push("prometheus");
        }
        if self.elasticsearch.as_ref().is_some_and(|c| c.enabled) {
            enabled.push("elasticsearch");
        }
        enabled
    }
}

/// Build every enabled monitor. A source that fails its connection check is
/// logged, audited and left out.
pub async fn build_monitors(
    config: &MonitorsConfig,
    alerts: Arc<AlertManager>,
    audit: Arc<AuditLog>,
) -> Vec<Arc<dyn Monitor>> {
    let mut results: Vec<(&str, Result<Arc<dyn Monitor>, QueryError>)> = Vec::new();

    if let Some(prom) = config.prometheus.as_ref().filter(|c| c.enabled) {
        let result = PrometheusClient::from_env(prom).map(|client| {
            Arc::new(MetricThresholdMonitor::new(
                Arc::new(client),
                prom.metrics.clone(),
                Duration::from_secs(prom.scrape_interval),
                Duration::from_secs(prom.query_window),
                alerts.clone(),
                audit.clone(),
            )) as Arc<dyn Monitor>
        });
        results.push(("prometheus", result));
    }

    if let Some(es) = config.elasticsearch.as_ref().filter(|c| c.enabled) {
        let result = ElasticsearchClient::from_env(es).await.map(|client| {
            Arc::new(LogPatternMonitor::new(
                Arc::new(client),
                es.indices.clone(),
                es.patterns.clone(),
                Duration::from_secs(es.search_interval),
                alerts.clone(),
                audit.clone(),
            )) as Arc<dyn Monitor>
        });
        results.push(("elasticsearch", result));
    }

    results
        .into_iter()
        .filter_map(|(name, result)| match result {
            Ok(monitor) => {
                info!("{} monitor initialized (interval {:?})", name, monitor.interval());
                Some(monitor)
            }
            Err(e) => {
                let message = format!("Failed to initialize {} monitor: {}", name, e);
                error!("{}", message);
                audit.log_error("monitor_setup", &message, json!({ "monitor": name }));
                None
            }
        })
        .collect()
}
