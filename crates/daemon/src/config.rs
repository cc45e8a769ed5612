//! Configuration loading and validation
//!
//! The YAML document is layered with `ESCALATION__*` environment overrides,
//! then every string of the exact form `${NAME}` is replaced by the value of
//! the environment variable `NAME`. Validation failures are fatal.

use crate::logging::LoggingConfig;
use alerting::{AlertingConfig, EscalationPolicy};
use audit_log::AuditConfig;
use config::{Config, Environment, File, FileFormat};
use monitor_scheduler::SchedulerConfig;
use monitors::MonitorsConfig;
use notifiers::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Sections every configuration must define
pub const REQUIRED_SECTIONS: [&str; 4] = ["monitors", "alerting", "escalation", "audit"];

const ENV_PREFIX: &str = "ESCALATION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required configuration section: {0}")]
    MissingSection(&'static str),

    #[error("At least one monitor must be enabled")]
    NoEnabledMonitors,

    #[error("At least one alert channel must be enabled")]
    NoEnabledChannels,

    #[error("Missing escalation configuration for severity: {0}")]
    MissingEscalation(Severity),

    #[error("Monitor {0} must have a positive interval")]
    InvalidInterval(&'static str),
}

/// `metrics` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address of the Prometheus scrape endpoint; no exporter when absent
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
}

/// The whole configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub monitors: MonitorsConfig,
    pub alerting: AlertingConfig,
    pub escalation: EscalationPolicy,
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// `${NAME}` references whose variable was not set
    #[serde(skip)]
    pub unresolved_env: Vec<String>,
}

impl Settings {
    /// Load, expand and validate the YAML file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(File::from(path).format(FileFormat::Yaml));
        Self::build(builder)
    }

    /// Same as [`load`](Self::load), from an in-memory document
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(File::from_str(document, FileFormat::Yaml));
        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let raw: Value = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        let mut unresolved = Vec::new();
        let expanded = expand_env(raw, &mut unresolved);

        for section in REQUIRED_SECTIONS {
            if expanded.get(section).map_or(true, Value::is_null) {
                return Err(ConfigError::MissingSection(section));
            }
        }

        let mut settings: Settings = serde_json::from_value(expanded)?;
        settings.unresolved_env = unresolved;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the engine cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitors.enabled_monitors().is_empty() {
            return Err(ConfigError::NoEnabledMonitors);
        }
        if self.alerting.enabled_channels().is_empty() {
            return Err(ConfigError::NoEnabledChannels);
        }
        for severity in Severity::ALL {
            if !self.escalation.contains_key(&severity) {
                return Err(ConfigError::MissingEscalation(severity));
            }
        }

        if let Some(prom) = self.monitors.prometheus.as_ref().filter(|c| c.enabled) {
            if prom.scrape_interval == 0 || prom.query_window == 0 {
                return Err(ConfigError::InvalidInterval("prometheus"));
            }
        }
        if let Some(es) = self.monitors.elasticsearch.as_ref().filter(|c| c.enabled) {
            if es.search_interval == 0 {
                return Err(ConfigError::InvalidInterval("elasticsearch"));
            }
        }
        Ok(())
    }
}

/// Replace `${NAME}` strings by the environment value; unset names become null
fn expand_env(value: Value, unresolved: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => match env_reference(&s) {
            Some(name) => match std::env::var(name) {
                Ok(resolved) => Value::String(resolved),
                Err(_) => {
                    unresolved.push(name.to_string());
                    Value::Null
                }
            },
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| expand_env(item, unresolved))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, expand_env(item, unresolved)))
                .collect(),
        ),
        other => other,
    }
}

fn env_reference(s: &str) -> Option<&str> {
    s.strip_prefix("${")?
        .strip_suffix('}')
        .filter(|name| !name.is_empty())
}
