//! Notifier Registry
//!
//! Built once at startup by folding over fallible channel constructors.
//! Failed constructions are logged and audited, then dropped; the registry
//! only ever holds channels that passed their liveness check.

use audit_log::AuditLog;
use notifiers::{
    channel, env, EmailConfig, EmailNotifier, JiraConfig, JiraNotifier, Notifier, NotifierError,
    SlackConfig, SlackNotifier,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Channel section of the configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertingConfig {
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub jira: Option<JiraConfig>,
}

impl AlertingConfig {
    /// Names of the channels marked enabled
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        let mut enabled = Vec::new();
        if self.slack.as_ref().is_some_and(|c| c.enabled) {
            enabled.push(channel::SLACK);
        }
        if self.email.as_ref().is_some_and(|c| c.enabled) {
            enabled.push(channel::EMAIL);
        }
        if self.jira.as_ref().is_some_and(|c| c.enabled) {
            enabled.push(channel::JIRA);
        }
        enabled
    }
}

/// Channel identifier to constructed notifier; read-only once built
#[derive(Default, Clone)]
pub struct NotifierRegistry {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
}

impl std::fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierRegistry")
            .field("channels", &self.channels())
            .finish()
    }
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the notifier's own channel identifier
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.insert(notifier.channel().to_string(), notifier);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.register(notifier);
        self
    }

    /// Keep successful constructions; log and audit the rest
    pub fn from_results<I>(results: I, audit: &AuditLog) -> Self
    where
        I: IntoIterator<Item = (String, Result<Arc<dyn Notifier>, NotifierError>)>,
    {
        results
            .into_iter()
            .fold(Self::new(), |mut registry, (name, result)| {
                match result {
                    Ok(notifier) => {
                        info!(channel = %name, "Notifier initialized");
                        registry.notifiers.insert(name, notifier);
                    }
                    Err(e) => {
                        let message = format!("Failed to initialize {} notifier: {}", name, e);
                        error!(channel = %name, "{}", message);
                        audit.log_error("alert_manager", &message, json!({ "channel": name }));
                    }
                }
                registry
            })
    }

    /// Construct every enabled channel, reading credentials from the environment
    pub async fn from_config(config: &AlertingConfig, audit: &AuditLog) -> Self {
        let mut results: Vec<(String, Result<Arc<dyn Notifier>, NotifierError>)> = Vec::new();

        if let Some(slack) = config.slack.clone().filter(|c| c.enabled) {
            debug!("Slack bot token present: {}", credential_present(env::SLACK_BOT_TOKEN));
            let result = SlackNotifier::from_env(slack)
                .await
                .map(|n| Arc::new(n) as Arc<dyn Notifier>);
            results.push((channel::SLACK.to_string(), result));
        }

        if let Some(email) = config.email.clone().filter(|c| c.enabled) {
            debug!("Email password present: {}", credential_present(env::EMAIL_PASSWORD));
            let result = EmailNotifier::from_env(email)
                .await
                .map(|n| Arc::new(n) as Arc<dyn Notifier>);
            results.push((channel::EMAIL.to_string(), result));
        }

        if let Some(jira) = config.jira.clone().filter(|c| c.enabled) {
            debug!(
                "Jira credentials present: server={} user={} token={}",
                credential_present(env::JIRA_SERVER),
                credential_present(env::JIRA_USER_EMAIL),
                credential_present(env::JIRA_API_TOKEN)
            );
            let result = JiraNotifier::from_env(jira)
                .await
                .map(|n| Arc::new(n) as Arc<dyn Notifier>);
            results.push((channel::JIRA.to_string(), result));
        }

        Self::from_results(results, audit)
    }

    pub fn get(&self, channel: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers.get(channel).cloned()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.notifiers.contains_key(channel)
    }

    /// Registered channel identifiers, sorted
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.notifiers.keys().map(String::as_str).collect();
        channels.sort_unstable();
        channels
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// First registered channel (by identifier) that can manage incidents
    pub fn incident_channel(&self) -> Option<(&str, Arc<dyn Notifier>)> {
        self.channels().into_iter().find_map(|name| {
            self.notifiers
                .get(name)
                .filter(|n| n.as_incident_tracker().is_some())
                .map(|n| (name, Arc::clone(n)))
        })
    }
}

fn credential_present(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}
