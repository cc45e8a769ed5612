//! Jira ticketing channel
//!
//! Alerts become issues; the same connection backs incident creation and
//! updates (comment + workflow transition) through [`IncidentTracker`].

use crate::format::{metadata_lines, plain_text};
use crate::notifier::{IncidentAck, IncidentHandle, IncidentTracker, NotificationResult, Notifier};
use crate::{channel, env, Metadata, NotifierError, Severity};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const ALERT_LABEL: &str = "automated-alert";
const INCIDENT_LABEL: &str = "incident";

/// Jira channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Base URL; falls back to `JIRA_SERVER`
    #[serde(default)]
    pub server_url: Option<String>,
    pub project_key: String,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    /// Jira priority name per severity
    #[serde(default = "default_priorities")]
    pub priorities: HashMap<Severity, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_issue_type() -> String {
    "Task".to_string()
}

fn default_priorities() -> HashMap<Severity, String> {
    HashMap::from([
        (Severity::Critical, "Highest".to_string()),
        (Severity::High, "High".to_string()),
        (Severity::Warning, "Medium".to_string()),
    ])
}

fn default_timeout_secs() -> u64 {
    15
}

/// Credentials supplied out-of-band
#[derive(Clone, Default)]
pub struct JiraCredentials {
    pub server_url: Option<String>,
    pub user_email: Option<String>,
    pub api_token: Option<String>,
}

impl std::fmt::Debug for JiraCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraCredentials")
            .field("server_url", &self.server_url)
            .field("user_email", &self.user_email.is_some())
            .field("api_token", &self.api_token.is_some())
            .finish()
    }
}

impl JiraCredentials {
    pub fn from_env() -> Self {
        Self {
            server_url: std::env::var(env::JIRA_SERVER).ok(),
            user_email: std::env::var(env::JIRA_USER_EMAIL).ok(),
            api_token: std::env::var(env::JIRA_API_TOKEN).ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    id: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct TransitionList {
    transitions: Vec<Transition>,
}

#[derive(Debug, Deserialize)]
struct Transition {
    id: String,
    name: String,
    to: TransitionTarget,
}

#[derive(Debug, Deserialize)]
struct TransitionTarget {
    name: String,
}

/// Files alerts and incidents as Jira issues (REST API v2)
pub struct JiraNotifier {
    base_url: String,
    project_key: String,
    issue_type: String,
    priorities: HashMap<Severity, String>,
    client: reqwest::Client,
    user_email: String,
    api_token: String,
}

impl JiraNotifier {
    /// Build the notifier and verify the credentials against `/myself`
    pub async fn connect(config: JiraConfig, credentials: JiraCredentials) -> Result<Self, NotifierError> {
        let base_url = config
            .server_url
            .clone()
            .or(credentials.server_url)
            .filter(|s| !s.is_empty())
            .ok_or(NotifierError::MissingCredential(env::JIRA_SERVER))?;
        let user_email = credentials
            .user_email
            .filter(|s| !s.is_empty())
            .ok_or(NotifierError::MissingCredential(env::JIRA_USER_EMAIL))?;
        let api_token = credentials
            .api_token
            .filter(|s| !s.is_empty())
            .ok_or(NotifierError::MissingCredential(env::JIRA_API_TOKEN))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let notifier = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_key: config.project_key,
            issue_type: config.issue_type,
            priorities: config.priorities,
            client,
            user_email,
            api_token,
        };

        let response = notifier
            .client
            .get(notifier.api_url("/myself"))
            .basic_auth(&notifier.user_email, Some(&notifier.api_token))
            .send()
            .await
            .map_err(|e| NotifierError::LivenessCheckFailed(format!("Connection failed: {}", e)))?;

        match response.status() {
            s if s.is_success() => {
                info!("Successfully connected to Jira at {}", notifier.base_url);
                Ok(notifier)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                NotifierError::LivenessCheckFailed("Authentication failed".to_string()),
            ),
            s => Err(NotifierError::LivenessCheckFailed(format!("Unexpected status: {}", s))),
        }
    }

    /// Build the notifier from `JIRA_SERVER`, `JIRA_USER_EMAIL`, `JIRA_API_TOKEN`
    pub async fn from_env(config: JiraConfig) -> Result<Self, NotifierError> {
        let credentials = JiraCredentials::from_env();
        debug!("Jira credentials: {:?}", credentials);
        Self::connect(config, credentials).await
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api/2{}", self.base_url, path)
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    fn priority(&self, severity: Severity) -> &str {
        self.priorities
            .get(&severity)
            .map(String::as_str)
            .unwrap_or("Medium")
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Response, NotifierError> {
        let response = self
            .client
            .post(self.api_url(path))
            .basic_auth(&self.user_email, Some(&self.api_token))
            .json(body)
            .send()
            .await?;
        check_status(response, path).await
    }

    async fn get(&self, path: &str) -> Result<Response, NotifierError> {
        let response = self
            .client
            .get(self.api_url(path))
            .basic_auth(&self.user_email, Some(&self.api_token))
            .send()
            .await?;
        check_status(response, path).await
    }

    #[instrument(skip(self, description))]
    async fn create_issue(
        &self,
        summary: &str,
        description: &str,
        severity: Severity,
        label: &str,
    ) -> Result<IncidentHandle, NotifierError> {
        let body = json!({
            "fields": {
                "project": { "key": self.project_key },
                "summary": summary,
                "description": description,
                "issuetype": { "name": self.issue_type },
                "priority": { "name": self.priority(severity) },
                "labels": [label, severity.as_str()],
            }
        });

        let created: CreatedIssue = self
            .post("/issue", &body)
            .await?
            .json()
            .await
            .map_err(|e| NotifierError::InvalidResponse(e.to_string()))?;

        info!("Created Jira issue: {} (id: {})", created.key, created.id);
        Ok(IncidentHandle {
            url: Some(self.browse_url(&created.key)),
            key: created.key,
            id: created.id,
        })
    }

    /// Transition of `key` whose name or target status matches `status`
    async fn find_transition(&self, key: &str, status: &str) -> Result<Transition, NotifierError> {
        let list: TransitionList = self
            .get(&format!("/issue/{}/transitions", key))
            .await?
            .json()
            .await
            .map_err(|e| NotifierError::InvalidResponse(e.to_string()))?;

        list.transitions
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(status) || t.to.name.eq_ignore_ascii_case(status))
            .ok_or_else(|| {
                NotifierError::NotFound(format!("no transition to status '{}' for {}", status, key))
            })
    }

    async fn apply_transition(&self, key: &str, transition: &Transition) -> Result<(), NotifierError> {
        self.post(
            &format!("/issue/{}/transitions", key),
            &json!({ "transition": { "id": transition.id } }),
        )
        .await?;
        debug!("Transitioned {} via '{}'", key, transition.name);
        Ok(())
    }
}

/// Issue keys and ids are interpolated into URL paths
fn validate_issue_key(key: &str) -> Result<(), NotifierError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(NotifierError::InvalidIncidentKey(key.to_string()))
    }
}

async fn check_status(response: Response, path: &str) -> Result<Response, NotifierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(NotifierError::NotFound(path.to_string()));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        return Err(NotifierError::RateLimited { retry_after_secs });
    }
    let message = response.text().await.unwrap_or_default();
    Err(NotifierError::Provider {
        status: status.as_u16(),
        message,
    })
}

fn with_metadata(text: &str, metadata: &Metadata) -> String {
    let lines = metadata_lines(metadata, |k, v| format!("{}: {}", k, v));
    if lines.is_empty() {
        text.to_string()
    } else {
        format!("{}\n\n{}", text, lines.join("\n"))
    }
}

#[async_trait]
impl Notifier for JiraNotifier {
    fn channel(&self) -> &str {
        channel::JIRA
    }

    async fn send(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> NotificationResult {
        let summary = format!("[{}] {}", severity.label(), title);
        let description = plain_text(title, message, severity, metadata);

        match self.create_issue(&summary, &description, severity, ALERT_LABEL).await {
            Ok(handle) => NotificationResult::sent(channel::JIRA, json!(handle)),
            Err(e) => {
                let error_msg = format!("Failed to create Jira issue: {}", e);
                error!("{}", error_msg);
                NotificationResult::failed(channel::JIRA, error_msg)
            }
        }
    }

    fn as_incident_tracker(&self) -> Option<&dyn IncidentTracker> {
        Some(self)
    }
}

#[async_trait]
impl IncidentTracker for JiraNotifier {
    async fn create_incident(
        &self,
        title: &str,
        description: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> Result<IncidentHandle, NotifierError> {
        self.create_issue(title, &with_metadata(description, metadata), severity, INCIDENT_LABEL)
            .await
    }

    #[instrument(skip(self, comment, metadata))]
    async fn update_incident(
        &self,
        incident: &str,
        status: &str,
        comment: Option<&str>,
        metadata: &Metadata,
    ) -> Result<IncidentAck, NotifierError> {
        validate_issue_key(incident)?;
        // no write before the target transition is known to exist
        let transition = self.find_transition(incident, status).await?;

        if let Some(comment) = comment {
            self.post(
                &format!("/issue/{}/comment", incident),
                &json!({ "body": with_metadata(comment, metadata) }),
            )
            .await?;
            debug!("Added comment to issue {}", incident);
        }

        self.apply_transition(incident, &transition).await?;
        info!("Updated Jira issue {} to '{}'", incident, status);

        Ok(IncidentAck {
            key: incident.to_string(),
            status: status.to_string(),
            commented: comment.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> JiraConfig {
        JiraConfig {
            enabled: true,
            server_url: None,
            project_key: "OPS".to_string(),
            issue_type: default_issue_type(),
            priorities: default_priorities(),
            timeout_secs: 5,
        }
    }

    fn credentials(server: &MockServer) -> JiraCredentials {
        JiraCredentials {
            server_url: Some(server.uri()),
            user_email: Some("bot@example.com".to_string()),
            api_token: Some("token".to_string()),
        }
    }

    async fn connected(server: &MockServer) -> JiraNotifier {
        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accountId": "abc"})))
            .mount(server)
            .await;
        JiraNotifier::connect(config(), credentials(server)).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_requires_credentials() {
        let result = JiraNotifier::connect(config(), JiraCredentials::default()).await;
        assert!(matches!(result, Err(NotifierError::MissingCredential("JIRA_SERVER"))));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = JiraNotifier::connect(config(), credentials(&server)).await;
        assert!(matches!(result, Err(NotifierError::LivenessCheckFailed(_))));
    }

    #[tokio::test]
    async fn test_send_files_labelled_issue() {
        let server = MockServer::start().await;
        let notifier = connected(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .and(body_partial_json(json!({
                "fields": {
                    "summary": "[CRITICAL] Disk full",
                    "priority": { "name": "Highest" },
                    "labels": ["automated-alert", "critical"]
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10001", "key": "OPS-7"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = notifier
            .send("Disk full", "97% used", Severity::Critical, &Metadata::new())
            .await;

        assert!(result.success);
        let response = result.response.unwrap();
        assert_eq!(response["key"], "OPS-7");
        assert_eq!(response["url"], format!("{}/browse/OPS-7", server.uri()));
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let server = MockServer::start().await;
        let notifier = connected(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .respond_with(ResponseTemplate::new(400).set_body_string("project is required"))
            .mount(&server)
            .await;

        let result = notifier.send("t", "m", Severity::High, &Metadata::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("project is required"));
    }

    #[tokio::test]
    async fn test_create_incident() {
        let server = MockServer::start().await;
        let notifier = connected(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .and(body_partial_json(json!({
                "fields": {
                    "summary": "Checkout outage",
                    "description": "Payments failing\n\nregion: eu-west-1",
                    "labels": ["incident", "high"]
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10002", "key": "OPS-8"})))
            .mount(&server)
            .await;

        let mut metadata = Metadata::new();
        metadata.insert("region".to_string(), "eu-west-1".to_string());
        let tracker = notifier.as_incident_tracker().unwrap();
        let handle = tracker
            .create_incident("Checkout outage", "Payments failing", Severity::High, &metadata)
            .await
            .unwrap();

        assert_eq!(handle.key, "OPS-8");
        assert_eq!(handle.id, "10002");
    }

    #[tokio::test]
    async fn test_update_incident_comments_and_transitions() {
        let server = MockServer::start().await;
        let notifier = connected(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/OPS-8/comment"))
            .and(body_partial_json(json!({"body": "Mitigated"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/OPS-8/transitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transitions": [
                    {"id": "11", "name": "Start Progress", "to": {"name": "In Progress"}},
                    {"id": "31", "name": "Resolve", "to": {"name": "Resolved"}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/OPS-8/transitions"))
            .and(body_partial_json(json!({"transition": {"id": "31"}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let ack = notifier
            .update_incident("OPS-8", "resolved", Some("Mitigated"), &Metadata::new())
            .await
            .unwrap();

        assert_eq!(ack.key, "OPS-8");
        assert_eq!(ack.status, "resolved");
        assert!(ack.commented);
    }

    #[tokio::test]
    async fn test_update_incident_unknown_status() {
        let server = MockServer::start().await;
        let notifier = connected(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/OPS-8/transitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transitions": []})))
            .mount(&server)
            .await;

        let result = notifier
            .update_incident("OPS-8", "Closed", None, &Metadata::new())
            .await;
        assert!(matches!(result, Err(NotifierError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_incident_unknown_status_leaves_no_comment() {
        let server = MockServer::start().await;
        let notifier = connected(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/OPS-8/transitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transitions": [{"id": "31", "name": "Resolve", "to": {"name": "Resolved"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/OPS-8/comment"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1"})))
            .expect(0)
            .mount(&server)
            .await;

        let result = notifier
            .update_incident("OPS-8", "Closed", Some("Mitigated"), &Metadata::new())
            .await;
        assert!(matches!(result, Err(NotifierError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_incident_rejects_path_like_keys() {
        let server = MockServer::start().await;
        let notifier = connected(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/OPS-8/transitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transitions": []})))
            .expect(0)
            .mount(&server)
            .await;

        for key in ["OPS-8/../OPS-9", "", "OPS 8", "OPS-8?x=1"] {
            let result = notifier
                .update_incident(key, "Resolved", None, &Metadata::new())
                .await;
            assert!(
                matches!(result, Err(NotifierError::InvalidIncidentKey(_))),
                "key {:?} accepted",
                key
            );
        }
        assert!(validate_issue_key("OPS-8").is_ok());
        assert!(validate_issue_key("10002").is_ok());
    }
}
