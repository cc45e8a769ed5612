//! Slack Web API channel

use crate::format::{mention_prefix, metadata_lines, plain_text};
use crate::notifier::{NotificationResult, Notifier};
use crate::{channel, env, Metadata, NotifierError, Severity};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Slack channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Channel every alert is posted to, e.g. `#alerts`
    pub default_channel: String,
    /// Users or groups mentioned ahead of the message, per severity
    #[serde(default)]
    pub mention_users: HashMap<Severity, Vec<String>>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Slack API envelope; only the fields we read
#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Posts alerts to a Slack channel through `chat.postMessage`
pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
    token: String,
}

impl SlackNotifier {
    /// Build the notifier and verify the bot token with `auth.test`
    pub async fn connect(config: SlackConfig, token: Option<String>) -> Result<Self, NotifierError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(NotifierError::MissingCredential(env::SLACK_BOT_TOKEN))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let notifier = Self {
            config,
            client,
            token,
        };

        let auth = notifier.call("auth.test", &json!({})).await.map_err(|e| {
            error!("Failed to connect to Slack: {}", e);
            NotifierError::LivenessCheckFailed(e.to_string())
        })?;
        info!(
            "Successfully connected to Slack as {}",
            auth.user.as_deref().unwrap_or("unknown")
        );

        Ok(notifier)
    }

    /// Build the notifier with the token from `SLACK_BOT_TOKEN`
    pub async fn from_env(config: SlackConfig) -> Result<Self, NotifierError> {
        let token = std::env::var(env::SLACK_BOT_TOKEN).ok();
        debug!("Slack bot token found: {}", token.is_some());
        Self::connect(config, token).await
    }

    /// Slack message payload with a coloured attachment and plain-text fallback
    pub fn format_payload(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> Value {
        let mentions = mention_prefix(&self.config.mention_users, severity);
        let body = if mentions.is_empty() {
            message.to_string()
        } else {
            format!("{}\n{}", mentions, message)
        };

        let mut details = format!("*Severity:* {}", severity.label());
        for line in metadata_lines(metadata, |k, v| format!("*{}:* {}", k, v)) {
            details.push('\n');
            details.push_str(&line);
        }

        let fallback = plain_text(title, message, severity, metadata);

        json!({
            "channel": self.config.default_channel,
            "text": fallback,
            "attachments": [{
                "fallback": fallback,
                "color": severity.color(),
                "blocks": [
                    {
                        "type": "header",
                        "text": { "type": "plain_text", "text": format!("🚨 {}", title) }
                    },
                    {
                        "type": "section",
                        "text": { "type": "mrkdwn", "text": body }
                    },
                    {
                        "type": "section",
                        "text": { "type": "mrkdwn", "text": details }
                    },
                    {
                        "type": "context",
                        "elements": [
                            { "type": "mrkdwn", "text": "Sent by Automated Issue Detection System" }
                        ]
                    }
                ]
            }]
        })
    }

    /// Replace an earlier message, identified by its `ts`, with a new alert body
    pub async fn update_message(
        &self,
        ts: &str,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> Result<Value, NotifierError> {
        let mut payload = self.format_payload(title, message, severity, metadata);
        payload["ts"] = json!(ts);

        let reply = self.call("chat.update", &payload).await.map_err(|e| {
            error!("Failed to update Slack message {}: {}", ts, e);
            e
        })?;
        info!("Updated Slack message {} in {}", ts, self.config.default_channel);

        Ok(json!({
            "channel": reply.channel.unwrap_or_else(|| self.config.default_channel.clone()),
            "ts": reply.ts.unwrap_or_else(|| ts.to_string()),
        }))
    }

    /// Call a Web API method; `ok: false`, throttling and HTTP errors map to `NotifierError`
    async fn call(&self, method: &str, body: &Value) -> Result<SlackApiResponse, NotifierError> {
        let url = format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), method);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(NotifierError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifierError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let reply: SlackApiResponse = response
            .json()
            .await
            .map_err(|e| NotifierError::InvalidResponse(e.to_string()))?;

        if !reply.ok {
            return Err(NotifierError::Provider {
                status: status.as_u16(),
                message: reply.error.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        Ok(reply)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn channel(&self) -> &str {
        channel::SLACK
    }

    async fn send(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> NotificationResult {
        debug!("Preparing to send Slack message - Title: {}, Severity: {}", title, severity);
        let payload = self.format_payload(title, message, severity, metadata);

        match self.call("chat.postMessage", &payload).await {
            Ok(reply) => {
                info!(
                    "Successfully sent message to Slack channel {}",
                    self.config.default_channel
                );
                NotificationResult::sent(
                    channel::SLACK,
                    json!({
                        "channel": reply.channel.unwrap_or_else(|| self.config.default_channel.clone()),
                        "ts": reply.ts,
                    }),
                )
            }
            Err(e) => {
                let error_msg = format!("Failed to send Slack message: {}", e);
                error!("{}", error_msg);
                NotificationResult::failed(channel::SLACK, error_msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> SlackConfig {
        let mut mention_users = HashMap::new();
        mention_users.insert(Severity::Critical, vec!["<!channel>".to_string()]);
        SlackConfig {
            enabled: true,
            default_channel: "#alerts".to_string(),
            mention_users,
            api_base_url: server.uri(),
            timeout_secs: 5,
        }
    }

    async fn mount_auth_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "user": "alertbot"})))
            .mount(server)
            .await;
    }

    fn metadata() -> Metadata {
        let mut m = Metadata::new();
        m.insert("metric".to_string(), "cpu_usage".to_string());
        m.insert("threshold".to_string(), "90".to_string());
        m
    }

    #[tokio::test]
    async fn test_connect_requires_token() {
        let server = MockServer::start().await;
        let result = SlackNotifier::connect(config(&server), None).await;
        assert!(matches!(result, Err(NotifierError::MissingCredential(_))));
    }

    #[tokio::test]
    async fn test_connect_fails_when_auth_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_auth"})))
            .mount(&server)
            .await;

        let result = SlackNotifier::connect(config(&server), Some("xoxb-test".to_string())).await;
        match result {
            Err(NotifierError::LivenessCheckFailed(msg)) => assert!(msg.contains("invalid_auth")),
            other => panic!("expected liveness failure, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_send_posts_message() {
        let server = MockServer::start().await;
        mount_auth_ok(&server).await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({"channel": "#alerts"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"ok": true, "channel": "C123", "ts": "1700000000.000100"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::connect(config(&server), Some("xoxb-test".to_string()))
            .await
            .unwrap();
        let result = notifier
            .send("CPU high", "cpu at 97%", Severity::Critical, &metadata())
            .await;

        assert!(result.success);
        assert_eq!(result.channel, "slack");
        assert_eq!(result.response.unwrap()["ts"], "1700000000.000100");
    }

    #[tokio::test]
    async fn test_send_reports_api_error() {
        let server = MockServer::start().await;
        mount_auth_ok(&server).await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "channel_not_found"})))
            .mount(&server)
            .await;

        let notifier = SlackNotifier::connect(config(&server), Some("xoxb-test".to_string()))
            .await
            .unwrap();
        let result = notifier.send("t", "m", Severity::High, &Metadata::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("channel_not_found"));
    }

    #[tokio::test]
    async fn test_send_reports_rate_limit() {
        let server = MockServer::start().await;
        mount_auth_ok(&server).await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let notifier = SlackNotifier::connect(config(&server), Some("xoxb-test".to_string()))
            .await
            .unwrap();
        let result = notifier.send("t", "m", Severity::Warning, &Metadata::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("retry after 30s"));
    }

    #[tokio::test]
    async fn test_update_message_targets_ts() {
        let server = MockServer::start().await;
        mount_auth_ok(&server).await;
        Mock::given(method("POST"))
            .and(path("/chat.update"))
            .and(body_partial_json(json!({"channel": "#alerts", "ts": "1700000000.000100"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"ok": true, "channel": "C123", "ts": "1700000000.000100"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::connect(config(&server), Some("xoxb-test".to_string()))
            .await
            .unwrap();
        let reply = notifier
            .update_message("1700000000.000100", "CPU back to normal", "cpu at 40%", Severity::Warning, &metadata())
            .await
            .unwrap();

        assert_eq!(reply["channel"], "C123");
        assert_eq!(reply["ts"], "1700000000.000100");
    }

    #[tokio::test]
    async fn test_update_message_reports_api_error() {
        let server = MockServer::start().await;
        mount_auth_ok(&server).await;
        Mock::given(method("POST"))
            .and(path("/chat.update"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "message_not_found"})))
            .mount(&server)
            .await;

        let notifier = SlackNotifier::connect(config(&server), Some("xoxb-test".to_string()))
            .await
            .unwrap();
        let result = notifier
            .update_message("1.2", "t", "m", Severity::High, &Metadata::new())
            .await;

        match result {
            Err(NotifierError::Provider { message, .. }) => assert_eq!(message, "message_not_found"),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_payload_formatting() {
        let server = MockServer::start().await;
        mount_auth_ok(&server).await;
        let notifier = SlackNotifier::connect(config(&server), Some("xoxb-test".to_string()))
            .await
            .unwrap();

        let payload = notifier.format_payload("CPU high", "cpu at 97%", Severity::Critical, &metadata());
        let attachment = &payload["attachments"][0];
        assert_eq!(attachment["color"], "#FF0000");
        assert_eq!(attachment["blocks"][0]["text"]["text"], "🚨 CPU high");
        assert_eq!(attachment["blocks"][1]["text"]["text"], "<!channel>\ncpu at 97%");
        assert_eq!(
            attachment["blocks"][2]["text"]["text"],
            "*Severity:* CRITICAL\n*metric:* cpu_usage\n*threshold:* 90"
        );

        // no mentions configured for warning
        let payload = notifier.format_payload("t", "body", Severity::Warning, &Metadata::new());
        assert_eq!(payload["attachments"][0]["blocks"][1]["text"]["text"], "body");
    }
}
