//! SMTP e-mail channel

use crate::format::{escape_html, metadata_lines};
use crate::notifier::{NotificationResult, Notifier};
use crate::{channel, env, Metadata, NotifierError, Severity};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// E-mail channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Sender address; also the SMTP login
    pub from_address: String,
    /// Recipient lists per severity
    #[serde(default)]
    pub recipients: HashMap<Severity, Vec<String>>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_timeout_secs() -> u64 {
    10
}

/// Sends HTML alert e-mails over STARTTLS SMTP
pub struct EmailNotifier {
    config: EmailConfig,
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    /// Build the notifier without contacting the server
    pub fn new(config: EmailConfig, password: Option<String>) -> Result<Self, NotifierError> {
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or(NotifierError::MissingCredential(env::EMAIL_PASSWORD))?;

        let from: Mailbox = config.from_address.parse()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.from_address.clone(), password))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self {
            config,
            from,
            transport,
        })
    }

    /// Build the notifier and verify that the SMTP server accepts a STARTTLS login
    pub async fn connect(config: EmailConfig, password: Option<String>) -> Result<Self, NotifierError> {
        let notifier = Self::new(config, password)?;

        debug!(
            "Testing SMTP connection to {}:{}",
            notifier.config.smtp_server, notifier.config.smtp_port
        );
        match notifier.transport.test_connection().await {
            Ok(true) => {
                info!("Successfully connected to SMTP server");
                Ok(notifier)
            }
            Ok(false) => Err(NotifierError::LivenessCheckFailed(
                "SMTP server rejected the connection".to_string(),
            )),
            Err(e) => {
                error!("Failed to connect to SMTP server: {}", e);
                Err(NotifierError::LivenessCheckFailed(e.to_string()))
            }
        }
    }

    /// Build the notifier with the password from `EMAIL_PASSWORD`
    pub async fn from_env(config: EmailConfig) -> Result<Self, NotifierError> {
        let password = std::env::var(env::EMAIL_PASSWORD).ok();
        debug!("Email password found: {}", password.is_some());
        Self::connect(config, password).await
    }

    /// Recipients configured for `severity`
    pub fn recipients(&self, severity: Severity) -> &[String] {
        self.config
            .recipients
            .get(&severity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// HTML body for an alert
    pub fn render_html(title: &str, message: &str, severity: Severity, metadata: &Metadata) -> String {
        let metadata_html = metadata_lines(metadata, |k, v| {
            format!("<strong>{}:</strong> {}", escape_html(k), escape_html(v))
        })
        .join("<br>");

        format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
            <h2 style="color: {color};">🚨 {title}</h2>
            <div style="margin: 20px 0; padding: 15px; background-color: #f5f5f5; border-radius: 5px;">
                <p>{message}</p>
            </div>
            <div style="margin: 20px 0;">
                <p><strong>Severity:</strong> {label}</p>
                {metadata}
            </div>
            <hr>
            <p style="color: #666; font-size: 12px;">This is an automated alert from the Issue Detection System.</p>
        </div>
    </body>
</html>"#,
            color = severity.color(),
            title = escape_html(title),
            message = escape_html(message).replace('\n', "<br>"),
            label = severity.label(),
            metadata = metadata_html,
        )
    }

    /// Assemble the message for the severity's recipient list
    pub fn build_message(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> Result<Message, NotifierError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("[{}] {}", severity.label(), title))
            .header(ContentType::TEXT_HTML);

        for recipient in self.recipients(severity) {
            builder = builder.to(recipient.parse()?);
        }

        Ok(builder.body(Self::render_html(title, message, severity, metadata))?)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &str {
        channel::EMAIL
    }

    async fn send(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: &Metadata,
    ) -> NotificationResult {
        let recipients = self.recipients(severity).to_vec();
        if recipients.is_empty() {
            warn!("No recipients configured for severity level: {}", severity);
            return NotificationResult::failed(
                channel::EMAIL,
                format!("no recipients configured for severity {}", severity),
            );
        }

        let email = match self.build_message(title, message, severity, metadata) {
            Ok(email) => email,
            Err(e) => {
                error!("Failed to build email: {}", e);
                return NotificationResult::failed(channel::EMAIL, format!("Failed to send email: {}", e));
            }
        };

        debug!("Sending email to {:?}", recipients);
        match self.transport.send(email).await {
            Ok(response) => {
                info!("Successfully sent email to {:?}", recipients);
                NotificationResult::sent(
                    channel::EMAIL,
                    json!({
                        "recipients": recipients,
                        "code": response.code().to_string(),
                    }),
                )
            }
            Err(e) => {
                let error_msg = format!("Failed to send email: {}", e);
                error!("{}", error_msg);
                NotificationResult::failed(channel::EMAIL, error_msg)
            }
        }
    }
}
