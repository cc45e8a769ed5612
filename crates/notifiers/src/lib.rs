//! Notification Channels
//!
//! Every channel implements [`Notifier`]: one outbound message per `send`,
//! with provider failures reported in the returned [`NotificationResult`]
//! rather than raised. Channels that can also manage incidents expose an
//! [`IncidentTracker`] through [`Notifier::as_incident_tracker`].
//!
//! Constructors (`connect`) perform a liveness check against the provider and
//! fail construction when it does not pass, so a half-configured channel never
//! reaches the registry.

mod email;
mod error;
mod format;
mod jira;
mod mock;
mod notifier;
mod severity;
mod slack;

pub use email::{EmailConfig, EmailNotifier};
pub use error::NotifierError;
pub use format::{mention_prefix, metadata_lines};
pub use jira::{JiraConfig, JiraCredentials, JiraNotifier};
pub use mock::{MockBehavior, MockNotifier, SentNotification};
pub use notifier::{IncidentAck, IncidentHandle, IncidentTracker, NotificationResult, Notifier};
pub use severity::{ParseSeverityError, Severity};
pub use slack::{SlackConfig, SlackNotifier};

/// Ordered string-to-string metadata attached to an alert
pub type Metadata = indexmap::IndexMap<String, String>;

/// Channel identifiers used in configuration and escalation policies
pub mod channel {
    pub const SLACK: &str = "slack";
    pub const EMAIL: &str = "email";
    pub const JIRA: &str = "jira";
}

/// Environment variables carrying channel credentials
pub mod env {
    pub const SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
    pub const EMAIL_PASSWORD: &str = "EMAIL_PASSWORD";
    pub const JIRA_SERVER: &str = "JIRA_SERVER";
    pub const JIRA_USER_EMAIL: &str = "JIRA_USER_EMAIL";
    pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";
}
