//! Escalation Routing

use notifiers::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Ordered channel list for one severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    #[serde(default)]
    pub channels: Vec<String>,
}

impl EscalationRule {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }
}

/// Severity to channel list mapping, loaded once at startup
pub type EscalationPolicy = HashMap<Severity, EscalationRule>;

/// Pure lookup over an [`EscalationPolicy`]
#[derive(Debug, Clone, Default)]
pub struct EscalationRouter {
    policy: EscalationPolicy,
}

impl EscalationRouter {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self { policy }
    }

    /// Channels for `severity`, in configured order; empty if none
    pub fn channels_for(&self, severity: Severity) -> &[String] {
        self.policy
            .get(&severity)
            .map(|rule| rule.channels.as_slice())
            .unwrap_or(&[])
    }

    /// Like [`channels_for`](Self::channels_for), for an unparsed severity;
    /// unknown values route nowhere
    pub fn channels_for_str(&self, severity: &str) -> &[String] {
        match severity.parse::<Severity>() {
            Ok(severity) => self.channels_for(severity),
            Err(_) => &[],
        }
    }

    /// Every channel referenced by any severity
    pub fn referenced_channels(&self) -> BTreeSet<&str> {
        self.policy
            .values()
            .flat_map(|rule| rule.channels.iter().map(String::as_str))
            .collect()
    }

    /// Severities without an entry in the policy
    pub fn unrouted_severities(&self) -> Vec<Severity> {
        Severity::ALL
            .into_iter()
            .filter(|s| !self.policy.contains_key(s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> EscalationRouter {
        let mut policy = EscalationPolicy::new();
        policy.insert(Severity::Critical, EscalationRule::new(["slack", "email", "jira"]));
        policy.insert(Severity::High, EscalationRule::new(["slack", "jira"]));
        policy.insert(Severity::Warning, EscalationRule::default());
        EscalationRouter::new(policy)
    }

    #[test]
    fn test_channels_in_order() {
        let router = router();
        assert_eq!(router.channels_for(Severity::Critical), ["slack", "email", "jira"]);
        assert_eq!(router.channels_for(Severity::High), ["slack", "jira"]);
        assert!(router.channels_for(Severity::Warning).is_empty());
    }

    #[test]
    fn test_unknown_severity_routes_nowhere() {
        let router = router();
        assert!(router.channels_for_str("info").is_empty());
        assert!(router.channels_for_str("CRITICAL").is_empty());
        assert_eq!(router.channels_for_str("high").len(), 2);
    }

    #[test]
    fn test_referenced_channels() {
        let router = router();
        let referenced: Vec<_> = router.referenced_channels().into_iter().collect();
        assert_eq!(referenced, vec!["email", "jira", "slack"]);
    }

    #[test]
    fn test_unrouted_severities() {
        let mut policy = EscalationPolicy::new();
        policy.insert(Severity::High, EscalationRule::new(["slack"]));
        let router = EscalationRouter::new(policy);
        assert_eq!(
            router.unrouted_severities(),
            vec![Severity::Critical, Severity::Warning]
        );
    }

    #[test]
    fn test_policy_deserializes_case_insensitive_keys() {
        let policy: EscalationPolicy =
            serde_json::from_str(r#"{"Critical": {"channels": ["slack"]}, "warning": {}}"#).unwrap();
        let router = EscalationRouter::new(policy);
        assert_eq!(router.channels_for(Severity::Critical), ["slack"]);
        assert!(router.channels_for(Severity::Warning).is_empty());
    }
}
