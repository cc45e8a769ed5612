//! Credential presence report
//!
//! Only ever reports whether a variable is set; values are never printed.

use monitors::env as monitor_env;
use notifiers::env as notifier_env;

/// Variables read by the channels and monitors
pub const CREDENTIAL_VARS: [&str; 8] = [
    notifier_env::SLACK_BOT_TOKEN,
    notifier_env::EMAIL_PASSWORD,
    notifier_env::JIRA_SERVER,
    notifier_env::JIRA_USER_EMAIL,
    notifier_env::JIRA_API_TOKEN,
    monitor_env::PROM_USERNAME,
    monitor_env::PROM_PASSWORD,
    monitor_env::ES_API_KEY,
];

/// Whether each credential variable is set to a non-empty value
pub fn credential_report() -> Vec<(&'static str, bool)> {
    CREDENTIAL_VARS
        .iter()
        .map(|&name| (name, is_present(name)))
        .collect()
}

fn is_present(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty())
}

/// Print the report to stdout
pub fn print_credential_report() {
    println!("Environment variables:");
    for (name, present) in credential_report() {
        let state = if present { "set" } else { "not set" };
        println!("  {:<16} {}", name, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_covers_every_credential() {
        let report = credential_report();
        assert_eq!(report.len(), CREDENTIAL_VARS.len());
        assert!(report.iter().any(|(name, _)| *name == "JIRA_API_TOKEN"));
        assert!(report.iter().any(|(name, _)| *name == "ES_API_KEY"));
    }

    #[test]
    fn test_empty_value_is_not_present() {
        std::env::set_var("ESCALATION_TEST_EMPTY_CREDENTIAL", "");
        std::env::set_var("ESCALATION_TEST_SET_CREDENTIAL", "secret");
        assert!(!is_present("ESCALATION_TEST_EMPTY_CREDENTIAL"));
        assert!(is_present("ESCALATION_TEST_SET_CREDENTIAL"));
        assert!(!is_present("ESCALATION_TEST_NEVER_SET_CREDENTIAL"));
    }
}
