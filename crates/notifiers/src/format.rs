//! Shared message formatting policy
//!
//! Only presentation differs per channel: severity picks the colour marker,
//! metadata renders as `key: value` pairs in the order supplied, and a
//! per-severity mention list may precede the body.

use crate::{Metadata, Severity};
use std::collections::HashMap;

/// Render metadata entries in insertion order using `line` for each pair
pub fn metadata_lines<F>(metadata: &Metadata, line: F) -> Vec<String>
where
    F: Fn(&str, &str) -> String,
{
    metadata.iter().map(|(k, v)| line(k, v)).collect()
}

/// Space-joined mentions configured for `severity`, empty if none
pub fn mention_prefix(mentions: &HashMap<Severity, Vec<String>>, severity: Severity) -> String {
    mentions
        .get(&severity)
        .map(|users| users.join(" "))
        .unwrap_or_default()
}

/// Plain-text rendering shared by fallbacks and ticket bodies
pub(crate) fn plain_text(title: &str, message: &str, severity: Severity, metadata: &Metadata) -> String {
    let mut text = format!("{}\n{}\nSeverity: {}", title, message, severity.label());
    for line in metadata_lines(metadata, |k, v| format!("{}: {}", k, v)) {
        text.push('\n');
        text.push_str(&line);
    }
    text
}

/// Minimal HTML escaping for e-mail bodies
pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        let mut m = Metadata::new();
        m.insert("zeta".to_string(), "1".to_string());
        m.insert("alpha".to_string(), "2".to_string());
        m
    }

    #[test]
    fn test_metadata_keeps_insertion_order() {
        let lines = metadata_lines(&metadata(), |k, v| format!("{}={}", k, v));
        assert_eq!(lines, vec!["zeta=1", "alpha=2"]);
    }

    #[test]
    fn test_mention_prefix() {
        let mut mentions = HashMap::new();
        mentions.insert(Severity::Critical, vec!["@oncall".to_string(), "@lead".to_string()]);

        assert_eq!(mention_prefix(&mentions, Severity::Critical), "@oncall @lead");
        assert_eq!(mention_prefix(&mentions, Severity::Warning), "");
    }

    #[test]
    fn test_plain_text() {
        let text = plain_text("Disk", "almost full", Severity::High, &metadata());
        assert_eq!(text, "Disk\nalmost full\nSeverity: HIGH\nzeta: 1\nalpha: 2");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#39;");
    }
}
