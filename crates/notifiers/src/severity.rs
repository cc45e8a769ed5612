//! Alert Severity

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Alert severity; the sole routing key for escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    High,
    Critical,
}

/// Raised when a string is not one of the recognised severities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid severity level: {0}")]
pub struct ParseSeverityError(pub String);

impl Severity {
    /// All severities, most urgent first
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::High, Severity::Warning];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Warning => "warning",
        }
    }

    /// Upper-case label used in subjects and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Warning => "WARNING",
        }
    }

    /// Visual marker: red, orange, yellow
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Critical => "#FF0000",
            Severity::High => "#FFA500",
            Severity::Warning => "#FFFF00",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict: only the exact lower-case names are accepted.
impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "warning" => Ok(Severity::Warning),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

// Configuration files may spell severities in any case.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
