//! Monitor capability interface

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Monitor: Send + Sync {
    /// Identifier used in logs, audit records and metrics
    fn name(&self) -> &str;

    /// Time between two checks
    fn interval(&self) -> Duration;

    /// Query the source and alert on anything found. Must not fail: every
    /// query error is logged and audited here.
    async fn check(&self);
}
