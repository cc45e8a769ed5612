//! Alerting System
//!
//! Routes findings to notification channels by severity, attempts every
//! channel independently and audits each attempt.

mod error;
mod finding;
mod manager;
mod outcome;
mod registry;
mod router;

pub use error::AlertError;
pub use finding::Finding;
pub use manager::AlertManager;
pub use outcome::{DispatchOutcome, IncidentOutcome};
pub use registry::{AlertingConfig, NotifierRegistry};
pub use router::{EscalationPolicy, EscalationRouter, EscalationRule};

pub use notifiers::{Metadata, NotificationResult, Severity};
