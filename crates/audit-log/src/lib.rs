//! Audit Trail
//!
//! Append-only record of every monitor check, alert dispatch, error and
//! lifecycle event. Records are written as one JSON object per line; the
//! running process never rewrites or deletes an entry.

mod trail;
mod sink;

pub use trail::{AuditConfig, AuditEventType, AuditLevel, AuditLog, AuditRecord};
pub use sink::{AuditSink, FileSink, MemorySink};

use thiserror::Error;

/// Audit errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Audit sink lock poisoned")]
    LockPoisoned,
}
