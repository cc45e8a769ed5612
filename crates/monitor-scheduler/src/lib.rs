//! Monitor Scheduler
//!
//! Drives every registered monitor at its own interval from a single loop.
//! All monitors are due immediately on start and each runs at most once per
//! pass. A check that panics is contained and recorded in the audit log,
//! and the monitor stays scheduled.

mod scheduler;

pub use scheduler::{ScheduledMonitor, Scheduler, SchedulerConfig};
