//! Monitor Scheduler Implementation

use audit_log::AuditLog;
use monitors::Monitor;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Configuration for the scheduling loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Sleep between two passes over the queue (default: 1000 ms)
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Interval of the "still alive" log line (default: 60 s)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_heartbeat_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// A monitor with its next due time
pub struct ScheduledMonitor {
    monitor: Arc<dyn Monitor>,
    /// Next time the monitor is due
    pub next_check: Instant,
    /// Checks run so far
    pub checks: u64,
    /// Registration order, breaks ties between monitors due at the same time
    order: usize,
}

impl ScheduledMonitor {
    fn new(monitor: Arc<dyn Monitor>, order: usize) -> Self {
        Self {
            monitor,
            next_check: Instant::now(),
            checks: 0,
            order,
        }
    }

    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    /// Schedule next check one interval from now
    fn schedule_next(&mut self) {
        self.next_check = Instant::now() + self.monitor.interval();
    }
}

impl Eq for ScheduledMonitor {}

impl PartialEq for ScheduledMonitor {
    fn eq(&self, other: &Self) -> bool {
        self.next_check == other.next_check && self.order == other.order
    }
}

impl Ord for ScheduledMonitor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior (earliest time first),
        // then first registered first
        other
            .next_check
            .cmp(&self.next_check)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for ScheduledMonitor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs monitor checks when they fall due
pub struct Scheduler {
    queue: BinaryHeap<ScheduledMonitor>,
    config: SchedulerConfig,
    audit: Arc<AuditLog>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, audit: Arc<AuditLog>) -> Self {
        Self {
            queue: BinaryHeap::new(),
            config,
            audit,
        }
    }

    /// Add a monitor; it is due immediately
    pub fn register(&mut self, monitor: Arc<dyn Monitor>) {
        info!(
            "Scheduling monitor {} with interval: {} seconds",
            monitor.name(),
            monitor.interval().as_secs()
        );
        let order = self.queue.len();
        self.queue.push(ScheduledMonitor::new(monitor, order));
    }

    pub fn monitor_count(&self) -> usize {
        self.queue.len()
    }

    /// Time until the earliest monitor is due, zero if one is overdue
    pub fn next_due_in(&self) -> Option<Duration> {
        self.queue
            .peek()
            .map(|next| next.next_check.saturating_duration_since(Instant::now()))
    }

    /// Run every monitor that is due now, earliest first; returns how many ran.
    /// Each monitor runs at most once per call.
    pub async fn run_pending(&mut self) -> usize {
        let now = Instant::now();
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|next| next.next_check <= now) {
            if let Some(scheduled) = self.queue.pop() {
                due.push(scheduled);
            }
        }

        let ran = due.len();
        for mut scheduled in due {
            run_check(&scheduled.monitor, &self.audit).await;
            scheduled.checks += 1;
            scheduled.schedule_next();
            self.queue.push(scheduled);
        }

        ran
    }

    /// Loop until `shutdown` turns true or its sender goes away
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting monitor scheduler with {} monitors", self.queue.len());
        let mut last_heartbeat = Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let ran = self.run_pending().await;
            if ran > 0 {
                debug!("Ran {} monitor checks", ran);
            }

            if last_heartbeat.elapsed() >= self.config.heartbeat() {
                info!("Monitoring system is active");
                last_heartbeat = Instant::now();
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Monitor scheduler stopped");
    }
}

/// Run one check on its own task so a panic stays inside it
async fn run_check(monitor: &Arc<dyn Monitor>, audit: &AuditLog) {
    let name = monitor.name().to_string();
    debug!("Running check for {}", name);

    let task = {
        let monitor = Arc::clone(monitor);
        tokio::spawn(async move { monitor.check().await })
    };

    if let Err(e) = task.await {
        let message = format!("Error in check for {}: {}", name, e);
        error!("{}", message);
        audit.log_error("scheduler", &message, json!({ "monitor": name }));
    }
}
