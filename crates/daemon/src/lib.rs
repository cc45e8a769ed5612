//! Issue Escalation Daemon
//!
//! Loads the configuration, installs logging and metrics, and runs the
//! monitors against the escalation policy until shutdown.

pub mod app;
pub mod check_env;
pub mod config;
pub mod logging;

pub use app::{install_metrics_exporter, shutdown_signal, Engine, EngineError};
pub use check_env::{credential_report, print_credential_report};
pub use config::{ConfigError, MetricsConfig, Settings};
pub use logging::{init_logging, LoggingConfig};
