//! Issue Escalation Daemon
//!
//! Usage:
//!   issue-escalation --config config/config.yaml
//!   issue-escalation --check-env

use anyhow::{Context, Result};
use clap::Parser;
use issue_escalation::{
    init_logging, install_metrics_exporter, print_credential_report, shutdown_signal, Engine,
    Settings,
};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "issue-escalation")]
#[command(about = "Watch metrics and logs, escalate findings to Slack, email and Jira")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "ESCALATION_CONFIG", default_value = "config/config.yaml")]
    config: PathBuf,

    /// Report which credential variables are set, then exit
    #[arg(long)]
    check_env: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.check_env {
        print_credential_report();
        return Ok(());
    }

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    init_logging(&settings.logging).context("Failed to initialize logging")?;
    for name in &settings.unresolved_env {
        warn!("Environment variable {} referenced in configuration is not set", name);
    }

    info!("Issue Escalation Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", cli.config.display());

    if let Some(addr) = settings.metrics.listen_addr {
        install_metrics_exporter(addr)?;
    }

    let engine = Engine::build(&settings).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    engine.run(shutdown_rx).await;
    Ok(())
}
