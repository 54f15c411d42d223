//! netriaged - network triage daemon
//!
//! Serves triage sessions and read-only device captures over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use netriaged::assist::OllamaAssist;
use netriaged::catalog::ScopeCatalog;
use netriaged::config::Config;
use netriaged::dispatcher::CaptureDispatcher;
use netriaged::executor::SshExecutor;
use netriaged::history::TrialHistory;
use netriaged::raw_log::RawLogWriter;
use netriaged::server::{self, AppState};
use netriaged::session::TriageSessionManager;
use netriaged::trusted::TrustedCatalog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "netriaged")]
#[command(about = "Network triage daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (overrides $NETRIAGE_CONFIG and the default locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.daemon.log_filter)),
        )
        .init();

    info!("[BOOT] netriaged v{} starting", netriage_common::VERSION);
    info!("[BOOT] Scope root {}", config.scopes.repo_root.display());

    let trusted = Arc::new(
        TrustedCatalog::load(config.catalog.trusted_commands.as_deref())
            .context("Failed to load trusted command catalog")?,
    );
    info!("[BOOT] Trusted catalog: {} commands", trusted.len());

    let catalog = ScopeCatalog::new(&config.scopes);
    let dispatcher = CaptureDispatcher::new(
        catalog.clone(),
        Arc::new(SshExecutor::new(&config.capture)),
        RawLogWriter::new(catalog.clone()),
        config.capture.clone(),
    );

    let mut manager = TriageSessionManager::new(
        catalog.clone(),
        dispatcher.clone(),
        trusted,
        TrialHistory::new(catalog),
        config.session.clone(),
    );
    if config.assist.enabled {
        match OllamaAssist::new(&config.assist) {
            Ok(assist) => {
                info!("[BOOT] Diagnosis assist: {} at {}", config.assist.model, config.assist.endpoint);
                manager = manager.with_assist(Arc::new(assist), config.assist.timeout());
            }
            Err(e) => warn!("[BOOT] Diagnosis assist disabled: {}", e),
        }
    }
    let manager = Arc::new(manager);

    spawn_sweeper(
        Arc::clone(&manager),
        Duration::from_secs(config.session.sweep_interval_secs.max(1)),
    );

    let listen = cli.listen.unwrap_or(config.daemon.listen);
    info!("[READY] netriaged operational");
    server::run(Arc::new(AppState::new(manager, dispatcher)), &listen).await
}

/// Close idle sessions and drop expired ones on a fixed period.
fn spawn_sweeper(manager: Arc<TriageSessionManager>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let report = manager.sweep_idle(chrono::Utc::now()).await;
            if report.closed > 0 || report.dropped > 0 {
                debug!(
                    "Sweep closed {} sessions, dropped {}",
                    report.closed, report.dropped
                );
            }
        }
    });
}
