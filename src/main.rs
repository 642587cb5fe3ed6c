use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use netpulse::clock::SystemClock;
use netpulse::config::MonitorConfig;
use netpulse::display;
use netpulse::engine::Monitor;
use netpulse::prober::NetworkProber;
use netpulse::sink::FileOutageSink;
use netpulse::{api, utils};

const DEFAULT_CONFIG: &str = "config.json";

#[derive(Debug, Parser)]
#[command(name = "netpulse", version, about = "Live reachability and outage monitor")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Disable the live table; only structured logs are written.
    #[arg(long)]
    no_table: bool,
}

fn load_config(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        info!("No {} found, using built-in host list", DEFAULT_CONFIG);
        return Ok(MonitorConfig::default());
    }
    MonitorConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};
        match unix_signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::setup_console();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let prober = Arc::new(NetworkProber::new()?);
    let sink = Arc::new(FileOutageSink::new(config.log_file.clone(), config.log_rotate_days));
    let monitor = Arc::new(
        Monitor::new(&config, prober, sink, Arc::new(SystemClock))
            .context("Invalid monitor configuration")?,
    );
    info!(hosts = monitor.host_count(), log_file = %config.log_file.display(), "Configuration loaded");

    monitor.start();
    let shutdown = monitor.shutdown_handle();

    let mut background = Vec::new();
    if !cli.no_table {
        background.push(tokio::spawn(display::run_presenter(
            Arc::clone(&monitor),
            Duration::from_millis(config.ui_refresh_ms),
            shutdown.subscribe(),
        )));
    }
    if let Some(port) = config.api_port {
        let monitor = Arc::clone(&monitor);
        let signal = shutdown.subscribe();
        background.push(tokio::spawn(async move {
            if let Err(e) = api::start_server(port, monitor, signal).await {
                error!(error = %e, "Snapshot API failed");
            }
        }));
    }

    wait_for_signal().await;
    info!("Shutdown signal received. Finalizing outages...");

    let summary = monitor.shutdown().await;
    for handle in background {
        let _ = handle.await;
    }

    println!("\nSummary:");
    for host in &summary.hosts {
        println!("{}", host);
    }
    if summary.truncated_outages > 0 {
        println!("{} outage(s) still open were logged as truncated", summary.truncated_outages);
    }

    Ok(())
}
