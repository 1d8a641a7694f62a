// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! qbitwatch - qBittorrent progress notifications over ntfy.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use qbitwatch::config::Config;
use qbitwatch::logging::init_logging;
use qbitwatch::registry::TrackingRegistry;
use qbitwatch::server::Server;
use qbitwatch::tracker::Tracker;

/// Exit code when required configuration is missing or invalid.
const EXIT_CONFIG: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "qbitwatch")]
#[command(version)]
#[command(about = "Watches qBittorrent downloads and pushes progress to ntfy.")]
#[command(long_about = "qbitwatch - qBittorrent progress notifications\n\n\
    Listens for POST /track?hash=<hash> and follows that torrent until it \
    finishes, publishing progress to an ntfy topic.\n\n\
    Configuration comes from the environment: QBIT_HOST, QBIT_USER, QBIT_PASS, \
    NTFY_SERVER, NTFY_TOPIC, NTFY_USER, NTFY_PASS, POLL_INTERVAL, \
    REQUEST_TIMEOUT, COMPLETION_STATES, LISTEN_ADDR.")]
struct Cli {
    /// Address for the trigger listener (overrides LISTEN_ADDR)
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Seconds between status polls (overrides POLL_INTERVAL)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: Option<u64>,

    /// Log filter directive, e.g. "debug" or "qbitwatch=trace" (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(secs) = cli.poll_interval {
        config.poll_interval = Duration::from_secs(secs);
    }

    tracing::debug!(?config, "Configuration loaded");

    let notifier = config
        .ntfy_client()
        .context("Failed to create HTTP client for ntfy")?;

    let tracker = Tracker::new(
        TrackingRegistry::new(),
        Arc::new(config.qbit_connector()),
        Arc::new(notifier),
        config.monitor_settings(),
    );

    tracing::info!(
        qbit = %config.qbit_host,
        ntfy = %config.ntfy_endpoint(),
        poll_secs = config.poll_interval.as_secs(),
        "Starting qbitwatch"
    );

    Server::new(config.listen_addr, tracker).start().await
}
