// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trigger server
//!
//! A tiny HTTP surface that qBittorrent's "run external program on torrent
//! added" hook (or anything else) can call to start a monitor.
//!
//! # Endpoints
//!
//! - `POST /track?hash=<hash>` - Start tracking a torrent
//! - `GET /health` - Liveness and number of running monitors
//!
//! # Example
//!
//! ```no_run
//! use qbitwatch::server::Server;
//! # use qbitwatch::tracker::Tracker;
//!
//! # async fn example(tracker: Tracker) -> anyhow::Result<()> {
//! let server = Server::new("0.0.0.0:9090".parse()?, tracker);
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use anyhow::Result;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::tracker::{TrackOutcome, Tracker};

/// Upper bound on handling one trigger request (in seconds).
const HANDLER_TIMEOUT_SECS: u64 = 10;

/// Server state shared across handlers.
pub struct AppState {
    pub tracker: Tracker,
}

/// Trigger listener.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
    tracker: Tracker,
}

impl Server {
    pub fn new(addr: SocketAddr, tracker: Tracker) -> Self {
        Self { addr, tracker }
    }

    /// Build the router with all routes.
    pub fn build_router(&self) -> Router {
        build_router(self.tracker.clone())
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn start(&self) -> Result<()> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Port {} is already in use. Set LISTEN_ADDR or --listen to another address.",
                    self.addr.port()
                )
            } else {
                anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e)
            }
        })?;

        tracing::info!("Sidecar listening on {}", self.addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Router for the trigger API around `tracker`.
pub fn build_router(tracker: Tracker) -> Router {
    let state = Arc::new(AppState { tracker });

    Router::new()
        .route(
            "/track",
            post(track_handler).fallback(method_not_allowed_handler),
        )
        .route("/health", get(health_handler))
        .layer(TimeoutLayer::new(Duration::from_secs(HANDLER_TIMEOUT_SECS)))
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_monitors: usize,
}

// =============================================================================
// Handlers
// =============================================================================

async fn track_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> (StatusCode, String) {
    let hash = match first_hash(&params) {
        Some(hash) => hash,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                "Missing 'hash' query parameter".to_string(),
            )
        }
    };

    match state.tracker.start(hash) {
        TrackOutcome::Started => (StatusCode::OK, format!("Tracking started for {}", hash)),
        TrackOutcome::AlreadyTracking => (StatusCode::OK, format!("Already tracking {}", hash)),
    }
}

/// First non-blank `hash` value; repeats after it are ignored.
fn first_hash(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .filter(|(key, _)| key == "hash")
        .map(|(_, value)| value.trim())
        .find(|value| !value.is_empty())
}

async fn method_not_allowed_handler() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_monitors: state.tracker.registry().len(),
    })
}

/// Graceful shutdown signal handler.
///
/// Running monitors are not persisted; they simply stop with the process.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
                    }
                }
            }
            _ => {
                tracing::warn!("Failed to install signal handlers, falling back to Ctrl+C");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
}
