// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! qbitwatch - qBittorrent progress notifications over ntfy
//!
//! A sidecar that receives short "start tracking" triggers and fans each
//! one out into an independent monitor task:
//!
//! **Trigger** -> **Registry** -> **Monitor** -> **qBittorrent** / **ntfy**
//!
//! # Core Modules
//!
//! - [`tracker`] - Start requests, deduplication and task spawning
//! - [`registry`] - The set of hashes with a running monitor
//! - [`monitor`] - Per-torrent polling state machine
//! - [`qbit`] - qBittorrent WebUI session and status fetch
//! - [`notify`] - ntfy notifications
//! - [`format`] - Progress bar, ETA and speed rendering
//! - [`server`] - HTTP trigger endpoint
//! - [`config`] - Environment configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod format;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod qbit;
pub mod registry;
pub mod server;
pub mod tracker;

pub use config::{Config, ConfigError};
pub use monitor::{Monitor, MonitorSettings, MonitorState, ProgressTracker, Termination};
pub use notify::{Notification, Notifier, NtfyClient, Priority};
pub use qbit::{CompletionStates, QbitConnector, QbitError, SessionFactory, StatusSource, TorrentInfo};
pub use registry::{TrackingGuard, TrackingRegistry};
pub use tracker::{TrackOutcome, Tracker};
