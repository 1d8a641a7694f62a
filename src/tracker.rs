// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Start-tracking entry point.
//!
//! Deduplicates trigger requests against the [`TrackingRegistry`] and
//! spawns one [`Monitor`] per new hash. There is no stop
//! operation; monitors end on their own.

use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::monitor::{Monitor, MonitorSettings, Termination};
use crate::notify::Notifier;
use crate::qbit::SessionFactory;
use crate::registry::TrackingRegistry;

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A new monitor was spawned.
    Started,
    /// A monitor for this hash is already running; nothing was done.
    AlreadyTracking,
}

/// Spawns monitors, at most one per hash.
#[derive(Clone)]
pub struct Tracker {
    registry: TrackingRegistry,
    sessions: Arc<dyn SessionFactory>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    pub fn new(
        registry: TrackingRegistry,
        sessions: Arc<dyn SessionFactory>,
        notifier: Arc<dyn Notifier>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            registry,
            sessions,
            notifier,
            settings,
        }
    }

    pub fn registry(&self) -> &TrackingRegistry {
        &self.registry
    }

    /// Start monitoring `hash` unless it is already being monitored.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, hash: &str) -> TrackOutcome {
        match self.spawn(hash) {
            Some(_) => TrackOutcome::Started,
            None => TrackOutcome::AlreadyTracking,
        }
    }

    /// Like [`start`](Self::start), but hands back the monitor's join handle.
    ///
    /// Returns `None` when `hash` is already tracked.
    pub fn spawn(&self, hash: &str) -> Option<JoinHandle<Termination>> {
        let Some(guard) = self.registry.try_claim(hash) else {
            tracing::debug!(hash, "Already tracking");
            return None;
        };

        let monitor = Monitor::new(
            guard,
            Arc::clone(&self.sessions),
            Arc::clone(&self.notifier),
            self.settings.clone(),
        );

        tracing::info!(hash, active = self.registry.len(), "Tracking started");
        Some(tokio::spawn(monitor.run()))
    }
}
