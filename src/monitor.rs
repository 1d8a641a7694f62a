// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-torrent monitor
//!
//! A [`Monitor`] follows one torrent from trigger to finish:
//!
//! ```text
//! Authenticating ──▶ Polling ──▶ Terminated
//!        │                           ▲
//!        └───────── login failed ────┘
//! ```
//!
//! While polling it fetches the torrent every `poll_interval`, sends a
//! progress notification whenever the whole percent rises above the last
//! one sent, and sends one completion notification when the torrent is at
//! 100% or in a completion state. Fetch errors are logged and retried on the
//! next tick. An empty result means the torrent was deleted and ends the
//! monitor silently.
//!
//! The monitor owns its [`TrackingGuard`]; the hash leaves the registry when
//! the monitor is dropped, on every exit path.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::notify::{Notification, Notifier};
use crate::qbit::{CompletionStates, SessionFactory, TorrentInfo};
use crate::registry::TrackingGuard;

/// Default time between status polls (in seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Lifecycle of one monitor. States are never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Authenticating,
    Polling,
    Terminated,
}

/// Why a monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Finished downloading; the completion notification was sent.
    Completed,
    /// qBittorrent no longer lists the torrent.
    Removed,
    /// Could not open or authenticate a session.
    AuthFailed,
}

/// Tunables shared by every monitor.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub completion_states: CompletionStates,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            completion_states: CompletionStates::default(),
        }
    }
}

/// What one status record asks the monitor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// New percent to report, if it rose.
    pub progress: Option<i32>,
    /// Whether the torrent is finished.
    pub complete: bool,
}

/// Progress bookkeeping for one torrent.
///
/// Reports are strictly increasing: a percent equal to or below the last
/// reported one (including a regression in the source data) produces no
/// progress update.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    last_reported: i32,
    completion_states: CompletionStates,
}

impl ProgressTracker {
    pub fn new(completion_states: CompletionStates) -> Self {
        Self {
            // Below any valid percent so the first record always reports.
            last_reported: -1,
            completion_states,
        }
    }

    /// Last percent reported, or `None` before the first report.
    pub fn last_reported(&self) -> Option<i32> {
        (self.last_reported >= 0).then_some(self.last_reported)
    }

    /// Fold in a fresh record.
    pub fn observe(&mut self, info: &TorrentInfo) -> PollOutcome {
        let percent = info.percent();

        let progress = if percent > self.last_reported {
            self.last_reported = percent;
            Some(percent)
        } else {
            None
        };

        let complete = percent >= 100 || self.completion_states.contains(&info.state);

        PollOutcome { progress, complete }
    }
}

/// Monitor task for a single torrent.
pub struct Monitor {
    guard: TrackingGuard,
    sessions: Arc<dyn SessionFactory>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
    state: MonitorState,
}

impl Monitor {
    pub fn new(
        guard: TrackingGuard,
        sessions: Arc<dyn SessionFactory>,
        notifier: Arc<dyn Notifier>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            guard,
            sessions,
            notifier,
            settings,
            state: MonitorState::Authenticating,
        }
    }

    fn enter(&mut self, next: MonitorState) {
        debug_assert!(next != self.state, "monitor state re-entered");
        tracing::debug!(hash = %self.guard.hash(), from = ?self.state, to = ?next, "Monitor transition");
        self.state = next;
    }

    /// Run until the torrent finishes, disappears, or login fails.
    ///
    /// Consumes the monitor; the registry claim is released on return.
    pub async fn run(mut self) -> Termination {
        let hash = self.guard.hash().to_string();
        tracing::info!(hash = %hash, "Monitor started");

        let termination = self.drive(&hash).await;

        self.enter(MonitorState::Terminated);
        tracing::info!(hash = %hash, reason = ?termination, "Monitor stopped");
        termination
    }

    async fn drive(&mut self, hash: &str) -> Termination {
        let mut session = match self.sessions.open_session() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(hash = %hash, "Auth failed: {}", e);
                return Termination::AuthFailed;
            }
        };

        if let Err(e) = session.authenticate().await {
            tracing::warn!(hash = %hash, "Auth failed: {}", e);
            return Termination::AuthFailed;
        }

        self.enter(MonitorState::Polling);

        let period = self.settings.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut progress = ProgressTracker::new(self.settings.completion_states.clone());

        loop {
            ticker.tick().await;

            let info = match session.fetch_status(hash).await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    tracing::info!(hash = %hash, "Torrent removed. Stopping.");
                    return Termination::Removed;
                }
                Err(e) => {
                    tracing::warn!(hash = %hash, "Error: {}", e);
                    continue;
                }
            };

            let outcome = progress.observe(&info);

            if let Some(percent) = outcome.progress {
                tracing::debug!(hash = %hash, percent, "Progress update");
                self.notifier
                    .send(&Notification::progress(hash, &info, percent))
                    .await;
            }

            if outcome.complete {
                self.notifier.send(&Notification::complete(hash, &info)).await;
                return Termination::Completed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(progress: f64, state: &str) -> TorrentInfo {
        TorrentInfo {
            hash: "abc".to_string(),
            name: "Test Torrent".to_string(),
            progress,
            eta: 60,
            dl_speed: 1024,
            state: state.to_string(),
        }
    }

    #[test]
    fn test_first_record_always_reports() {
        let mut tracker = ProgressTracker::new(CompletionStates::default());
        assert_eq!(tracker.last_reported(), None);

        let outcome = tracker.observe(&record(0.0, "downloading"));
        assert_eq!(outcome.progress, Some(0));
        assert!(!outcome.complete);
        assert_eq!(tracker.last_reported(), Some(0));
    }

    #[test]
    fn test_reports_only_increases() {
        let mut tracker = ProgressTracker::new(CompletionStates::default());

        assert_eq!(tracker.observe(&record(0.3, "downloading")).progress, Some(30));
        assert_eq!(tracker.observe(&record(0.3, "downloading")).progress, None);
        assert_eq!(tracker.observe(&record(0.305, "downloading")).progress, None);
        assert_eq!(tracker.observe(&record(0.7, "downloading")).progress, Some(70));
    }

    #[test]
    fn test_regression_is_ignored() {
        let mut tracker = ProgressTracker::new(CompletionStates::default());

        tracker.observe(&record(0.6, "downloading"));
        let outcome = tracker.observe(&record(0.4, "downloading"));
        assert_eq!(outcome.progress, None);
        assert_eq!(tracker.last_reported(), Some(60));

        // Recovering to the old value still does not re-notify.
        assert_eq!(tracker.observe(&record(0.6, "downloading")).progress, None);
        assert_eq!(tracker.observe(&record(0.61, "downloading")).progress, Some(61));
    }

    #[test]
    fn test_full_progress_completes_with_update() {
        let mut tracker = ProgressTracker::new(CompletionStates::default());
        tracker.observe(&record(0.7, "downloading"));

        let outcome = tracker.observe(&record(1.0, "downloading"));
        assert_eq!(outcome.progress, Some(100));
        assert!(outcome.complete);
    }

    #[test]
    fn test_completion_state_completes_below_100() {
        let mut tracker = ProgressTracker::new(CompletionStates::default());

        let outcome = tracker.observe(&record(0.999, "stalledUP"));
        assert_eq!(outcome.progress, Some(99));
        assert!(outcome.complete);
    }

    #[test]
    fn test_completion_states_are_configurable() {
        let mut tracker = ProgressTracker::new(CompletionStates::parse("seeding"));

        assert!(!tracker.observe(&record(0.5, "uploading")).complete);
        assert!(tracker.observe(&record(0.5, "seeding")).complete);
    }

    #[test]
    fn test_default_settings() {
        let settings = MonitorSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert!(settings.completion_states.contains("uploading"));
    }
}
