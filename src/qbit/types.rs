// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Types for qBittorrent status records.

use serde::Deserialize;
use std::collections::HashSet;

use crate::format::{percent_from_fraction, UNBOUNDED_ETA_SECS};

/// States qBittorrent reports once the payload is fully on disk.
pub const DEFAULT_COMPLETION_STATES: &[&str] = &[
    "uploading",
    "stalledUP",
    "pausedUP",
    "stoppedUP",
    "queuedUP",
    "forcedUP",
    "checkingUP",
    "completed",
];

/// Snapshot of one torrent as returned by `/api/v2/torrents/info`.
///
/// Only the fields the monitor reads are decoded; everything else in the
/// response is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TorrentInfo {
    /// Info-hash, the stable identifier for the item.
    pub hash: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Completion fraction in `[0, 1]`.
    pub progress: f64,
    /// Seconds remaining; [`UNBOUNDED_ETA_SECS`] when unknown.
    #[serde(default = "unknown_eta")]
    pub eta: u64,
    /// Download rate in bytes per second.
    #[serde(default, rename = "dlspeed")]
    pub dl_speed: u64,
    /// Lifecycle state string (`downloading`, `stalledUP`, ...).
    #[serde(default)]
    pub state: String,
}

fn unknown_eta() -> u64 {
    UNBOUNDED_ETA_SECS
}

impl TorrentInfo {
    /// Whole percent complete, truncated and clamped to `0..=100`.
    pub fn percent(&self) -> i32 {
        percent_from_fraction(self.progress)
    }
}

/// Exact, case-sensitive allow-list of states that mean "finished".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStates {
    states: HashSet<String>,
}

impl CompletionStates {
    /// Build an allow-list from the given state names. Blank entries are dropped.
    pub fn new<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            states: states
                .into_iter()
                .map(Into::into)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list such as `uploading,pausedUP`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Whether `state` is one of the completion states.
    pub fn contains(&self, state: &str) -> bool {
        self.states.contains(state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for CompletionStates {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_STATES.iter().copied())
    }
}
