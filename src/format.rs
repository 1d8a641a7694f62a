// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Text rendering for notification bodies.
//!
//! Everything here is pure: progress bars, ETA durations, transfer rates
//! and the fraction-to-percent conversion the monitor uses to decide when
//! a new notification is due.

/// Number of cells in a rendered progress bar.
pub const BAR_WIDTH: usize = 10;

/// Glyph for a filled bar cell.
pub const FILLED: &str = "█";

/// Glyph for an empty bar cell.
pub const EMPTY: &str = "░";

/// qBittorrent reports this ETA (100 days) when it cannot estimate one.
pub const UNBOUNDED_ETA_SECS: u64 = 8_640_000;

/// Rendered in place of an ETA at or above [`UNBOUNDED_ETA_SECS`].
pub const UNBOUNDED: &str = "∞";

/// Render a fixed-width progress bar such as `[█████░░░░░]`.
///
/// The percent is clamped to `0..=100` before rounding, and the filled cell
/// count is `round(percent / 10)` with halves rounded away from zero.
///
/// ```
/// use qbitwatch::format::render_progress_bar;
///
/// assert_eq!(render_progress_bar(50), "[█████░░░░░]");
/// assert_eq!(render_progress_bar(-10), render_progress_bar(0));
/// ```
pub fn render_progress_bar(percent: i32) -> String {
    let clamped = percent.clamp(0, 100);
    let filled = ((f64::from(clamped) / 10.0).round() as usize).min(BAR_WIDTH);
    let empty = BAR_WIDTH - filled;

    format!("[{}{}]", FILLED.repeat(filled), EMPTY.repeat(empty))
}

/// Render an ETA in seconds as compact hours/minutes/seconds.
///
/// Units above the largest non-zero one are omitted, so `60` renders as
/// `1m0s` and `3600` as `1h0m0s`. The client's "unknown" sentinel renders
/// as [`UNBOUNDED`].
pub fn render_duration(seconds: u64) -> String {
    if seconds >= UNBOUNDED_ETA_SECS {
        return UNBOUNDED.to_string();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Render a byte rate as MiB/s with one decimal, e.g. `1.5 MB/s`.
pub fn render_speed(bytes_per_sec: u64) -> String {
    let mbps = bytes_per_sec as f64 / 1024.0 / 1024.0;
    format!("{:.1} MB/s", mbps)
}

/// Convert a `[0, 1]` completion fraction to a whole percent.
///
/// Truncates toward zero (`0.999` is 99, not 100) so an item is never
/// reported finished before the client says so. Out-of-range and NaN
/// inputs are clamped.
pub fn percent_from_fraction(fraction: f64) -> i32 {
    if fraction.is_nan() {
        return 0;
    }
    ((fraction * 100.0).floor() as i32).clamp(0, 100)
}
