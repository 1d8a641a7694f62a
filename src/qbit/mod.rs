// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! qBittorrent WebUI integration
//!
//! Provides the status fetcher each monitor uses to poll one torrent.
//! Every monitor opens its own [`QbitSession`] so that a re-login in one
//! task never invalidates the cookie another task is using.
//!
//! # Example
//!
//! ```no_run
//! use qbitwatch::qbit::{QbitConnector, SessionFactory, StatusSource};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let connector = QbitConnector::new("http://localhost:8080", "admin", "secret");
//!
//! let mut session = connector.open_session()?;
//! session.authenticate().await?;
//!
//! match session.fetch_status("8c2f...").await? {
//!     Some(info) => println!("{} at {}%", info.name, info.percent()),
//!     None => println!("torrent was removed"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod types;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use types::{CompletionStates, TorrentInfo, DEFAULT_COMPLETION_STATES};

/// Default qBittorrent WebUI endpoint.
pub const DEFAULT_QBIT_URL: &str = "http://localhost:8080";

/// Default timeout for each WebUI request (in seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Body qBittorrent returns (with status 200) when the credentials are wrong.
const LOGIN_FAILURE_MARKER: &str = "Fails.";

/// Error types specific to qBittorrent operations.
#[derive(Debug, Error)]
pub enum QbitError {
    /// Connection, timeout or body-read failure.
    #[error("request to qBittorrent failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("qBittorrent API returned status: {0}")]
    Status(StatusCode),

    /// The body was not the expected JSON shape.
    #[error("invalid response from qBittorrent: {0}")]
    Decode(#[from] serde_json::Error),

    /// Login was refused.
    #[error("bad credentials or connection failed")]
    LoginRejected,
}

/// One authenticated view of the download client.
///
/// Owned by exactly one monitor for its whole lifetime.
#[async_trait]
pub trait StatusSource: Send {
    /// Establish the session. Failure is terminal for the owning monitor.
    async fn authenticate(&mut self) -> Result<(), QbitError>;

    /// Fetch the current record for `hash`.
    ///
    /// `Ok(None)` means the client no longer knows the torrent.
    async fn fetch_status(&mut self, hash: &str) -> Result<Option<TorrentInfo>, QbitError>;
}

/// Opens a fresh, unauthenticated [`StatusSource`] per monitor.
pub trait SessionFactory: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn StatusSource>, QbitError>;
}

/// Connection settings for the qBittorrent WebUI.
#[derive(Clone)]
pub struct QbitConnector {
    /// Base URL without a trailing slash.
    base_url: String,
    username: String,
    password: String,
    /// Per-request timeout.
    timeout: Duration,
}

impl fmt::Debug for QbitConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QbitConnector")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QbitConnector {
    /// Create connection settings for the WebUI at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a session with its own cookie jar.
    pub fn session(&self) -> Result<QbitSession, QbitError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()?;

        Ok(QbitSession {
            connector: self.clone(),
            client,
        })
    }
}

impl SessionFactory for QbitConnector {
    fn open_session(&self) -> Result<Box<dyn StatusSource>, QbitError> {
        Ok(Box::new(self.session()?))
    }
}

/// A cookie-holding client bound to one monitor.
#[derive(Debug)]
pub struct QbitSession {
    connector: QbitConnector,
    client: reqwest::Client,
}

impl QbitSession {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.connector.base_url, path)
    }
}

#[async_trait]
impl StatusSource for QbitSession {
    async fn authenticate(&mut self) -> Result<(), QbitError> {
        let form = [
            ("username", self.connector.username.as_str()),
            ("password", self.connector.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/api/v2/auth/login"))
            // The WebUI rejects logins whose Referer does not match its host.
            .header(reqwest::header::REFERER, &self.connector.base_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() || body.contains(LOGIN_FAILURE_MARKER) {
            return Err(QbitError::LoginRejected);
        }

        tracing::debug!("Authenticated against {}", self.connector.base_url);
        Ok(())
    }

    async fn fetch_status(&mut self, hash: &str) -> Result<Option<TorrentInfo>, QbitError> {
        let response = self
            .client
            .get(self.url("/api/v2/torrents/info"))
            .query(&[("hashes", hash)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QbitError::Status(status));
        }

        let body = response.text().await?;
        let torrents: Vec<TorrentInfo> = serde_json::from_str(&body)?;

        Ok(select_record(torrents, hash))
    }
}

/// Pick the record for `hash`, falling back to the first one returned.
fn select_record(torrents: Vec<TorrentInfo>, hash: &str) -> Option<TorrentInfo> {
    let exact = torrents
        .iter()
        .position(|t| t.hash.eq_ignore_ascii_case(hash));

    match exact {
        Some(index) => torrents.into_iter().nth(index),
        None => torrents.into_iter().next(),
    }
}
