// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ntfy push notifications
//!
//! Delivery is best-effort: [`Notifier::send`] returns nothing, logs any
//! failure and never retries. A slow or broken ntfy server only delays the
//! monitor that is sending, bounded by the request timeout.
//!
//! Every notification for a torrent carries the same `X-Notification-ID`
//! (`qbit-<hash>`) so ntfy clients replace the previous alert in place.

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use std::fmt;
use std::time::Duration;

use crate::format::{render_duration, render_progress_bar, render_speed};
use crate::qbit::TorrentInfo;

/// Default public ntfy server.
pub const DEFAULT_NTFY_SERVER: &str = "https://ntfy.sh";

/// Prefix for the per-torrent notification id.
pub const NOTIFICATION_ID_PREFIX: &str = "qbit-";

/// Default timeout for a publish request (in seconds).
const PUBLISH_TIMEOUT_SECS: u64 = 5;

const TAG_DOWNLOADING: &str = "arrow_down";
const TAG_COMPLETE: &str = "white_check_mark";

/// ntfy message priority.
///
/// `Default` is silent on most clients; `High` vibrates or plays a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Default,
    High,
}

impl Priority {
    /// Value for the `Priority` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tags: String,
    /// Stable id; repeated sends with the same id update one alert.
    pub id: String,
    pub priority: Priority,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        tags: impl Into<String>,
        id: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tags: tags.into(),
            id: id.into(),
            priority,
        }
    }

    /// Progress update for the torrent tracked as `hash`.
    pub fn progress(hash: &str, info: &TorrentInfo, percent: i32) -> Self {
        let body = format!(
            "{}% {}\nSpeed: {}\nETA: {}",
            percent,
            render_progress_bar(percent),
            render_speed(info.dl_speed),
            render_duration(info.eta),
        );

        Self::new(
            info.name.clone(),
            body,
            TAG_DOWNLOADING,
            notification_id(hash),
            Priority::Default,
        )
    }

    /// Final "finished" alert for the torrent tracked as `hash`.
    pub fn complete(hash: &str, info: &TorrentInfo) -> Self {
        Self::new(
            "Download Complete",
            format!("{} has finished downloading.", info.name),
            TAG_COMPLETE,
            notification_id(hash),
            Priority::High,
        )
    }
}

/// Notification id shared by every message about one torrent.
pub fn notification_id(hash: &str) -> String {
    format!("{}{}", NOTIFICATION_ID_PREFIX, hash)
}

/// Resolve the publish URL from a server and a topic.
///
/// A topic that is already an absolute `http(s)://` URL is used verbatim.
pub fn ntfy_endpoint(server: &str, topic: &str) -> String {
    if topic.starts_with("http://") || topic.starts_with("https://") {
        return topic.to_string();
    }
    format!(
        "{}/{}",
        server.trim_end_matches('/'),
        topic.trim_start_matches('/')
    )
}

/// Sink for push notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification. Failures are logged, never returned.
    async fn send(&self, notification: &Notification);
}

/// Basic-auth credentials for a protected topic.
#[derive(Clone)]
pub struct NtfyCredentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for NtfyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtfyCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Publishes to one ntfy topic over HTTP.
#[derive(Debug, Clone)]
pub struct NtfyClient {
    endpoint: String,
    credentials: Option<NtfyCredentials>,
    client: reqwest::Client,
}

impl NtfyClient {
    /// Create a client publishing to `endpoint` (see [`ntfy_endpoint`]).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(endpoint, Duration::from_secs(PUBLISH_TIMEOUT_SECS))
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            credentials: None,
            client,
        })
    }

    /// Authenticate every publish with these credentials.
    pub fn with_credentials(mut self, credentials: NtfyCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, notification: &Notification) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(&self.endpoint)
            .body(notification.body.clone());

        let headers = [
            ("title", notification.title.as_str()),
            ("tags", notification.tags.as_str()),
            ("priority", notification.priority.as_str()),
            ("x-notification-id", notification.id.as_str()),
        ];
        for (name, value) in headers {
            request = request.header(HeaderName::from_static(name), header_value(value));
        }

        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, creds.password.as_ref());
        }

        request
    }
}

/// Turn arbitrary text into a header value.
///
/// Control characters (newlines in particular) become spaces. Non-ASCII
/// text is passed through as raw UTF-8, which ntfy accepts.
fn header_value(text: &str) -> HeaderValue {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    HeaderValue::from_bytes(cleaned.as_bytes()).unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[async_trait]
impl Notifier for NtfyClient {
    async fn send(&self, notification: &Notification) {
        let result = self.build_request(notification).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    id = %notification.id,
                    priority = %notification.priority,
                    "Sent ntfy notification"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    id = %notification.id,
                    "ntfy rejected notification: HTTP {}",
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!(id = %notification.id, "Failed to send ntfy notification: {}", e);
            }
        }
    }
}
