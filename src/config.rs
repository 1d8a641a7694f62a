// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Environment configuration.
//!
//! Read once at startup and never reloaded. Missing required variables are
//! fatal: the binary refuses to start rather than run without credentials.
//! Empty values count as unset.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::monitor::{MonitorSettings, DEFAULT_POLL_INTERVAL_SECS};
use crate::notify::{ntfy_endpoint, NtfyClient, NtfyCredentials, DEFAULT_NTFY_SERVER};
use crate::qbit::{CompletionStates, QbitConnector, DEFAULT_QBIT_URL, REQUEST_TIMEOUT_SECS};

/// Default trigger listener address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9090";

pub const ENV_QBIT_HOST: &str = "QBIT_HOST";
pub const ENV_QBIT_USER: &str = "QBIT_USER";
pub const ENV_QBIT_PASS: &str = "QBIT_PASS";
pub const ENV_NTFY_SERVER: &str = "NTFY_SERVER";
pub const ENV_NTFY_TOPIC: &str = "NTFY_TOPIC";
pub const ENV_NTFY_USER: &str = "NTFY_USER";
pub const ENV_NTFY_PASS: &str = "NTFY_PASS";
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL";
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
pub const ENV_COMPLETION_STATES: &str = "COMPLETION_STATES";
pub const ENV_LISTEN_ADDR: &str = "LISTEN_ADDR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing ENV: {0}")]
    Missing(&'static str),

    #[error("Invalid ENV {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration.
#[derive(Clone)]
pub struct Config {
    pub qbit_host: String,
    pub qbit_user: String,
    pub qbit_pass: String,
    pub ntfy_server: String,
    pub ntfy_topic: String,
    pub ntfy_user: Option<String>,
    pub ntfy_pass: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub completion_states: CompletionStates,
    pub listen_addr: SocketAddr,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("qbit_host", &self.qbit_host)
            .field("qbit_user", &self.qbit_user)
            .field("qbit_pass", &"<redacted>")
            .field("ntfy_server", &self.ntfy_server)
            .field("ntfy_topic", &self.ntfy_topic)
            .field("ntfy_user", &self.ntfy_user)
            .field("ntfy_pass", &self.ntfy_pass.as_ref().map(|_| "<redacted>"))
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("completion_states", &self.completion_states)
            .field("listen_addr", &self.listen_addr)
            .finish()
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let qbit_host = get(ENV_QBIT_HOST)
            .unwrap_or_else(|| DEFAULT_QBIT_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let completion_states = match get(ENV_COMPLETION_STATES) {
            Some(list) => {
                let states = CompletionStates::parse(&list);
                if states.is_empty() {
                    return Err(ConfigError::Invalid {
                        key: ENV_COMPLETION_STATES,
                        value: list,
                        reason: "no state names given".to_string(),
                    });
                }
                states
            }
            None => CompletionStates::default(),
        };

        let listen_addr = get(ENV_LISTEN_ADDR).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: ENV_LISTEN_ADDR,
                value: listen_addr.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            qbit_host,
            qbit_user: required(ENV_QBIT_USER)?,
            qbit_pass: required(ENV_QBIT_PASS)?,
            ntfy_server: get(ENV_NTFY_SERVER).unwrap_or_else(|| DEFAULT_NTFY_SERVER.to_string()),
            ntfy_topic: required(ENV_NTFY_TOPIC)?,
            ntfy_user: get(ENV_NTFY_USER),
            ntfy_pass: get(ENV_NTFY_PASS),
            poll_interval: seconds(
                ENV_POLL_INTERVAL,
                get(ENV_POLL_INTERVAL),
                DEFAULT_POLL_INTERVAL_SECS,
            )?,
            request_timeout: seconds(
                ENV_REQUEST_TIMEOUT,
                get(ENV_REQUEST_TIMEOUT),
                REQUEST_TIMEOUT_SECS,
            )?,
            completion_states,
            listen_addr,
        })
    }

    /// Full URL notifications are published to.
    pub fn ntfy_endpoint(&self) -> String {
        ntfy_endpoint(&self.ntfy_server, &self.ntfy_topic)
    }

    /// Basic-auth credentials for ntfy, present only when a user is set.
    pub fn ntfy_credentials(&self) -> Option<NtfyCredentials> {
        self.ntfy_user.as_ref().map(|username| NtfyCredentials {
            username: username.clone(),
            password: self.ntfy_pass.clone(),
        })
    }

    pub fn qbit_connector(&self) -> QbitConnector {
        QbitConnector::new(&self.qbit_host, &self.qbit_user, &self.qbit_pass)
            .with_timeout(self.request_timeout)
    }

    pub fn ntfy_client(&self) -> Result<NtfyClient, reqwest::Error> {
        let client = NtfyClient::with_timeout(self.ntfy_endpoint(), self.request_timeout)?;
        Ok(match self.ntfy_credentials() {
            Some(creds) => client.with_credentials(creds),
            None => client,
        })
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: self.poll_interval,
            completion_states: self.completion_states.clone(),
        }
    }
}

/// Parse a positive whole number of seconds.
fn seconds(key: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(default));
    };

    let parsed = value.trim().parse::<u64>();
    match parsed {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("QBIT_USER", "admin"),
        ("QBIT_PASS", "adminadmin"),
        ("NTFY_TOPIC", "downloads"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();

        assert_eq!(config.qbit_host, "http://localhost:8080");
        assert_eq!(config.ntfy_server, "https://ntfy.sh");
        assert_eq!(config.ntfy_endpoint(), "https://ntfy.sh/downloads");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.listen_addr, "0.0.0.0:9090".parse::<SocketAddr>().unwrap());
        assert_eq!(config.completion_states, CompletionStates::default());
        assert!(config.ntfy_credentials().is_none());
    }

    #[test]
    fn test_missing_required() {
        for missing in [ENV_QBIT_USER, ENV_QBIT_PASS, ENV_NTFY_TOPIC] {
            let vars: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != missing).collect();
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert_eq!(err, ConfigError::Missing(missing));
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let vars = [
            ("QBIT_USER", "  "),
            ("QBIT_PASS", "adminadmin"),
            ("NTFY_TOPIC", "downloads"),
        ];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_QBIT_USER));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend_from_slice(&[
            ("QBIT_HOST", "http://qbit:8080/"),
            ("NTFY_SERVER", "https://push.example.com"),
            ("NTFY_USER", "me"),
            ("NTFY_PASS", "secret"),
            ("POLL_INTERVAL", "10"),
            ("REQUEST_TIMEOUT", "3"),
            ("COMPLETION_STATES", "uploading,pausedUP"),
            ("LISTEN_ADDR", "127.0.0.1:7000"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.qbit_host, "http://qbit:8080");
        assert_eq!(config.ntfy_endpoint(), "https://push.example.com/downloads");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.completion_states.len(), 2);
        assert_eq!(config.listen_addr.port(), 7000);

        let creds = config.ntfy_credentials().unwrap();
        assert_eq!(creds.username, "me");
        assert_eq!(creds.password.as_deref(), Some("secret"));

        let settings = config.monitor_settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_poll_interval() {
        for bad in ["0", "abc", "-5", "1.5"] {
            let mut vars = REQUIRED.to_vec();
            vars.push(("POLL_INTERVAL", bad));
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "POLL_INTERVAL", .. }),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_invalid_listen_addr() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("LISTEN_ADDR", "not-an-address"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LISTEN_ADDR", .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("NTFY_PASS", "ntfy-secret"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("adminadmin"));
        assert!(!debug.contains("ntfy-secret"));
        assert!(debug.contains("admin"));
    }
}
