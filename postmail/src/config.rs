//! Sender configuration and its loaders.
//!
//! [`SenderConfig`] is captured once by [`MailSender::new`](crate::MailSender::new)
//! and never re-read. It can be deserialized from RON or assembled from
//! environment variables; the sender itself never consults either source.

use std::{fmt, path::Path};

use postmail_common::config::ClientTimeouts;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAIL_ADDRESS: &str = "MAIL_ADDRESS";
pub const PASSWORD: &str = "PASSWORD";
pub const MAIL_HOST: &str = "MAIL_HOST";
pub const DEFAULT_SENDER_NAME: &str = "DEFAULT_SENDER_NAME";
pub const DEFAULT_RECEIVER: &str = "DEFAULT_RECEIVER";
pub const SECRET_KEY: &str = "SECRET_KEY";
pub const AUTO_CC: &str = "AUTO_CC";
pub const RETRY_TIMES: &str = "RETRY_TIMES";
pub const MAIL_PER_CONNECTION: &str = "MAIL_PER_CONNECTION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse configuration: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Account used to authenticate with the relay, and the envelope sender.
    pub mail_address: String,

    pub password: String,

    /// Relay address, `name` or `name:port`.
    ///
    /// Default: `localhost`
    #[serde(default = "defaults::mail_host")]
    pub mail_host: String,

    /// Display name used when a send does not supply one.
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Recipient used when a send names none, and the auto-CC target.
    #[serde(default)]
    pub default_receiver: Option<String>,

    /// When set, every send must present this exact key.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Copy `default_receiver` on every message that does not already
    /// reach it.
    #[serde(default)]
    pub auto_cc: bool,

    /// Transmission attempts per send, each after the first preceded by a
    /// reconnect. Zero makes every send fail without an attempt.
    ///
    /// Default: 3
    #[serde(default = "defaults::retry")]
    pub retry: u32,

    /// Messages sent before the connection is proactively refreshed.
    ///
    /// Default: 100
    #[serde(default = "defaults::mail_per_connection")]
    pub mail_per_connection: u32,

    /// Name announced to the relay in EHLO/HELO.
    ///
    /// Default: `localhost`
    #[serde(default = "defaults::helo_name")]
    pub helo_name: String,

    #[serde(default)]
    pub timeouts: ClientTimeouts,
}

impl fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderConfig")
            .field("mail_address", &self.mail_address)
            .field("password", &"<redacted>")
            .field("mail_host", &self.mail_host)
            .field("sender_name", &self.sender_name)
            .field("default_receiver", &self.default_receiver)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("auto_cc", &self.auto_cc)
            .field("retry", &self.retry)
            .field("mail_per_connection", &self.mail_per_connection)
            .field("helo_name", &self.helo_name)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl SenderConfig {
    /// A configuration with the given credentials and every other setting at
    /// its default.
    #[must_use]
    pub fn new(mail_address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mail_address: mail_address.into(),
            password: password.into(),
            mail_host: defaults::mail_host(),
            sender_name: None,
            default_receiver: None,
            secret_key: None,
            auto_cc: false,
            retry: defaults::retry(),
            mail_per_connection: defaults::mail_per_connection(),
            helo_name: defaults::helo_name(),
            timeouts: ClientTimeouts::default(),
        }
    }

    /// The configured shared secret, if any. An empty secret counts as none.
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.secret_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Parse a RON document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Ron`] if the document is malformed or lacks a required
    /// field.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Read and parse a RON file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`SenderConfig::from_ron_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_ron_str(&source)
    }

    /// Assemble a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`SenderConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Assemble a configuration from named variables supplied by `lookup`.
    ///
    /// Unset and empty variables leave the default in place.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when `MAIL_ADDRESS` or `PASSWORD` is unset,
    /// [`ConfigError::Invalid`] when a numeric or boolean variable does not
    /// parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let mut config = Self::new(
            get(MAIL_ADDRESS).ok_or(ConfigError::Missing(MAIL_ADDRESS))?,
            get(PASSWORD).ok_or(ConfigError::Missing(PASSWORD))?,
        );

        if let Some(host) = get(MAIL_HOST) {
            config.mail_host = host;
        }
        config.sender_name = get(DEFAULT_SENDER_NAME);
        config.default_receiver = get(DEFAULT_RECEIVER);
        config.secret_key = get(SECRET_KEY);

        if let Some(value) = get(AUTO_CC) {
            config.auto_cc = parse_flag(AUTO_CC, &value)?;
        }
        if let Some(value) = get(RETRY_TIMES) {
            config.retry = parse_count(RETRY_TIMES, &value)?;
        }
        if let Some(value) = get(MAIL_PER_CONNECTION) {
            config.mail_per_connection = parse_count(MAIL_PER_CONNECTION, &value)?;
        }

        Ok(config)
    }
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            field,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

fn parse_count(field: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|err| ConfigError::Invalid {
        field,
        reason: format!("'{value}': {err}"),
    })
}

mod defaults {
    pub fn mail_host() -> String {
        String::from("localhost")
    }

    pub const fn retry() -> u32 {
        3
    }

    pub const fn mail_per_connection() -> u32 {
        100
    }

    pub fn helo_name() -> String {
        String::from("localhost")
    }
}
