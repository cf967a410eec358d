// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is stored in `chime.toml` and includes:
//! - `[session]`: the registered session, inline or as a path to a saved
//!   device-registration document
//! - `[reconnect]`: backoff for the push channel
//! - `[queue]`: send attempt budget and optional journal
//! - `[downloads]`: where attachments are stored

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chime_core::{ServiceEndpoints, Session};

use crate::attachments::ATTACHMENT_MAX_SIZE;
use crate::error::{Error, Result};
use crate::jugg::{ReconnectPolicy, DEFAULT_MAX_SEND_ATTEMPTS};

const CONFIG_DIR_NAME: &str = "chime";
const CONFIG_FILE_NAME: &str = "chime.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

/// The session to run as.
///
/// Either `registration` points at a saved device-registration response, or
/// the fields are given inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<ServiceEndpoints>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first retry in milliseconds (default: 500).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the retry delay in seconds (default: 60).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Give up the initial connect after this many attempts (default: 10). 0 = unlimited.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Times a message is sent before it is given up on (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Optional JSONL file keeping unacknowledged messages across restarts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_attempts: default_max_attempts(),
            journal: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Base directory; files land in `<dir>/<email>/downloads`.
    #[serde(default = "default_downloads_dir")]
    pub dir: PathBuf,
    /// Largest attachment fetched, in bytes (default: 50000000).
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size: u64,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        DownloadsConfig {
            dir: default_downloads_dir(),
            max_attachment_size: default_max_attachment_size(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_SEND_ATTEMPTS
}

fn default_downloads_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

fn default_max_attachment_size() -> u64 {
    ATTACHMENT_MAX_SIZE
}

/// Default location of the config file: `<config dir>/chime/chime.toml`.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Saves the config, creating its parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks the config for values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_attempts == 0 {
            return Err(Error::Config(
                "queue.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.reconnect.initial_delay_ms == 0 {
            return Err(Error::Config(
                "reconnect.initial_delay_ms must be at least 1".to_string(),
            ));
        }
        if self.session.registration.is_some() {
            return Ok(());
        }

        if self.session.token.is_empty() {
            return Err(Error::Config(
                "session.token is required\n  hint: set session.token or session.registration"
                    .to_string(),
            ));
        }
        if self.session.email.is_empty() || self.session.profile_id.is_empty() {
            return Err(Error::Config(
                "session.email and session.profile_id are required".to_string(),
            ));
        }
        let Some(endpoints) = &self.session.endpoints else {
            return Err(Error::Config(
                "session.endpoints is required\n  hint: at least session.endpoints.websocket must be set"
                    .to_string(),
            ));
        };
        validate_endpoints(endpoints)
    }

    /// Builds the session, reading the registration document if configured.
    pub fn session(&self) -> Result<Session> {
        if let Some(path) = &self.session.registration {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::Config(format!(
                    "failed to read registration {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let doc: serde_json::Value = serde_json::from_str(&content)?;
            let session = Session::from_registration(&doc)?;
            validate_endpoints(&session.endpoints)?;
            return Ok(session);
        }

        self.validate()?;
        let s = &self.session;
        Ok(Session {
            token: s.token.clone(),
            session_id: None,
            profile_id: s.profile_id.clone(),
            email: s.email.clone(),
            profile_channel: s.profile_channel.clone(),
            presence_channel: s.presence_channel.clone(),
            device_id: s.device_id.clone(),
            device_channel: s.device_channel.clone(),
            endpoints: s.endpoints.clone().unwrap_or_default(),
        })
    }

    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_secs(self.reconnect.max_delay_secs),
            max_retries: self.reconnect.max_retries,
        }
    }
}

fn validate_endpoints(endpoints: &ServiceEndpoints) -> Result<()> {
    if endpoints.websocket.is_empty() {
        return Err(Error::Config("endpoints.websocket is required".to_string()));
    }
    for (name, url) in endpoints.iter() {
        let valid = ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| url.starts_with(scheme));
        if !valid {
            return Err(Error::Config(format!(
                "invalid {} endpoint '{}'\n  hint: endpoints must be http(s):// or ws(s):// URLs",
                name, url
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
