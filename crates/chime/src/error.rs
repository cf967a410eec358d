// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::fetch::FetchError;
use crate::jugg::{QueueError, TransportError};

/// All errors surfaced by the chime engine.
///
/// Only [`Error::ReconnectFailed`] ends a session; everything else is logged
/// or reported to the host and the session keeps running.
#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    #[error("could not re-establish the push channel: {0}\n  hint: check connectivity and restart the session")]
    ReconnectFailed(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] chime_core::Error),

    #[error("{0}")]
    Resource(String),

    #[error("message {correlation_id} to {target} not delivered after {attempts} attempts")]
    DeliveryFailure {
        correlation_id: String,
        target: String,
        attempts: u32,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session is not running")]
    SessionClosed,
}

impl Error {
    /// Returns true for errors that end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ReconnectFailed(_) | Error::SessionClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
