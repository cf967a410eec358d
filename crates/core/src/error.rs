// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for chime-core operations.

use thiserror::Error;

/// Errors raised while decoding wire data or server records.
///
/// All of these are protocol-level: the engine logs and drops the offending
/// frame or record and keeps the session alive.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed packet: '{0}'")]
    MalformedPacket(String),

    #[error("unknown packet kind: '{0}'")]
    UnknownPacketKind(String),

    #[error("invalid handshake response: {0}")]
    InvalidHandshake(String),

    #[error("missing field '{field}' in {context}")]
    MissingField {
        field: String,
        context: &'static str,
    },

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn missing(field: &str, context: &'static str) -> Self {
        Error::MissingField {
            field: field.to_string(),
            context,
        }
    }
}

/// A specialized Result type for chime-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
