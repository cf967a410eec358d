// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Host messaging collaborator.
//!
//! The engine never renders anything itself: inbound messages, notices and
//! failures are handed to a [`Host`]. Calls are fire-and-forget.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::Error;
use crate::jugg::QueuedMessage;

/// Where a message belongs on the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One-to-one conversation, identified by the peer's email.
    Im { peer_email: String },
    /// Multi-party conversation or room.
    Chat { chat_id: String },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Im { peer_email } => write!(f, "im:{}", peer_email),
            Target::Chat { chat_id } => write!(f, "chat:{}", chat_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Written by someone else.
    Received,
    /// Written by this account, possibly from another client.
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    /// An image stored at the given path.
    Image(PathBuf),
    /// Informational notice.
    System,
    /// Error notice.
    Error,
}

/// A message to be written into a host conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMessage {
    pub target: Target,
    /// Email (or profile id when unknown) of the author; empty for notices.
    pub from: String,
    pub body: String,
    pub kind: MessageKind,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
}

/// Callback surface implemented by the embedding application.
pub trait Host: Send + Sync {
    /// Writes a message or notice into a conversation.
    fn write_message(&self, message: HostMessage);

    /// Reports a queued message that was given up on.
    fn delivery_failed(&self, message: &QueuedMessage, error: &Error);

    /// Reports loss of the real-time channel. The session is over.
    fn connection_error(&self, error: &Error);
}

/// Writes a conversation message, applying the self-echo rule.
///
/// In an IM, a message whose author is not the peer can only have been
/// written by this account on another client, so it is injected as sent.
pub fn write_conversation_message(
    host: &dyn Host,
    target: Target,
    from: &str,
    body: String,
    kind: MessageKind,
    timestamp: DateTime<Utc>,
) {
    let direction = match &target {
        Target::Im { peer_email } if peer_email != from => Direction::Sent,
        _ => Direction::Received,
    };

    host.write_message(HostMessage {
        target,
        from: from.to_string(),
        body,
        kind,
        direction,
        timestamp,
    });
}

/// Writes a system or error notice into a conversation.
pub fn system_message(host: &dyn Host, target: Target, body: String, is_error: bool) {
    host.write_message(HostMessage {
        target,
        from: String::new(),
        body,
        kind: if is_error {
            MessageKind::Error
        } else {
            MessageKind::System
        },
        direction: Direction::Received,
        timestamp: Utc::now(),
    });
}

/// Host that writes everything to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl Host for LogHost {
    fn write_message(&self, message: HostMessage) {
        match message.kind {
            MessageKind::Error => warn!(target: "chime::host", to = %message.target, "{}", message.body),
            MessageKind::System => info!(target: "chime::host", to = %message.target, "{}", message.body),
            MessageKind::Image(ref path) => info!(
                target: "chime::host",
                to = %message.target,
                from = %message.from,
                "[image {}]",
                path.display()
            ),
            MessageKind::Text => info!(
                target: "chime::host",
                to = %message.target,
                from = %message.from,
                sent = message.direction == Direction::Sent,
                "{}",
                message.body
            ),
        }
    }

    fn delivery_failed(&self, message: &QueuedMessage, error: &Error) {
        warn!(target: "chime::host", id = %message.correlation_id, "{}", error);
    }

    fn connection_error(&self, error: &Error) {
        error!(target: "chime::host", "{}", error);
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
