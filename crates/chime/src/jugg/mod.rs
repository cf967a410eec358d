// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Juggernaut push channel.
//!
//! Keeps a websocket session to the push service alive, tracks which
//! channels are subscribed, and holds outgoing messages until the server
//! acknowledges them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    Runner    │────►│  Transport  │────►│ Juggernaut  │
//! │ (event loop) │◄────│   (trait)   │◄────│   server    │
//! └──────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Session    │────►│   Registry   │     │    Queue     │
//! │ (state mach.)│────►│  (channels)  │     │ (resubmit)   │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! # Features
//!
//! - Socket.IO-style handshake followed by a websocket upgrade
//! - Initial connect retried with exponential backoff
//! - One immediate reconnect after a lost connection, replaying
//!   subscriptions as `resubscribe`
//! - Reference-counted channel subscriptions
//! - Resubmission queue with an attempt budget, optionally journaled to disk
//! - Injectable transport trait for testing

mod queue;
mod registry;
mod runner;
mod session;
mod transport;

pub use queue::{Flush, QueueError, QueueResult, QueuedMessage, ResubmissionQueue};
pub use queue::DEFAULT_MAX_SEND_ATTEMPTS;
pub use registry::{ReplayMode, SubscribeOutcome, SubscriptionRegistry, UnsubscribeOutcome};
pub use runner::{Command, Runner, SessionHandle};
pub use session::{
    CloseReason, Completion, ConnectionState, ReconnectPolicy, Session, Transition,
};
pub use transport::{
    Endpoint, Transport, TransportError, TransportResult, WebSocketTransport,
};

#[cfg(test)]
pub(crate) mod test_helpers;
