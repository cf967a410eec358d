// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Juggernaut session state machine.
//!
//! Owns the transport, the subscription registry, the resubmission queue and
//! the entity caches. Every method is called from the single session loop
//! ([`super::Runner`]); nothing here is shared across tasks.
//!
//! ```text
//! Disconnected ──connect──► Connecting ──ok──► Connected
//!                               │                  │ remote close
//!                               │ err              ▼
//!                               └──────────► Reconnecting ──connect──► ...
//!
//! reconnect attempt fails ──► Failed (fatal, no further retry)
//! explicit shutdown       ──► Disconnected
//! ```

use std::sync::Arc;
use std::time::Duration;

use chime_core::{Frame, FrameType};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::queue::{QueuedMessage, ResubmissionQueue};
use super::registry::{ReplayMode, SubscribeOutcome, SubscriptionRegistry, UnsubscribeOutcome};
use super::transport::{Endpoint, Transport, TransportError, TransportResult};
use crate::attachments::{self, Download, DownloadOutcome};
use crate::cache::Caches;
use crate::dispatch::{self, Account, ChannelHandler, Dispatcher, Effect};
use crate::error::{Error, Result};
use crate::fetch::{EntityKind, FetchResult};
use crate::host::Host;

/// State of the Juggernaut connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting the first connection.
    Connecting,
    /// Connected to the service.
    Connected,
    /// Waiting to retry after a failed attempt or a lost connection.
    Reconnecting { attempt: u32 },
    /// The channel could not be re-established; the session is over.
    Failed,
}

/// Exponential backoff for connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Give up the initial connect after this many failures (0 = unlimited).
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            max_retries: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// What the loop should do after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Connected; nothing to schedule.
    Connected,
    /// Call [`Session::connect`] again after the delay.
    Retry(Duration),
    /// Stopped on request.
    Shutdown,
    /// The channel is lost for good.
    Fatal,
}

/// Why the transport went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed locally.
    Shutdown,
    /// Closed by the server or the network.
    Remote(String),
}

/// Completed background work, delivered back to the loop.
#[derive(Debug)]
pub enum Completion {
    Entity {
        kind: EntityKind,
        id: String,
        result: FetchResult<Value>,
    },
    Download {
        download: Download,
        outcome: DownloadOutcome,
    },
}

pub struct Session<T: Transport> {
    endpoint: Endpoint,
    transport: T,
    state: ConnectionState,
    /// True once the current connection has been established; a close while
    /// this is false aborts instead of reconnecting.
    jugg_connected: bool,
    /// After a reconnect, subscriptions are replayed as `resubscribe`.
    jugg_resubscribe: bool,
    attempt: u32,
    policy: ReconnectPolicy,
    registry: SubscriptionRegistry<ChannelHandler>,
    queue: ResubmissionQueue,
    caches: Caches,
    account: Account,
    host: Arc<dyn Host>,
    effects: Vec<Effect>,
    /// Set when a send or receive found the connection gone.
    lost: Option<String>,
    failure: Option<String>,
}

impl<T: Transport> Session<T> {
    /// Creates a disconnected session subscribed to its own channels.
    pub fn new(
        info: &chime_core::Session,
        transport: T,
        queue: ResubmissionQueue,
        policy: ReconnectPolicy,
        account: Account,
        host: Arc<dyn Host>,
    ) -> Self {
        let mut registry = SubscriptionRegistry::new();
        if let Some(channel) = &info.device_channel {
            registry.subscribe(channel, ChannelHandler::Device);
        }
        if let Some(channel) = &info.profile_channel {
            registry.subscribe(channel, ChannelHandler::Profile);
        }
        if let Some(channel) = &info.presence_channel {
            registry.subscribe(channel, ChannelHandler::Presence(info.profile_id.clone()));
        }

        Session {
            endpoint: Endpoint::new(&info.endpoints.websocket, &info.token),
            transport,
            state: ConnectionState::Disconnected,
            jugg_connected: false,
            jugg_resubscribe: false,
            attempt: 0,
            policy,
            registry,
            queue,
            caches: Caches::default(),
            account,
            host,
            effects: Vec::new(),
            lost: None,
            failure: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.transport.is_connected()
    }

    pub fn registry(&self) -> &SubscriptionRegistry<ChannelHandler> {
        &self.registry
    }

    pub fn queue(&self) -> &ResubmissionQueue {
        &self.queue
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Takes the effects the loop has to run in the background.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Why the session entered [`ConnectionState::Failed`].
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Takes the reason the connection was found lost, if it was.
    pub fn take_lost(&mut self) -> Option<String> {
        self.lost.take()
    }

    /// Opens the transport and replays subscriptions and queued messages.
    pub async fn connect(&mut self) -> Transition {
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Connecting;
        }

        match self.transport.connect(&self.endpoint).await {
            Ok(()) => {
                let mode = if self.jugg_resubscribe {
                    ReplayMode::Resubscribe
                } else {
                    ReplayMode::Subscribe
                };
                info!(resume = self.jugg_resubscribe, "juggernaut connected");
                self.state = ConnectionState::Connected;
                self.jugg_connected = true;
                self.attempt = 0;

                for frame in self.registry.replay(mode) {
                    if !self.send_frame(frame).await {
                        return Transition::Connected;
                    }
                }
                self.flush_queue().await;
                Transition::Connected
            }
            Err(e) if self.jugg_resubscribe => {
                self.fail(format!("reconnect failed: {}", e));
                Transition::Fatal
            }
            Err(e) => {
                self.attempt += 1;
                if self.policy.max_retries > 0 && self.attempt >= self.policy.max_retries {
                    self.fail(format!("gave up after {} attempts: {}", self.attempt, e));
                    return Transition::Fatal;
                }
                let delay = self.policy.delay_for(self.attempt);
                warn!(attempt = self.attempt, ?delay, error = %e, "connect failed, retrying");
                self.state = ConnectionState::Reconnecting {
                    attempt: self.attempt,
                };
                Transition::Retry(delay)
            }
        }
    }

    /// Reacts to the transport going away.
    pub async fn on_transport_closed(&mut self, reason: CloseReason) -> Transition {
        self.lost = None;
        match reason {
            CloseReason::Shutdown => {
                let _ = self.transport.disconnect().await;
                for id in self.caches.held_conversations() {
                    self.release_held(&id);
                }
                let cancelled = self.caches.cancel_pending();
                debug!(cancelled, "session shut down");
                self.state = ConnectionState::Disconnected;
                self.jugg_connected = false;
                self.effects.clear();
                Transition::Shutdown
            }
            CloseReason::Remote(why) if self.jugg_connected => {
                warn!(reason = %why, "juggernaut connection lost, reconnecting");
                let _ = self.transport.disconnect().await;
                self.jugg_connected = false;
                self.jugg_resubscribe = true;
                self.state = ConnectionState::Reconnecting { attempt: 1 };
                Transition::Retry(Duration::ZERO)
            }
            CloseReason::Remote(why) => {
                self.fail(format!("connection closed before it was established: {}", why));
                Transition::Fatal
            }
        }
    }

    /// Stops the session.
    pub async fn shutdown(&mut self) -> Transition {
        info!("shutting down");
        self.on_transport_closed(CloseReason::Shutdown).await
    }

    fn fail(&mut self, reason: String) {
        error!(%reason, "juggernaut connection failed");
        self.state = ConnectionState::Failed;
        self.jugg_connected = false;
        self.caches.cancel_pending();
        self.effects.clear();
        self.host.connection_error(&Error::ReconnectFailed(reason.clone()));
        self.failure = Some(reason);
    }

    /// Receives the next frame from the transport.
    pub async fn recv(&mut self) -> TransportResult<Option<Frame>> {
        self.transport.recv().await
    }

    /// Handles the result of [`Session::recv`].
    pub async fn handle_recv(&mut self, result: TransportResult<Option<Frame>>) {
        match result {
            Ok(Some(frame)) => self.handle_frame(frame).await,
            Ok(None) => self.lost = Some("closed by server".to_string()),
            Err(e) if e.is_recoverable() => warn!(error = %e, "dropping malformed packet"),
            Err(e) => self.lost = Some(e.to_string()),
        }
    }

    /// Routes one inbound frame.
    pub async fn handle_frame(&mut self, frame: Frame) {
        debug!(kind = %frame.kind, channel = %frame.channel, "frame");
        match frame.kind {
            FrameType::Ack => match frame.correlation_id() {
                Some(id) => match self.queue.acknowledge(id) {
                    Ok(true) => debug!(id, "message acknowledged"),
                    Ok(false) => debug!(id, "ack for unknown message"),
                    Err(e) => warn!(id, error = %e, "failed to persist acknowledgment"),
                },
                None => warn!(channel = %frame.channel, "ack without correlation id"),
            },
            FrameType::Event => {
                let Some(handler) = self.registry.handler(&frame.channel).cloned() else {
                    warn!(channel = %frame.channel, "event for unknown channel");
                    return;
                };
                let data = frame.data.unwrap_or(Value::Null);
                let mut dispatcher = Dispatcher {
                    account: &self.account,
                    caches: &mut self.caches,
                    queue: &mut self.queue,
                    host: self.host.as_ref(),
                    effects: &mut self.effects,
                };
                if let Err(e) = dispatcher.handle_event(&handler, &data) {
                    warn!(channel = %frame.channel, error = %e, "dropping malformed event");
                }
                self.apply_subscription_effects().await;
            }
            other => debug!(kind = %other, "ignoring control frame from server"),
        }
    }

    /// Registers interest in a channel, subscribing on the server if new.
    pub async fn subscribe(&mut self, channel: &str, handler: ChannelHandler) {
        match self.registry.subscribe(channel, handler) {
            SubscribeOutcome::New if self.is_connected() => {
                self.send_frame(Frame::subscribe(channel)).await;
            }
            SubscribeOutcome::New => {}
            SubscribeOutcome::Existing { interest } => {
                debug!(channel, interest, "already subscribed");
            }
        }
    }

    /// Drops interest in a channel, unsubscribing on the server at zero.
    pub async fn unsubscribe(&mut self, channel: &str) {
        match self.registry.unsubscribe(channel) {
            UnsubscribeOutcome::Removed if self.is_connected() => {
                self.send_frame(Frame::unsubscribe(channel)).await;
            }
            UnsubscribeOutcome::Removed => {}
            UnsubscribeOutcome::Remaining { interest } => {
                debug!(channel, interest, "still subscribed");
            }
            UnsubscribeOutcome::NotSubscribed => debug!(channel, "not subscribed"),
        }
    }

    /// Queues a message and sends it right away if connected.
    ///
    /// Returns the correlation id.
    pub async fn send_message(&mut self, target: &str, body: &str) -> Result<String> {
        let id = self.queue.enqueue(target, body, None)?;
        if self.is_connected() && self.send_frame(Frame::message(target, &id, body)).await {
            self.queue.mark_sent(&id)?;
        }
        Ok(id)
    }

    /// Withdraws a queued message.
    pub fn cancel_message(&mut self, correlation_id: &str) -> Result<bool> {
        Ok(self.queue.cancel(correlation_id)?)
    }

    /// Applies the result of a background fetch or download.
    pub async fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Entity { kind, id, result } => {
                let effects = match result {
                    Ok(record) => {
                        dispatch::complete_fetch(&mut self.caches, &self.account, kind, &id, &record)
                    }
                    Err(e) => {
                        warn!(%kind, %id, error = %e, "lookup failed");
                        Ok(Vec::new())
                    }
                };
                match effects {
                    Ok(effects) => self.effects.extend(effects),
                    Err(e) => warn!(%kind, %id, error = %e, "invalid record"),
                }
                self.release_pending(kind, &id);
                if kind == EntityKind::Conversation {
                    self.release_held(&id);
                }
                self.apply_subscription_effects().await;
            }
            Completion::Download { download, outcome } => {
                attachments::report(self.host.as_ref(), download, outcome);
            }
        }
    }

    fn release_held(&mut self, conversation_id: &str) {
        let mut dispatcher = Dispatcher {
            account: &self.account,
            caches: &mut self.caches,
            queue: &mut self.queue,
            host: self.host.as_ref(),
            effects: &mut self.effects,
        };
        dispatcher.release_held(conversation_id);
    }

    fn release_pending(&mut self, kind: EntityKind, id: &str) {
        match kind {
            EntityKind::Contact => self.caches.contacts.fail(id),
            EntityKind::Room => self.caches.rooms.fail(id),
            EntityKind::Conversation => self.caches.conversations.fail(id),
        };
    }

    /// Performs subscription changes requested by the dispatcher; other
    /// effects stay queued for the loop.
    async fn apply_subscription_effects(&mut self) {
        let effects = std::mem::take(&mut self.effects);
        let mut remaining = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                Effect::Subscribe { channel, handler } => {
                    if !self.registry.contains(&channel) {
                        self.subscribe(&channel, handler).await;
                    }
                }
                Effect::Unsubscribe { channel } => self.unsubscribe(&channel).await,
                other => remaining.push(other),
            }
        }
        self.effects.extend(remaining);
    }

    /// Resends pending messages and reports those out of attempts.
    async fn flush_queue(&mut self) {
        let flush = match self.queue.flush() {
            Ok(flush) => flush,
            Err(e) => {
                warn!(error = %e, "failed to flush queue");
                return;
            }
        };

        for message in flush.failed {
            self.report_failed(&message);
        }
        for message in flush.resend {
            let frame = Frame::message(&message.target, &message.correlation_id, &message.body);
            if !self.send_frame(frame).await {
                break;
            }
            if let Err(e) = self.queue.mark_sent(&message.correlation_id) {
                warn!(id = %message.correlation_id, error = %e, "failed to record send attempt");
            }
        }
    }

    fn report_failed(&self, message: &QueuedMessage) {
        let error = Error::DeliveryFailure {
            correlation_id: message.correlation_id.clone(),
            target: message.target.clone(),
            attempts: message.attempts,
        };
        warn!(%error, "giving up on message");
        self.host.delivery_failed(message, &error);
    }

    /// Sends a frame; on failure records the connection as lost.
    async fn send_frame(&mut self, frame: Frame) -> bool {
        debug!(kind = %frame.kind, channel = %frame.channel, "send");
        match self.transport.send(frame).await {
            Ok(()) => true,
            Err(e) => {
                if !matches!(e, TransportError::Protocol(_)) {
                    self.lost = Some(e.to_string());
                }
                warn!(error = %e, "send failed");
                false
            }
        }
    }
}
