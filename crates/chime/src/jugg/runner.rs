// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The session loop.
//!
//! A [`Runner`] owns the [`Session`] and is the only task that touches it.
//! Callers talk to it through a cloneable [`SessionHandle`]; lookups and
//! downloads run as spawned tasks whose results come back over a channel and
//! are applied on the loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{CloseReason, Completion, ConnectionState, Session, Transition};
use super::transport::Transport;
use crate::attachments;
use crate::dispatch::{ChannelHandler, Effect};
use crate::error::{Error, Result};
use crate::fetch::{Directory, Fetcher};

const COMMAND_BUFFER: usize = 64;

/// Requests sent to the session loop.
#[derive(Debug)]
pub enum Command {
    Subscribe {
        channel: String,
        handler: ChannelHandler,
    },
    Unsubscribe {
        channel: String,
    },
    SendMessage {
        target: String,
        body: String,
        reply: oneshot::Sender<Result<String>>,
    },
    CancelMessage {
        correlation_id: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    State {
        reply: oneshot::Sender<ConnectionState>,
    },
    Shutdown,
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Subscribes to a channel.
    pub async fn subscribe(&self, channel: &str, handler: ChannelHandler) -> Result<()> {
        self.send(Command::Subscribe {
            channel: channel.to_string(),
            handler,
        })
        .await
    }

    pub async fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.send(Command::Unsubscribe {
            channel: channel.to_string(),
        })
        .await
    }

    /// Queues a message for `target`, returning its correlation id.
    pub async fn send_message(&self, target: &str, body: &str) -> Result<String> {
        self.request(|reply| Command::SendMessage {
            target: target.to_string(),
            body: body.to_string(),
            reply,
        })
        .await?
    }

    /// Withdraws a queued message; false if it was already acknowledged.
    pub async fn cancel_message(&self, correlation_id: &str) -> Result<bool> {
        self.request(|reply| Command::CancelMessage {
            correlation_id: correlation_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn state(&self) -> Result<ConnectionState> {
        self.request(|reply| Command::State { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

pub struct Runner<T: Transport> {
    session: Session<T>,
    directory: Arc<dyn Directory>,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    /// When the next connection attempt is due.
    retry_at: Option<Instant>,
}

impl<T: Transport> Runner<T> {
    pub fn new(
        session: Session<T>,
        directory: Arc<dyn Directory>,
        fetcher: Arc<dyn Fetcher>,
    ) -> (Self, SessionHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let runner = Runner {
            session,
            directory,
            fetcher,
            cancel: CancellationToken::new(),
            commands,
            completions_tx,
            completions_rx,
            retry_at: Some(Instant::now()),
        };
        (runner, SessionHandle { commands: tx })
    }

    /// Token that stops the loop when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Runs until shutdown or until the connection is lost for good.
    pub async fn run(mut self) -> Result<()> {
        info!("session started");
        loop {
            let connected = self.session.is_connected();
            let retry_at = self.retry_at;

            let transition = tokio::select! {
                _ = self.cancel.cancelled() => Some(self.session.shutdown().await),
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => Some(self.session.shutdown().await),
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.session.complete(completion).await;
                    None
                }
                result = self.session.recv(), if connected => {
                    self.session.handle_recv(result).await;
                    None
                }
                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)),
                    if retry_at.is_some() =>
                {
                    self.retry_at = None;
                    Some(self.session.connect().await)
                }
            };

            self.spawn_effects();

            let mut transition = transition;
            if let Some(reason) = self.session.take_lost() {
                if transition.is_none() || transition == Some(Transition::Connected) {
                    transition = Some(
                        self.session
                            .on_transport_closed(CloseReason::Remote(reason))
                            .await,
                    );
                }
            }

            match transition {
                None | Some(Transition::Connected) => {}
                Some(Transition::Retry(delay)) => {
                    debug!(?delay, "next connection attempt scheduled");
                    self.retry_at = Some(Instant::now() + delay);
                }
                Some(Transition::Shutdown) => {
                    self.cancel.cancel();
                    info!("session stopped");
                    return Ok(());
                }
                Some(Transition::Fatal) => {
                    self.cancel.cancel();
                    let reason = self
                        .session
                        .failure()
                        .unwrap_or("connection lost")
                        .to_string();
                    return Err(Error::ReconnectFailed(reason));
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Option<Transition> {
        match command {
            Command::Subscribe { channel, handler } => {
                self.session.subscribe(&channel, handler).await;
            }
            Command::Unsubscribe { channel } => self.session.unsubscribe(&channel).await,
            Command::SendMessage {
                target,
                body,
                reply,
            } => {
                let result = self.session.send_message(&target, &body).await;
                let _ = reply.send(result);
            }
            Command::CancelMessage {
                correlation_id,
                reply,
            } => {
                let _ = reply.send(self.session.cancel_message(&correlation_id));
            }
            Command::State { reply } => {
                let _ = reply.send(self.session.state());
            }
            Command::Shutdown => return Some(self.session.shutdown().await),
        }
        None
    }

    /// Starts background work requested while handling the last event.
    fn spawn_effects(&mut self) {
        for effect in self.session.take_effects() {
            let token = self.cancel.child_token();
            let tx = self.completions_tx.clone();
            match effect {
                Effect::Fetch { kind, id } => {
                    let directory = Arc::clone(&self.directory);
                    tokio::spawn(async move {
                        let result = tokio::select! {
                            _ = token.cancelled() => return,
                            result = directory.lookup(kind, &id) => result,
                        };
                        if !token.is_cancelled() {
                            let _ = tx.send(Completion::Entity { kind, id, result });
                        }
                    });
                }
                Effect::Download(download) => {
                    let fetcher = Arc::clone(&self.fetcher);
                    let max_size = self.session.account().max_attachment_size;
                    tokio::spawn(async move {
                        let outcome = tokio::select! {
                            _ = token.cancelled() => return,
                            outcome = attachments::fetch_and_store(fetcher.as_ref(), &download, max_size) => outcome,
                        };
                        if !token.is_cancelled() {
                            let _ = tx.send(Completion::Download { download, outcome });
                        }
                    });
                }
                other => warn!(?other, "unhandled effect"),
            }
        }
    }
}
