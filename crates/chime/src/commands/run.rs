// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{Account, ChannelHandler};
use crate::error::Result;
use crate::fetch::{HttpDirectory, HttpFetcher};
use crate::host::{Host, LogHost};
use crate::jugg::{ResubmissionQueue, Runner, Session, SessionHandle, WebSocketTransport};

/// Channels to join and messages to send once the session is up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Startup {
    pub rooms: Vec<(String, String)>,
    pub conversations: Vec<(String, String)>,
    pub messages: Vec<(String, String)>,
}

/// Runs a session until interrupted or until the push channel is lost.
pub async fn run(path: &Path, startup: Startup) -> Result<()> {
    let config = Config::load(path)?;
    let info = config.session()?;

    let queue = match &config.queue.journal {
        Some(journal) => ResubmissionQueue::open(journal, config.queue.max_attempts)?,
        None => ResubmissionQueue::new(config.queue.max_attempts),
    };
    if !queue.is_empty() {
        info!(pending = queue.len(), "restored queued messages");
    }

    let account = Account::new(
        &info,
        &config.downloads.dir,
        config.downloads.max_attachment_size,
    );
    let http = reqwest::Client::new();
    let host: Arc<dyn Host> = Arc::new(LogHost);
    let session = Session::new(
        &info,
        WebSocketTransport::new(http.clone()),
        queue,
        config.policy(),
        account,
        host,
    );
    let directory = Arc::new(HttpDirectory::new(
        http.clone(),
        info.endpoints.clone(),
        info.token.clone(),
    ));
    let fetcher = Arc::new(HttpFetcher::new(http));
    let (runner, handle) = Runner::new(session, directory, fetcher);

    let setup = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = apply(&setup, startup).await {
            warn!(error = %e, "startup commands failed");
        }
    });

    let stop = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            let _ = stop.shutdown().await;
        }
    });

    info!(email = %info.email, push = %info.endpoints.websocket, "starting session");
    runner.run().await
}

/// Issues the startup subscriptions and messages.
pub async fn apply(handle: &SessionHandle, startup: Startup) -> Result<()> {
    for (room_id, channel) in startup.rooms {
        handle
            .subscribe(&channel, ChannelHandler::Room(room_id))
            .await?;
    }
    for (conversation_id, channel) in startup.conversations {
        handle
            .subscribe(&channel, ChannelHandler::Conversation(conversation_id))
            .await?;
    }
    for (target, body) in startup.messages {
        let id = handle.send_message(&target, &body).await?;
        info!(%target, correlation_id = %id, "message queued");
    }
    Ok(())
}
