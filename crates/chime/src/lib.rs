// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! chime - Headless client engine for the Chime chat service.
//!
//! The engine keeps the Juggernaut push channel connected, routes its events
//! into the contact, room and conversation caches, and delivers outgoing
//! messages through a resubmission queue that survives reconnects.
//!
//! # Main Components
//!
//! - [`jugg`] - push channel transport, subscription registry, resubmission
//!   queue, session state machine and the loop that drives them
//! - [`cache`] - entity caches with pending-fetch de-duplication
//! - [`dispatch`] - routing of channel events
//! - [`host`] - the surface messages are written to
//! - [`Config`] - TOML configuration
//! - [`Error`] - error taxonomy
//!
//! # Running a session
//!
//! ```rust,ignore
//! let (runner, handle) = Runner::new(session, directory, fetcher);
//! tokio::spawn(async move { handle.send_message("conv-1", "hello").await });
//! runner.run().await?;
//! ```

pub mod attachments;
pub mod cache;
pub mod cli;
mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod host;
pub mod jugg;

#[cfg(test)]
mod test_helpers;

pub use cli::{Cli, Command, ConfigCommand};
pub use config::Config;
pub use error::{Error, Result};

use commands::run::Startup;

/// Execute a CLI command.
pub async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(config::default_path);
    match cli.command {
        Command::Run {
            rooms,
            conversations,
            messages,
        } => {
            let startup = Startup {
                rooms,
                conversations,
                messages,
            };
            commands::run::run(&path, startup).await
        }
        Command::Config(cmd) => commands::config::run(&path, cmd),
    }
}
