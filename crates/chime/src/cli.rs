// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parses `KEY=VALUE` with a non-empty key and value.
fn key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !value.is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[derive(Parser, Debug)]
#[command(name = "chime")]
#[command(about = "Headless client for the Chime chat service")]
#[command(version)]
pub struct Cli {
    /// Path to the config file (default: <config dir>/chime/chime.toml)
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and stay online, logging conversation traffic
    Run {
        /// Join a room channel: ROOM_ID=CHANNEL
        #[arg(long = "room", value_name = "ID=CHANNEL", value_parser = key_value)]
        rooms: Vec<(String, String)>,

        /// Join a conversation channel: CONVERSATION_ID=CHANNEL
        #[arg(long = "conversation", value_name = "ID=CHANNEL", value_parser = key_value)]
        conversations: Vec<(String, String)>,

        /// Send a message once connected: TARGET_ID=TEXT
        #[arg(long = "send", value_name = "TARGET=TEXT", value_parser = key_value)]
        messages: Vec<(String, String)>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the config file and the session it describes
    Check,

    /// Print the effective config with the session token redacted
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
