// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::error::{Error, Result};

const REDACTED: &str = "<redacted>";

/// Execute a config subcommand.
pub fn run(path: &Path, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Check => {
            let config = Config::load(path)?;
            let summary = check(&config)?;
            println!("{}: ok", path.display());
            println!("{}", summary);
            Ok(())
        }
        ConfigCommand::Show => {
            let config = Config::load(path)?;
            print!("{}", render(&config)?);
            Ok(())
        }
        ConfigCommand::Init { force } => {
            init(path, force)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

/// Validates a config and describes the session it resolves to.
pub fn check(config: &Config) -> Result<String> {
    config.validate()?;
    let session = config.session()?;
    Ok(format!(
        "session: {} ({})\npush: {}\nchannels: {}",
        session.email,
        session.profile_id,
        session.endpoints.websocket,
        session.own_channels().len()
    ))
}

/// Renders a config as TOML with the session token hidden.
pub fn render(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    if !shown.session.token.is_empty() {
        shown.session.token = REDACTED.to_string();
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))
}

/// Writes a default config, refusing to overwrite unless forced.
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists\n  hint: pass --force to overwrite it",
            path.display()
        )));
    }
    Config::default().save(path)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
