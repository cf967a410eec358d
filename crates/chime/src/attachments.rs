// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Attachment download and display.
//!
//! Files attached to messages are fetched into
//! `<downloads>/<account email>/downloads/<message id>-<file name>` and then
//! announced in the conversation they arrived in: images inline, other files
//! as a link.

use std::path::{Path, PathBuf};

use chime_core::record::parse_string;
use chime_core::Attachment;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;
use crate::fetch::Fetcher;
use crate::host::{self, Host, MessageKind, Target};

/// Largest attachment that will be downloaded, in bytes.
pub const ATTACHMENT_MAX_SIZE: u64 = 50_000_000;

/// Extracts the attachment of a message record, if it has one.
pub fn extract_attachment(record: &Value) -> chime_core::Result<Option<Attachment>> {
    let Some(node) = record.get("Attachment").filter(|n| !n.is_null()) else {
        return Ok(None);
    };

    Ok(Some(Attachment {
        message_id: parse_string(record, "MessageId", "message record")?.to_string(),
        filename: parse_string(node, "FileName", "attachment")?.to_string(),
        url: parse_string(node, "Url", "attachment")?.to_string(),
        content_type: parse_string(node, "ContentType", "attachment")?.to_string(),
    }))
}

/// Directory that receives an account's downloads.
pub fn download_dir(base: &Path, email: &str) -> PathBuf {
    base.join(email).join("downloads")
}

/// A pending attachment download and where to announce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub attachment: Attachment,
    /// Destination directory; created before fetching.
    pub dir: PathBuf,
    pub target: Target,
    /// Author of the message carrying the attachment.
    pub from: String,
    pub timestamp: DateTime<Utc>,
}

impl Download {
    pub fn new(
        attachment: Attachment,
        dir: PathBuf,
        target: Target,
        from: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Download {
            attachment,
            dir,
            target,
            from,
            timestamp,
        }
    }

    /// Final path of the downloaded file, always directly inside `dir`.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}-{}",
            path_component(&self.attachment.message_id),
            path_component(&self.attachment.filename)
        ))
    }
}

/// How a download ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Stored(PathBuf),
    DirFailed(String),
    FetchFailed(String),
    Empty,
    WriteFailed(String),
}

/// Replaces path separators so a server-supplied name stays one component.
fn path_component(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Fetches an attachment and writes it to disk.
///
/// Runs off the session loop; the outcome is reported with [`report`].
pub async fn fetch_and_store(
    fetcher: &dyn Fetcher,
    download: &Download,
    max_size: u64,
) -> DownloadOutcome {
    if let Err(e) = tokio::fs::create_dir_all(&download.dir).await {
        warn!(dir = %download.dir.display(), error = %e, "cannot create download dir");
        return DownloadOutcome::DirFailed(e.to_string());
    }

    let bytes = match fetcher.fetch(&download.attachment.url, max_size).await {
        Ok(bytes) => bytes,
        Err(e) => return DownloadOutcome::FetchFailed(e.to_string()),
    };
    if bytes.is_empty() {
        return DownloadOutcome::Empty;
    }

    let path = download.path();
    match tokio::fs::write(&path, &bytes).await {
        Ok(()) => {
            debug!(path = %path.display(), size = bytes.len(), "attachment stored");
            DownloadOutcome::Stored(path)
        }
        Err(e) => DownloadOutcome::WriteFailed(format!("{}: {}", path.display(), e)),
    }
}

impl DownloadOutcome {
    /// The error behind a failed download, if it failed.
    pub fn error(&self) -> Option<Error> {
        match self {
            DownloadOutcome::Stored(_) => None,
            DownloadOutcome::DirFailed(e) => Some(Error::Resource(format!(
                "could not create download dir: {}",
                e
            ))),
            DownloadOutcome::FetchFailed(e) => Some(Error::Resource(format!("fetch failed: {}", e))),
            DownloadOutcome::Empty => Some(Error::Resource("empty download".to_string())),
            DownloadOutcome::WriteFailed(e) => Some(Error::Resource(format!("write failed: {}", e))),
        }
    }
}

/// Announces a finished download in its conversation.
pub fn report(host: &dyn Host, download: Download, outcome: DownloadOutcome) {
    if let Some(error) = outcome.error() {
        warn!(file = %download.attachment.filename, %error, "attachment download failed");
    }
    let target = download.target.clone();
    match outcome {
        DownloadOutcome::Stored(path) if download.attachment.is_image() => {
            host::write_conversation_message(
                host,
                target,
                &download.from,
                download.attachment.filename.clone(),
                MessageKind::Image(path),
                download.timestamp,
            );
        }
        DownloadOutcome::Stored(path) => {
            let body = format!(
                "{} has attached <a href=\"file://{}\">{}</a>",
                download.from,
                path.display(),
                download.attachment.filename
            );
            host::system_message(host, target, body, false);
        }
        DownloadOutcome::DirFailed(_) => {
            let body = format!(
                "Could not make dir {}, will not fetch file/image",
                download.dir.display()
            );
            host::system_message(host, target, body, true);
        }
        DownloadOutcome::Empty => {
            host::system_message(host, target, "Downloaded empty contents.".to_string(), true);
        }
        DownloadOutcome::FetchFailed(error) | DownloadOutcome::WriteFailed(error) => {
            host::system_message(host, target, error, true);
        }
    }
}

#[cfg(test)]
#[path = "attachments_tests.rs"]
mod tests;
