// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Resubmission queue for outgoing messages.
//!
//! Every outgoing message stays queued until the server acknowledges its
//! correlation id or the user cancels it. After a reconnect the remaining
//! entries are resent in enqueue order.
//!
//! The queue can optionally be journaled to a JSONL file, one message per
//! line, rewritten and fsynced on every change so pending messages survive a
//! restart.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of send attempts before a message is given up on.
pub const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 5;

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// An outgoing message awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub correlation_id: String,
    /// Conversation or room id the message is addressed to.
    pub target: String,
    pub body: String,
    pub enqueued_at: DateTime<Utc>,
    /// Number of times the message has been handed to the transport.
    pub attempts: u32,
}

/// Outcome of [`ResubmissionQueue::flush`].
#[derive(Debug, Default)]
pub struct Flush {
    /// Entries to resend, in enqueue order.
    pub resend: Vec<QueuedMessage>,
    /// Entries removed for exceeding the attempt budget.
    pub failed: Vec<QueuedMessage>,
}

/// Ordered queue of unacknowledged outgoing messages.
#[derive(Debug)]
pub struct ResubmissionQueue {
    entries: VecDeque<QueuedMessage>,
    next_id: u64,
    max_attempts: u32,
    journal: Option<PathBuf>,
}

impl ResubmissionQueue {
    /// Creates an in-memory queue.
    pub fn new(max_attempts: u32) -> Self {
        ResubmissionQueue {
            entries: VecDeque::new(),
            next_id: 1,
            max_attempts: max_attempts.max(1),
            journal: None,
        }
    }

    /// Creates or reopens a queue journaled at `path`.
    ///
    /// Entries found in the journal are restored in order and correlation ids
    /// continue after the highest numeric id seen.
    pub fn open(path: &Path, max_attempts: u32) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Ensure the file exists (create if not)
        OpenOptions::new().create(true).append(true).open(path)?;

        let reader = BufReader::new(File::open(path)?);
        let mut entries = VecDeque::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push_back(serde_json::from_str::<QueuedMessage>(&line)?);
        }

        let next_id = entries
            .iter()
            .filter_map(|m| m.correlation_id.parse::<u64>().ok())
            .max()
            .map_or(1, |id| id + 1);

        Ok(ResubmissionQueue {
            entries,
            next_id,
            max_attempts: max_attempts.max(1),
            journal: Some(path.to_path_buf()),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Appends a message and returns its correlation id.
    ///
    /// A fresh monotonically increasing id is assigned unless one is supplied.
    /// Enqueueing an id that is already queued is a no-op.
    pub fn enqueue(
        &mut self,
        target: &str,
        body: &str,
        correlation_id: Option<String>,
    ) -> QueueResult<String> {
        let correlation_id = match correlation_id {
            Some(id) if self.contains(&id) => return Ok(id),
            Some(id) => id,
            None => {
                let id = self.next_id.to_string();
                self.next_id += 1;
                id
            }
        };

        self.entries.push_back(QueuedMessage {
            correlation_id: correlation_id.clone(),
            target: target.to_string(),
            body: body.to_string(),
            enqueued_at: Utc::now(),
            attempts: 0,
        });
        self.persist()?;
        Ok(correlation_id)
    }

    /// Records one send attempt for a message.
    pub fn mark_sent(&mut self, correlation_id: &str) -> QueueResult<()> {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|m| m.correlation_id == correlation_id)
        {
            entry.attempts += 1;
            self.persist()?;
        }
        Ok(())
    }

    /// Removes the message acknowledged by the server.
    ///
    /// Returns false for unknown ids (already acknowledged or cancelled).
    pub fn acknowledge(&mut self, correlation_id: &str) -> QueueResult<bool> {
        self.remove(correlation_id)
    }

    /// Removes a message at the user's request.
    pub fn cancel(&mut self, correlation_id: &str) -> QueueResult<bool> {
        self.remove(correlation_id)
    }

    fn remove(&mut self, correlation_id: &str) -> QueueResult<bool> {
        let Some(pos) = self
            .entries
            .iter()
            .position(|m| m.correlation_id == correlation_id)
        else {
            return Ok(false);
        };
        self.entries.remove(pos);
        self.persist()?;
        Ok(true)
    }

    /// Prepares every pending entry for resending.
    ///
    /// Entries that already used up their attempts are removed and returned as
    /// failed; the rest are returned for resending in enqueue order. Attempts
    /// are not charged here: the caller records each frame that actually
    /// reached the transport with [`ResubmissionQueue::mark_sent`].
    pub fn flush(&mut self) -> QueueResult<Flush> {
        let mut flush = Flush::default();
        if self.entries.is_empty() {
            return Ok(flush);
        }

        let max_attempts = self.max_attempts;
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.attempts >= max_attempts {
                flush.failed.push(entry);
            } else {
                flush.resend.push(entry.clone());
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        self.persist()?;
        Ok(flush)
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries
            .iter()
            .any(|m| m.correlation_id == correlation_id)
    }

    pub fn get(&self, correlation_id: &str) -> Option<&QueuedMessage> {
        self.entries
            .iter()
            .find(|m| m.correlation_id == correlation_id)
    }

    /// Pending messages in enqueue order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> QueueResult<()> {
        let Some(path) = &self.journal else {
            return Ok(());
        };

        let mut file = File::create(path)?;
        for entry in &self.entries {
            let json = serde_json::to_string(entry)?;
            writeln!(file, "{}", json)?;
        }
        file.sync_all()?;
        Ok(())
    }
}
