// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription registry.
//!
//! Tracks which channels the session is subscribed to, the handler for each,
//! and how many callers are interested. Only the first subscribe and the last
//! unsubscribe for a channel reach the server.

use std::collections::HashMap;

use chime_core::Frame;

/// How subscriptions are replayed after a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// First connection: plain `subscribe`.
    Subscribe,
    /// After a reconnect: `resubscribe`, so the server can replay missed events.
    Resubscribe,
}

/// Result of [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// New channel; a subscribe frame is due.
    New,
    /// Already subscribed; interest was incremented.
    Existing { interest: u32 },
}

/// Result of [`SubscriptionRegistry::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// Interest dropped to zero; an unsubscribe frame is due.
    Removed,
    /// Other subscribers remain.
    Remaining { interest: u32 },
    /// The channel was not subscribed.
    NotSubscribed,
}

#[derive(Debug)]
struct Subscription<H> {
    handler: H,
    interest: u32,
}

/// Channel id to handler mapping with interest counts.
#[derive(Debug)]
pub struct SubscriptionRegistry<H> {
    entries: HashMap<String, Subscription<H>>,
    /// Channel ids in insertion order, for replay.
    order: Vec<String>,
}

impl<H> Default for SubscriptionRegistry<H> {
    fn default() -> Self {
        SubscriptionRegistry {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<H> SubscriptionRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in a channel.
    ///
    /// The handler of an existing entry is kept; the new one is dropped.
    pub fn subscribe(&mut self, channel: &str, handler: H) -> SubscribeOutcome {
        if let Some(entry) = self.entries.get_mut(channel) {
            entry.interest += 1;
            return SubscribeOutcome::Existing {
                interest: entry.interest,
            };
        }

        self.entries.insert(
            channel.to_string(),
            Subscription {
                handler,
                interest: 1,
            },
        );
        self.order.push(channel.to_string());
        SubscribeOutcome::New
    }

    /// Drops one unit of interest in a channel.
    pub fn unsubscribe(&mut self, channel: &str) -> UnsubscribeOutcome {
        let Some(entry) = self.entries.get_mut(channel) else {
            return UnsubscribeOutcome::NotSubscribed;
        };

        entry.interest = entry.interest.saturating_sub(1);
        if entry.interest > 0 {
            return UnsubscribeOutcome::Remaining {
                interest: entry.interest,
            };
        }

        self.entries.remove(channel);
        self.order.retain(|c| c != channel);
        UnsubscribeOutcome::Removed
    }

    /// Returns the handler registered for a channel.
    pub fn handler(&self, channel: &str) -> Option<&H> {
        self.entries.get(channel).map(|e| &e.handler)
    }

    /// Returns the interest count for a channel (0 if not subscribed).
    pub fn interest(&self, channel: &str) -> u32 {
        self.entries.get(channel).map_or(0, |e| e.interest)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    /// Channel ids in insertion order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Builds one control frame per entry, in insertion order.
    pub fn replay(&self, mode: ReplayMode) -> Vec<Frame> {
        self.channels()
            .map(|channel| match mode {
                ReplayMode::Subscribe => Frame::subscribe(channel),
                ReplayMode::Resubscribe => Frame::resubscribe(channel),
            })
            .collect()
    }
}
