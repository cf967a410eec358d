// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chime_core::{ServiceEndpoints, Session};
use serde_json::{json, Value};

use crate::dispatch::Account;
use crate::error::Error;
use crate::fetch::{Directory, EntityKind, FetchError, FetchResult, Fetcher};
use crate::host::{Host, HostMessage};
use crate::jugg::QueuedMessage;

pub const OWN_ID: &str = "me-1";
pub const OWN_EMAIL: &str = "me@example.com";

/// A registered session for `me@example.com` with all three own channels.
pub fn session_info() -> Session {
    Session {
        token: "tok-123".to_string(),
        session_id: Some("sess-1".to_string()),
        profile_id: OWN_ID.to_string(),
        email: OWN_EMAIL.to_string(),
        profile_channel: Some("profile-me".to_string()),
        presence_channel: Some("presence-me".to_string()),
        device_id: Some("dev-1".to_string()),
        device_channel: Some("device-me".to_string()),
        endpoints: ServiceEndpoints {
            profile: "https://profile.example.com".to_string(),
            messaging: "https://messaging.example.com".to_string(),
            websocket: "https://push.example.com".to_string(),
            ..Default::default()
        },
    }
}

pub fn account(downloads: &Path) -> Account {
    Account::new(&session_info(), downloads, 1024)
}

/// Host that records everything written to it.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub messages: Mutex<Vec<HostMessage>>,
    pub failed: Mutex<Vec<(QueuedMessage, String)>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<HostMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<(QueuedMessage, String)> {
        self.failed.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Host for RecordingHost {
    fn write_message(&self, message: HostMessage) {
        self.messages.lock().unwrap().push(message);
    }

    fn delivery_failed(&self, message: &QueuedMessage, error: &Error) {
        self.failed
            .lock()
            .unwrap()
            .push((message.clone(), error.to_string()));
    }

    fn connection_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

/// Fetcher serving canned bodies by URL; unknown URLs return 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    pub requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }
}

impl Fetcher for MockFetcher {
    fn fetch(
        &self,
        url: &str,
        max_size: u64,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Vec<u8>>> + Send + '_>> {
        self.requests.lock().unwrap().push(url.to_string());
        let body = self.bodies.get(url).cloned();
        Box::pin(async move {
            let body = body.ok_or(FetchError::Status(404))?;
            if body.len() as u64 > max_size {
                return Err(FetchError::TooLarge {
                    size: body.len() as u64,
                    max: max_size,
                });
            }
            Ok(body)
        })
    }
}

/// Directory serving canned records; counts lookups per id.
#[derive(Debug, Default)]
pub struct MockDirectory {
    records: HashMap<(EntityKind, String), Value>,
    pub lookups: Mutex<Vec<(EntityKind, String)>>,
}

impl MockDirectory {
    pub fn with(mut self, kind: EntityKind, id: &str, record: Value) -> Self {
        self.records.insert((kind, id.to_string()), record);
        self
    }

    pub fn lookups(&self) -> Vec<(EntityKind, String)> {
        self.lookups.lock().unwrap().clone()
    }
}

impl Directory for MockDirectory {
    fn lookup(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Value>> + Send + '_>> {
        self.lookups.lock().unwrap().push((kind, id.to_string()));
        let record = self.records.get(&(kind, id.to_string())).cloned();
        Box::pin(async move { record.ok_or(FetchError::Status(404)) })
    }
}

pub fn contact_record(id: &str, email: &str, presence_channel: &str) -> Value {
    json!({
        "ProfileId": id,
        "Email": email,
        "DisplayName": email.split('@').next().unwrap(),
        "PresenceChannel": presence_channel,
    })
}

pub fn room_record(id: &str, name: &str, channel: &str) -> Value {
    json!({"RoomId": id, "Name": name, "Channel": channel})
}

pub fn conversation_record(id: &str, channel: &str, members: &[&str]) -> Value {
    json!({
        "ConversationId": id,
        "Channel": channel,
        "Members": members,
    })
}

pub fn message_record(id: &str, sender: &str, content: &str) -> Value {
    json!({
        "MessageId": id,
        "Sender": sender,
        "Content": content,
        "CreatedOn": "2026-03-01T12:00:00Z",
    })
}

/// Wraps a record in an event payload.
pub fn event(klass: &str, kind: &str, record: Value) -> Value {
    json!({"klass": klass, "type": kind, "record": record})
}
