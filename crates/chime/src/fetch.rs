// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP fetch collaborators.
//!
//! [`Fetcher`] downloads raw bytes (attachments) with a size cap;
//! [`Directory`] looks up contact, room and conversation records by id.
//! Both are traits so the session can be driven without a network.

use std::future::Future;
use std::pin::Pin;

use chime_core::ServiceEndpoints;
use reqwest::Url;
use serde_json::Value;

/// Error type for fetch operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("response too large ({size} bytes, max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Downloads a URL, refusing bodies larger than `max_size` bytes.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        max_size: u64,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Vec<u8>>> + Send + '_>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        max_size: u64,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Vec<u8>>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move {
            let mut response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            if let Some(size) = response.content_length() {
                if size > max_size {
                    return Err(FetchError::TooLarge {
                        size,
                        max: max_size,
                    });
                }
            }

            let mut body = Vec::new();
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?
            {
                let size = (body.len() + chunk.len()) as u64;
                if size > max_size {
                    return Err(FetchError::TooLarge {
                        size,
                        max: max_size,
                    });
                }
                body.extend_from_slice(&chunk);
            }
            Ok(body)
        })
    }
}

/// Kinds of entity records the directory serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Contact,
    Room,
    Conversation,
}

impl EntityKind {
    /// Member wrapping the record in a lookup response.
    pub fn member(&self) -> &'static str {
        match self {
            EntityKind::Contact => "Profile",
            EntityKind::Room => "Room",
            EntityKind::Conversation => "Conversation",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Contact => write!(f, "contact"),
            EntityKind::Room => write!(f, "room"),
            EntityKind::Conversation => write!(f, "conversation"),
        }
    }
}

/// Looks up entity records by server id.
pub trait Directory: Send + Sync {
    fn lookup(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Value>> + Send + '_>>;
}

/// Directory backed by the profile and messaging REST services.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    endpoints: ServiceEndpoints,
    token: String,
}

impl HttpDirectory {
    pub fn new(client: reqwest::Client, endpoints: ServiceEndpoints, token: String) -> Self {
        HttpDirectory {
            client,
            endpoints,
            token,
        }
    }

    /// REST URL of a single entity record.
    pub fn record_url(&self, kind: EntityKind, id: &str) -> FetchResult<Url> {
        let (base, collection) = match kind {
            EntityKind::Contact => (&self.endpoints.profile, "profiles"),
            EntityKind::Room => (&self.endpoints.messaging, "rooms"),
            EntityKind::Conversation => (&self.endpoints.messaging, "conversations"),
        };
        let mut url = Url::parse(base)
            .map_err(|e| FetchError::InvalidResponse(format!("bad {} url: {}", kind, e)))?;
        if url.cannot_be_a_base() {
            return Err(FetchError::InvalidResponse(format!(
                "bad {} url: {}",
                kind, base
            )));
        }
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(collection).push(id);
        }
        Ok(url)
    }
}

impl Directory for HttpDirectory {
    fn lookup(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Value>> + Send + '_>> {
        let url = self.record_url(kind, id);
        Box::pin(async move {
            let response = self
                .client
                .get(url?)
                .header(
                    reqwest::header::COOKIE,
                    format!("_aws_wt_session={}", self.token),
                )
                .send()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?;
            let mut doc: Value = serde_json::from_slice(&body)
                .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

            match doc.get_mut(kind.member()) {
                Some(record) => Ok(record.take()),
                None => Ok(doc),
            }
        })
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
