// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated session data.
//!
//! A [`Session`] is what the client knows after device registration: the
//! opaque session token, the service endpoints it was assigned, and the
//! channels it owns. The engine reads it; nothing here performs I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::{opt_string, parse_string};

/// Base URLs of the services assigned to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    #[serde(default)]
    pub presence: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub contacts: String,
    #[serde(default)]
    pub messaging: String,
    #[serde(default)]
    pub conference: String,
    pub websocket: String,
    #[serde(default)]
    pub reachability: String,
}

impl ServiceEndpoints {
    /// Iterates over `(name, url)` pairs that are set.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("presence", self.presence.as_str()),
            ("profile", self.profile.as_str()),
            ("contacts", self.contacts.as_str()),
            ("messaging", self.messaging.as_str()),
            ("conference", self.conference.as_str()),
            ("websocket", self.websocket.as_str()),
            ("reachability", self.reachability.as_str()),
        ]
        .into_iter()
        .filter(|(_, url)| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub session_id: Option<String>,
    pub profile_id: String,
    pub email: String,
    pub profile_channel: Option<String>,
    pub presence_channel: Option<String>,
    pub device_id: Option<String>,
    pub device_channel: Option<String>,
    pub endpoints: ServiceEndpoints,
}

impl Session {
    /// Builds a session from a device-registration response document.
    pub fn from_registration(doc: &Value) -> Result<Self> {
        let session = doc
            .get("Session")
            .ok_or_else(|| Error::missing("Session", "registration"))?;
        let profile = session
            .get("Profile")
            .ok_or_else(|| Error::missing("Profile", "registration"))?;
        let device = session.get("Device").unwrap_or(&Value::Null);
        let config = session
            .get("ServiceConfig")
            .ok_or_else(|| Error::missing("ServiceConfig", "registration"))?;

        let rest_url = |service: &str| -> String {
            config
                .get(service)
                .and_then(|s| opt_string(s, "RestUrl"))
                .unwrap_or_default()
        };
        let push = config.get("Push").unwrap_or(&Value::Null);

        let endpoints = ServiceEndpoints {
            presence: rest_url("Presence"),
            profile: rest_url("Profile"),
            contacts: rest_url("Contacts"),
            messaging: rest_url("Messaging"),
            conference: rest_url("Conference"),
            websocket: parse_string(push, "WebsocketUrl", "push service config")?.to_string(),
            reachability: opt_string(push, "ReachabilityUrl").unwrap_or_default(),
        };

        Ok(Session {
            token: parse_string(session, "SessionToken", "registration")?.to_string(),
            session_id: opt_string(session, "SessionId"),
            profile_id: parse_string(profile, "id", "profile")?.to_string(),
            email: parse_string(profile, "email", "profile")?.to_string(),
            profile_channel: opt_string(profile, "profile_channel"),
            presence_channel: opt_string(profile, "presence_channel"),
            device_id: opt_string(device, "DeviceId"),
            device_channel: opt_string(device, "Channel"),
            endpoints,
        })
    }

    /// Channels the session subscribes to for itself: device, profile, presence.
    pub fn own_channels(&self) -> Vec<&str> {
        [
            self.device_channel.as_deref(),
            self.profile_channel.as_deref(),
            self.presence_channel.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
