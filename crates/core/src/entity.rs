// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Contacts, rooms, conversations and messages as reported by the services.
//!
//! Each entity can exist as an unresolved placeholder holding only its id.
//! Placeholders are created on first reference and filled in once the
//! corresponding record has been fetched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::record::{opt_string, opt_time, parse_int, parse_string, parse_time};

/// Presence state of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Unknown,
    Offline,
    Available,
    Away,
    Busy,
    Mobile,
    Private,
    DoNotDisturb,
}

impl Availability {
    /// Maps the numeric availability code used in presence records.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Availability::Offline,
            2 => Availability::Available,
            3 => Availability::Away,
            4 => Availability::Busy,
            5 => Availability::Mobile,
            6 => Availability::Private,
            7 => Availability::DoNotDisturb,
            _ => Availability::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub profile_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub presence_channel: Option<String>,
    pub profile_channel: Option<String>,
    pub availability: Availability,
    /// False while this is a placeholder awaiting its record.
    pub resolved: bool,
}

impl Contact {
    pub fn placeholder(profile_id: impl Into<String>) -> Self {
        Contact {
            profile_id: profile_id.into(),
            email: None,
            display_name: None,
            full_name: None,
            presence_channel: None,
            profile_channel: None,
            availability: Availability::Unknown,
            resolved: false,
        }
    }

    pub fn from_record(record: &Value) -> Result<Self> {
        Ok(Contact {
            profile_id: parse_string(record, "ProfileId", "contact record")?.to_string(),
            email: opt_string(record, "Email"),
            display_name: opt_string(record, "DisplayName"),
            full_name: opt_string(record, "FullName"),
            presence_channel: opt_string(record, "PresenceChannel"),
            profile_channel: opt_string(record, "ProfileChannel"),
            availability: Availability::Unknown,
            resolved: true,
        })
    }

    /// Best available human-readable identifier.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.full_name.as_deref())
            .or(self.email.as_deref())
            .unwrap_or(&self.profile_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub name: Option<String>,
    pub channel: Option<String>,
    pub privacy: Option<String>,
    pub last_sent: Option<DateTime<Utc>>,
    pub resolved: bool,
}

impl Room {
    pub fn placeholder(room_id: impl Into<String>) -> Self {
        Room {
            room_id: room_id.into(),
            name: None,
            channel: None,
            privacy: None,
            last_sent: None,
            resolved: false,
        }
    }

    pub fn from_record(record: &Value) -> Result<Self> {
        Ok(Room {
            room_id: parse_string(record, "RoomId", "room record")?.to_string(),
            name: opt_string(record, "Name"),
            channel: opt_string(record, "Channel"),
            privacy: opt_string(record, "Privacy"),
            last_sent: opt_time(record, "LastSent"),
            resolved: true,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub name: Option<String>,
    pub channel: Option<String>,
    /// Profile ids of all members, including ourselves.
    pub members: Vec<String>,
    pub favourite: bool,
    pub last_sent: Option<DateTime<Utc>>,
    pub resolved: bool,
}

impl Conversation {
    pub fn placeholder(conversation_id: impl Into<String>) -> Self {
        Conversation {
            conversation_id: conversation_id.into(),
            name: None,
            channel: None,
            members: Vec::new(),
            favourite: false,
            last_sent: None,
            resolved: false,
        }
    }

    pub fn from_record(record: &Value) -> Result<Self> {
        let members = record
            .get("Members")
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| match m {
                        Value::String(id) => Some(id.clone()),
                        other => opt_string(other, "ProfileId"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Conversation {
            conversation_id: parse_string(record, "ConversationId", "conversation record")?
                .to_string(),
            name: opt_string(record, "Name"),
            channel: opt_string(record, "Channel"),
            members,
            favourite: crate::record::parse_boolean(record, "Favorite")?,
            last_sent: opt_time(record, "LastSent"),
            resolved: true,
        })
    }

    /// For a one-to-one conversation, returns the other member's profile id.
    pub fn im_peer(&self, own_profile_id: &str) -> Option<&str> {
        if self.members.len() != 2 {
            return None;
        }
        self.members
            .iter()
            .map(String::as_str)
            .find(|m| *m != own_profile_id)
    }
}

/// A chat message record pushed on a conversation or room channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: String,
    pub content: String,
    /// Profile id of the sender.
    pub sender: String,
    pub created_on: DateTime<Utc>,
    /// Correlation id echoed back for messages this client sent.
    pub client_request_token: Option<String>,
}

impl Message {
    pub fn from_record(record: &Value) -> Result<Self> {
        Ok(Message {
            message_id: parse_string(record, "MessageId", "message record")?.to_string(),
            content: opt_string(record, "Content").unwrap_or_default(),
            sender: parse_string(record, "Sender", "message record")?.to_string(),
            created_on: parse_time(record, "CreatedOn", "message record")?,
            client_request_token: opt_string(record, "ClientRequestToken"),
        })
    }
}

/// A file attached to a message. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub message_id: String,
    pub filename: String,
    pub url: String,
    pub content_type: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .map(str::trim)
            .is_some_and(|t| t.starts_with("image/"))
    }
}

/// Extracts the availability code from a presence record.
pub fn presence_update(record: &Value) -> Result<(String, Availability)> {
    let profile_id = parse_string(record, "ProfileId", "presence record")?.to_string();
    let code = parse_int(record, "Availability", "presence record")?;
    Ok((profile_id, Availability::from_code(code)))
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
