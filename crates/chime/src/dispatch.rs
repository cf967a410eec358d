// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Routing of channel events.
//!
//! Event payloads have the form `{"klass": ..., "type": ..., "record": {...}}`.
//! The dispatcher updates the entity caches, acknowledges our own echoed
//! messages, writes inbound messages to the host, and queues follow-up work
//! ([`Effect`]) for the session to carry out.

use std::path::PathBuf;

use chime_core::entity::presence_update;
use chime_core::record::parse_string;
use chime_core::{Availability, Contact, Conversation, Message, Room};
use serde_json::Value;
use tracing::{debug, warn};

use crate::attachments::{self, Download};
use crate::cache::Caches;
use crate::fetch::EntityKind;
use crate::host::{self, Host, MessageKind, Target};
use crate::jugg::ResubmissionQueue;

/// The account a session runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub email: String,
    pub profile_id: String,
    /// Directory for this account's attachment downloads.
    pub downloads_dir: PathBuf,
    pub max_attachment_size: u64,
}

impl Account {
    pub fn new(
        session: &chime_core::Session,
        downloads_base: &std::path::Path,
        max_size: u64,
    ) -> Self {
        Account {
            email: session.email.clone(),
            profile_id: session.profile_id.clone(),
            downloads_dir: attachments::download_dir(downloads_base, &session.email),
            max_attachment_size: max_size,
        }
    }
}

/// What a subscribed channel carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelHandler {
    /// This device: roster-level updates.
    Device,
    /// Our own profile.
    Profile,
    /// Presence of the given profile.
    Presence(String),
    Conversation(String),
    Room(String),
}

/// Work the dispatcher cannot do synchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Subscribe {
        channel: String,
        handler: ChannelHandler,
    },
    Unsubscribe {
        channel: String,
    },
    /// Fetch a record for a pending cache entry.
    Fetch { kind: EntityKind, id: String },
    Download(Download),
}

/// Borrowed view of the session state needed to handle one event.
pub struct Dispatcher<'a> {
    pub account: &'a Account,
    pub caches: &'a mut Caches,
    pub queue: &'a mut ResubmissionQueue,
    pub host: &'a dyn Host,
    pub effects: &'a mut Vec<Effect>,
}

fn is_delete(data: &Value, record: &Value) -> bool {
    matches!(
        data.get("type").and_then(Value::as_str),
        Some("delete") | Some("deleted")
    ) || record
        .get("Deleted")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

impl Dispatcher<'_> {
    /// Handles one event payload received on a channel.
    pub fn handle_event(
        &mut self,
        handler: &ChannelHandler,
        data: &Value,
    ) -> chime_core::Result<()> {
        let klass = data.get("klass").and_then(Value::as_str).unwrap_or_default();
        let record = data.get("record").unwrap_or(&Value::Null);
        debug!(klass, ?handler, "event");

        match klass {
            "ConversationMessage" => self.conversation_message(handler, record),
            "RoomMessage" => self.room_message(handler, record),
            "Conversation" if is_delete(data, record) => {
                let id = parse_string(record, "ConversationId", "conversation record")?;
                if let Some(conv) = self.caches.conversations.remove(id) {
                    self.unsubscribe(conv.channel);
                }
                Ok(())
            }
            "Conversation" => {
                let conv = Conversation::from_record(record)?;
                if let Some(channel) = &conv.channel {
                    self.effects.push(Effect::Subscribe {
                        channel: channel.clone(),
                        handler: ChannelHandler::Conversation(conv.conversation_id.clone()),
                    });
                }
                let id = conv.conversation_id.clone();
                self.caches.conversations.upsert(conv);
                self.release_held(&id);
                Ok(())
            }
            "Room" if is_delete(data, record) => {
                let id = parse_string(record, "RoomId", "room record")?;
                self.remove_room(id);
                Ok(())
            }
            "Room" => {
                self.caches.rooms.upsert(Room::from_record(record)?);
                Ok(())
            }
            "RoomMembership" => self.room_membership(data, record),
            "Presence" => {
                let (profile_id, availability) = presence_update(record)?;
                self.set_availability(&profile_id, availability);
                Ok(())
            }
            "Contact" | "Profile" if is_delete(data, record) => {
                let id = parse_string(record, "ProfileId", "contact record")?;
                if let Some(contact) = self.caches.contacts.remove(id) {
                    self.unsubscribe(contact.presence_channel);
                }
                Ok(())
            }
            "Contact" | "Profile" => {
                let mut contact = Contact::from_record(record)?;
                if let Some(old) = self.caches.contacts.get(&contact.profile_id) {
                    contact.availability = old.availability;
                }
                self.watch_presence(&contact);
                self.caches.contacts.upsert(contact);
                Ok(())
            }
            other => {
                debug!(klass = other, "ignoring event");
                Ok(())
            }
        }
    }

    /// Routes a conversation message to its IM or chat.
    ///
    /// Whether a conversation is a 1:1 IM depends on its member list, so
    /// messages for a conversation that is still being fetched are held and
    /// written by [`Dispatcher::release_held`] once it resolves.
    fn conversation_message(
        &mut self,
        handler: &ChannelHandler,
        record: &Value,
    ) -> chime_core::Result<()> {
        let explicit = record.get("ConversationId").and_then(Value::as_str);
        let conversation_id = match (explicit, handler) {
            (Some(id), _) => id.to_string(),
            (None, ChannelHandler::Conversation(id)) => id.clone(),
            (None, _) => parse_string(record, "ConversationId", "message record")?.to_string(),
        };
        let message = Message::from_record(record)?;
        if self.acknowledged(&message, &conversation_id) {
            return Ok(());
        }

        if self.caches.conversations.lookup(&conversation_id).fetch {
            self.effects.push(Effect::Fetch {
                kind: EntityKind::Conversation,
                id: conversation_id.clone(),
            });
        }
        if self.caches.conversations.is_pending(&conversation_id) {
            debug!(conversation = %conversation_id, "holding message until conversation resolves");
            self.caches.hold(&conversation_id, record.clone());
            return Ok(());
        }
        self.deliver_to_conversation(&conversation_id, message, record)
    }

    /// Writes the messages held for a conversation.
    ///
    /// Called once the conversation resolves or its fetch fails; one that is
    /// still unresolved falls back to a chat.
    pub fn release_held(&mut self, conversation_id: &str) {
        for record in self.caches.take_held(conversation_id) {
            let delivered = Message::from_record(&record)
                .and_then(|message| self.deliver_to_conversation(conversation_id, message, &record));
            if let Err(e) = delivered {
                warn!(conversation = %conversation_id, error = %e, "dropping held message");
            }
        }
    }

    fn deliver_to_conversation(
        &mut self,
        conversation_id: &str,
        message: Message,
        record: &Value,
    ) -> chime_core::Result<()> {
        let peer = self
            .caches
            .conversations
            .get(conversation_id)
            .and_then(|c| c.im_peer(&self.account.profile_id))
            .map(str::to_string);
        let target = match peer {
            Some(peer) => Target::Im {
                peer_email: self.contact_email(&peer),
            },
            None => Target::Chat {
                chat_id: conversation_id.to_string(),
            },
        };
        self.deliver(target, message, record)
    }

    fn room_message(
        &mut self,
        handler: &ChannelHandler,
        record: &Value,
    ) -> chime_core::Result<()> {
        let room_id = match (record.get("RoomId").and_then(Value::as_str), handler) {
            (Some(id), _) => id.to_string(),
            (None, ChannelHandler::Room(id)) => id.clone(),
            (None, _) => parse_string(record, "RoomId", "message record")?.to_string(),
        };
        let message = Message::from_record(record)?;
        if self.acknowledged(&message, &room_id) {
            return Ok(());
        }

        if self.caches.rooms.lookup(&room_id).fetch {
            self.effects.push(Effect::Fetch {
                kind: EntityKind::Room,
                id: room_id.clone(),
            });
        }
        self.deliver(Target::Chat { chat_id: room_id }, message, record)
    }

    /// Removes our own echoed message from the queue.
    ///
    /// Returns true if the echo matched a queued message; the host already
    /// shows it, so it is not written again. Only a message we sent to this
    /// conversation or room counts: a peer's client picks its request tokens
    /// independently, so theirs may collide with ours.
    fn acknowledged(&mut self, message: &Message, target: &str) -> bool {
        let Some(token) = &message.client_request_token else {
            return false;
        };
        if message.sender != self.account.profile_id {
            return false;
        }
        if self.queue.get(token).is_some_and(|queued| queued.target != target) {
            return false;
        }
        match self.queue.acknowledge(token) {
            Ok(acked) => acked,
            Err(e) => {
                warn!(id = %token, error = %e, "failed to persist acknowledgment");
                true
            }
        }
    }

    fn deliver(
        &mut self,
        target: Target,
        message: Message,
        record: &Value,
    ) -> chime_core::Result<()> {
        let from = self.contact_email(&message.sender);
        let attachment = attachments::extract_attachment(record)?;

        if !message.content.is_empty() || attachment.is_none() {
            host::write_conversation_message(
                self.host,
                target.clone(),
                &from,
                message.content,
                MessageKind::Text,
                message.created_on,
            );
        }

        if let Some(attachment) = attachment {
            self.effects.push(Effect::Download(Download::new(
                attachment,
                self.account.downloads_dir.clone(),
                target,
                from,
                message.created_on,
            )));
        }
        Ok(())
    }

    /// Returns the email of a contact, falling back to the profile id while
    /// the contact is still being fetched.
    fn contact_email(&mut self, profile_id: &str) -> String {
        if profile_id == self.account.profile_id {
            return self.account.email.clone();
        }
        let lookup = self.caches.contacts.lookup(profile_id);
        let email = lookup
            .entity
            .email
            .clone()
            .unwrap_or_else(|| profile_id.to_string());
        if lookup.fetch {
            self.effects.push(Effect::Fetch {
                kind: EntityKind::Contact,
                id: profile_id.to_string(),
            });
        }
        email
    }

    fn room_membership(&mut self, data: &Value, record: &Value) -> chime_core::Result<()> {
        let room_id = parse_string(record, "RoomId", "membership record")?;
        let member = record
            .get("Member")
            .and_then(|m| m.get("ProfileId"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let left = is_delete(data, record)
            || record.get("Status").and_then(Value::as_str) == Some("Left");

        if left && member == self.account.profile_id {
            self.remove_room(room_id);
        }
        Ok(())
    }

    fn remove_room(&mut self, room_id: &str) {
        if let Some(room) = self.caches.rooms.remove(room_id) {
            self.unsubscribe(room.channel);
        }
    }

    fn set_availability(&mut self, profile_id: &str, availability: Availability) {
        if profile_id != self.account.profile_id && self.caches.contacts.lookup(profile_id).fetch {
            self.effects.push(Effect::Fetch {
                kind: EntityKind::Contact,
                id: profile_id.to_string(),
            });
        }
        self.caches
            .contacts
            .update(profile_id, |c| c.availability = availability);
    }

    fn watch_presence(&mut self, contact: &Contact) {
        if contact.profile_id == self.account.profile_id {
            return;
        }
        if let Some(channel) = &contact.presence_channel {
            self.effects.push(Effect::Subscribe {
                channel: channel.clone(),
                handler: ChannelHandler::Presence(contact.profile_id.clone()),
            });
        }
    }

    fn unsubscribe(&mut self, channel: Option<String>) {
        if let Some(channel) = channel {
            self.effects.push(Effect::Unsubscribe { channel });
        }
    }
}

/// Applies a fetched record to its pending cache entry.
///
/// Returns follow-up effects (e.g. presence subscriptions for a resolved
/// contact); completions for ids that are no longer pending are dropped.
pub fn complete_fetch(
    caches: &mut Caches,
    account: &Account,
    kind: EntityKind,
    id: &str,
    record: &Value,
) -> chime_core::Result<Vec<Effect>> {
    let mut effects = Vec::new();
    match kind {
        EntityKind::Contact => {
            let mut contact = Contact::from_record(record)?;
            if let Some(old) = caches.contacts.get(id) {
                contact.availability = old.availability;
            }
            let channel = contact.presence_channel.clone();
            let profile_id = contact.profile_id.clone();
            if caches.contacts.complete(contact) && profile_id != account.profile_id {
                if let Some(channel) = channel {
                    effects.push(Effect::Subscribe {
                        channel,
                        handler: ChannelHandler::Presence(profile_id),
                    });
                }
            }
        }
        EntityKind::Room => {
            caches.rooms.complete(Room::from_record(record)?);
        }
        EntityKind::Conversation => {
            let conv = Conversation::from_record(record)?;
            let subscribe = conv.channel.clone().map(|channel| Effect::Subscribe {
                channel,
                handler: ChannelHandler::Conversation(conv.conversation_id.clone()),
            });
            if caches.conversations.complete(conv) {
                effects.extend(subscribe);
            }
        }
    }
    Ok(effects)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
