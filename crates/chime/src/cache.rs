// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Entity caches for contacts, rooms and conversations.
//!
//! Each cache is keyed by server id with a secondary index (email for
//! contacts, name for rooms and conversations). A lookup miss inserts an
//! unresolved placeholder and marks the id as pending; the caller issues a
//! single fetch for it and feeds the result back through
//! [`EntityCache::complete`].

use std::collections::{HashMap, HashSet};

use chime_core::{Contact, Conversation, Room};
use serde_json::Value;

/// An entity that can live in an [`EntityCache`].
pub trait CachedEntity: Clone {
    fn id(&self) -> &str;
    /// Key of the secondary index, if the entity has one yet.
    fn secondary_key(&self) -> Option<&str>;
    /// An unresolved entity holding only its id.
    fn placeholder(id: &str) -> Self;
    fn is_resolved(&self) -> bool;
}

impl CachedEntity for Contact {
    fn id(&self) -> &str {
        &self.profile_id
    }
    fn secondary_key(&self) -> Option<&str> {
        self.email.as_deref()
    }
    fn placeholder(id: &str) -> Self {
        Contact::placeholder(id)
    }
    fn is_resolved(&self) -> bool {
        self.resolved
    }
}

impl CachedEntity for Room {
    fn id(&self) -> &str {
        &self.room_id
    }
    fn secondary_key(&self) -> Option<&str> {
        self.name.as_deref()
    }
    fn placeholder(id: &str) -> Self {
        Room::placeholder(id)
    }
    fn is_resolved(&self) -> bool {
        self.resolved
    }
}

impl CachedEntity for Conversation {
    fn id(&self) -> &str {
        &self.conversation_id
    }
    fn secondary_key(&self) -> Option<&str> {
        self.name.as_deref()
    }
    fn placeholder(id: &str) -> Self {
        Conversation::placeholder(id)
    }
    fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Result of [`EntityCache::lookup`].
#[derive(Debug)]
pub struct Lookup<'a, T> {
    pub entity: &'a T,
    /// True exactly once per miss: the caller must fetch the entity.
    pub fetch: bool,
}

#[derive(Debug)]
pub struct EntityCache<T> {
    by_id: HashMap<String, T>,
    by_key: HashMap<String, String>,
    pending: HashSet<String>,
}

impl<T> Default for EntityCache<T> {
    fn default() -> Self {
        EntityCache {
            by_id: HashMap::new(),
            by_key: HashMap::new(),
            pending: HashSet::new(),
        }
    }
}

impl<T: CachedEntity> EntityCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entity for `id`, creating a placeholder on a miss.
    pub fn lookup(&mut self, id: &str) -> Lookup<'_, T> {
        let resolved = self.by_id.get(id).is_some_and(T::is_resolved);
        let fetch = !resolved && self.pending.insert(id.to_string());
        let entity = self
            .by_id
            .entry(id.to_string())
            .or_insert_with(|| T::placeholder(id));
        Lookup { entity, fetch }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.by_id.get(id)
    }

    /// Looks up by secondary key (email or name).
    pub fn get_by_key(&self, key: &str) -> Option<&T> {
        self.by_key.get(key).and_then(|id| self.by_id.get(id))
    }

    /// Inserts or replaces an entity, keeping the secondary index in sync.
    pub fn upsert(&mut self, entity: T) {
        let id = entity.id().to_string();
        self.pending.remove(&id);
        self.unindex(&id);
        if let Some(key) = entity.secondary_key() {
            self.by_key.insert(key.to_string(), id.clone());
        }
        self.by_id.insert(id, entity);
    }

    /// Applies an in-place update, keeping the secondary index in sync.
    ///
    /// Returns false if the entity is not cached.
    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut T)) -> bool {
        self.unindex(id);
        let Some(mut entity) = self.by_id.remove(id) else {
            return false;
        };
        f(&mut entity);
        if let Some(key) = entity.secondary_key() {
            self.by_key.insert(key.to_string(), id.to_string());
        }
        self.by_id.insert(id.to_string(), entity);
        true
    }

    /// Fills in a pending entity with its fetched record.
    ///
    /// Completions for ids that are no longer pending are ignored.
    pub fn complete(&mut self, entity: T) -> bool {
        if !self.pending.contains(entity.id()) {
            return false;
        }
        self.upsert(entity);
        true
    }

    /// Clears the pending flag after a failed fetch so a later lookup retries.
    pub fn fail(&mut self, id: &str) -> bool {
        self.pending.remove(id)
    }

    /// Removes an entity from both indexes.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.pending.remove(id);
        self.unindex(id);
        self.by_id.remove(id)
    }

    /// Forgets all pending fetches; their completions will be ignored.
    pub fn cancel_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.by_id.values()
    }

    fn unindex(&mut self, id: &str) {
        let key = self
            .by_id
            .get(id)
            .and_then(T::secondary_key)
            .map(str::to_string);
        if let Some(key) = key {
            if self.by_key.get(&key).is_some_and(|owner| owner == id) {
                self.by_key.remove(&key);
            }
        }
    }
}

/// All entity caches of a session.
#[derive(Debug, Default)]
pub struct Caches {
    pub contacts: EntityCache<Contact>,
    pub rooms: EntityCache<Room>,
    pub conversations: EntityCache<Conversation>,
    /// Message records waiting for their conversation to resolve.
    held: HashMap<String, Vec<Value>>,
}

impl Caches {
    /// Parks a message record until its conversation is known.
    pub fn hold(&mut self, conversation_id: &str, record: Value) {
        self.held
            .entry(conversation_id.to_string())
            .or_default()
            .push(record);
    }

    /// Takes the held records of a conversation, oldest first.
    pub fn take_held(&mut self, conversation_id: &str) -> Vec<Value> {
        self.held.remove(conversation_id).unwrap_or_default()
    }

    /// Conversations with held records.
    pub fn held_conversations(&self) -> Vec<String> {
        self.held.keys().cloned().collect()
    }

    /// Forgets pending fetches in every cache.
    pub fn cancel_pending(&mut self) -> usize {
        self.contacts.cancel_pending()
            + self.rooms.cancel_pending()
            + self.conversations.cancel_pending()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
