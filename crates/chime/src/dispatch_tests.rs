// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use super::*;
use crate::host::Direction;
use crate::test_helpers::{
    account, contact_record, conversation_record, event, message_record, room_record,
    RecordingHost, OWN_EMAIL, OWN_ID,
};
use serde_json::json;
use yare::parameterized;

struct Fixture {
    account: Account,
    caches: Caches,
    queue: ResubmissionQueue,
    host: Arc<RecordingHost>,
    effects: Vec<Effect>,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            account: account(Path::new("/data")),
            caches: Caches::default(),
            queue: ResubmissionQueue::new(5),
            host: RecordingHost::new(),
            effects: Vec::new(),
        }
    }

    fn dispatch(&mut self, handler: ChannelHandler, data: Value) -> chime_core::Result<()> {
        let mut dispatcher = Dispatcher {
            account: &self.account,
            caches: &mut self.caches,
            queue: &mut self.queue,
            host: self.host.as_ref(),
            effects: &mut self.effects,
        };
        dispatcher.handle_event(&handler, &data)
    }

    fn with_contact(mut self, id: &str, email: &str) -> Self {
        self.caches
            .contacts
            .upsert(Contact::from_record(&contact_record(id, email, &format!("presence-{}", id))).unwrap());
        self
    }

    fn fetches(&self) -> Vec<(EntityKind, String)> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Fetch { kind, id } => Some((*kind, id.clone())),
                _ => None,
            })
            .collect()
    }
}

fn room(id: &str) -> ChannelHandler {
    ChannelHandler::Room(id.to_string())
}

#[test]
fn test_room_message_from_known_contact() {
    let mut f = Fixture::new().with_contact("p2", "bob@example.com");
    f.caches
        .rooms
        .upsert(Room::from_record(&room_record("r1", "Team", "room-ch")).unwrap());

    f.dispatch(room("r1"), event("RoomMessage", "create", message_record("m1", "p2", "hello")))
        .unwrap();

    let messages = f.host.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].from, "bob@example.com");
    assert_eq!(messages[0].body, "hello");
    assert_eq!(
        messages[0].target,
        Target::Chat {
            chat_id: "r1".into()
        }
    );
    assert!(f.effects.is_empty());
}

#[test]
fn test_unknown_sender_falls_back_to_id_and_fetches_once() {
    let mut f = Fixture::new();
    for id in ["m1", "m2"] {
        f.dispatch(room("r1"), event("RoomMessage", "create", message_record(id, "p9", "x")))
            .unwrap();
    }

    let messages = f.host.messages();
    assert_eq!(messages[0].from, "p9");
    assert_eq!(
        f.fetches(),
        vec![
            (EntityKind::Room, "r1".to_string()),
            (EntityKind::Contact, "p9".to_string()),
        ]
    );
}

#[test]
fn test_own_message_uses_account_email() {
    let mut f = Fixture::new();
    f.dispatch(room("r1"), event("RoomMessage", "create", message_record("m1", OWN_ID, "x")))
        .unwrap();
    assert_eq!(f.host.messages()[0].from, OWN_EMAIL);
    assert!(!f.fetches().iter().any(|(kind, _)| *kind == EntityKind::Contact));
}

#[test]
fn test_room_id_from_record_wins_over_handler() {
    let mut f = Fixture::new();
    let mut record = message_record("m1", OWN_ID, "x");
    record["RoomId"] = json!("r2");
    f.dispatch(room("r1"), event("RoomMessage", "create", record))
        .unwrap();
    assert_eq!(
        f.host.messages()[0].target,
        Target::Chat {
            chat_id: "r2".into()
        }
    );
}

#[test]
fn test_room_message_without_room_fails() {
    let mut f = Fixture::new();
    let result = f.dispatch(
        ChannelHandler::Device,
        event("RoomMessage", "create", message_record("m1", "p2", "x")),
    );
    assert!(result.is_err());
    assert!(f.host.messages().is_empty());
}

#[test]
fn test_im_messages_apply_self_echo_rule() {
    let mut f = Fixture::new().with_contact("p2", "bob@example.com");
    f.caches.conversations.upsert(
        Conversation::from_record(&conversation_record("c1", "conv-ch", &[OWN_ID, "p2"])).unwrap(),
    );
    let handler = ChannelHandler::Conversation("c1".into());

    f.dispatch(
        handler.clone(),
        event("ConversationMessage", "create", message_record("m1", "p2", "hi")),
    )
    .unwrap();
    f.dispatch(
        handler,
        event("ConversationMessage", "create", message_record("m2", OWN_ID, "from my phone")),
    )
    .unwrap();

    let messages = f.host.messages();
    let im = Target::Im {
        peer_email: "bob@example.com".into(),
    };
    assert_eq!(messages[0].target, im);
    assert_eq!(messages[0].direction, Direction::Received);
    assert_eq!(messages[1].target, im);
    assert_eq!(messages[1].direction, Direction::Sent);
}

#[test]
fn test_group_conversation_is_chat() {
    let mut f = Fixture::new();
    f.caches.conversations.upsert(
        Conversation::from_record(&conversation_record("c1", "conv-ch", &[OWN_ID, "p2", "p3"]))
            .unwrap(),
    );
    f.dispatch(
        ChannelHandler::Conversation("c1".into()),
        event("ConversationMessage", "create", message_record("m1", OWN_ID, "hi")),
    )
    .unwrap();
    assert_eq!(
        f.host.messages()[0].target,
        Target::Chat {
            chat_id: "c1".into()
        }
    );
}

#[test]
fn test_unknown_conversation_is_fetched() {
    let mut f = Fixture::new();
    f.dispatch(
        ChannelHandler::Conversation("c1".into()),
        event("ConversationMessage", "create", message_record("m1", OWN_ID, "hi")),
    )
    .unwrap();
    assert_eq!(f.fetches(), vec![(EntityKind::Conversation, "c1".to_string())]);
    assert!(f.caches.conversations.is_pending("c1"));
    // Whether it is an IM is unknown until the conversation resolves
    assert!(f.host.messages().is_empty());
}

#[test]
fn test_held_messages_follow_conversation_update() {
    let mut f = Fixture::new().with_contact("p2", "bob@example.com");
    let handler = ChannelHandler::Conversation("c1".into());
    for (id, body) in [("m1", "first"), ("m2", "second")] {
        f.dispatch(
            handler.clone(),
            event("ConversationMessage", "create", message_record(id, "p2", body)),
        )
        .unwrap();
    }
    assert!(f.host.messages().is_empty());

    f.dispatch(
        ChannelHandler::Device,
        event("Conversation", "update", conversation_record("c1", "conv-ch", &[OWN_ID, "p2"])),
    )
    .unwrap();

    let messages = f.host.messages();
    let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second"]);
    assert!(messages.iter().all(|m| m.target
        == Target::Im {
            peer_email: "bob@example.com".into()
        }));
    assert!(f.caches.take_held("c1").is_empty());
}

#[test]
fn test_own_echo_acknowledges_queue_and_is_not_shown() {
    let mut f = Fixture::new();
    let id = f.queue.enqueue("r1", "hello", None).unwrap();
    let mut record = message_record("m1", OWN_ID, "hello");
    record["ClientRequestToken"] = json!(id);

    f.dispatch(room("r1"), event("RoomMessage", "create", record.clone()))
        .unwrap();
    assert!(f.queue.is_empty());
    assert!(f.host.messages().is_empty());

    // A second echo with the same token no longer matches anything
    f.dispatch(room("r1"), event("RoomMessage", "create", record))
        .unwrap();
    assert_eq!(f.host.messages().len(), 1);
}

#[parameterized(
    from_peer = { "p2", "r1" },
    other_room = { OWN_ID, "r2" },
)]
fn test_foreign_token_does_not_acknowledge(sender: &str, room_id: &str) {
    let mut f = Fixture::new();
    let id = f.queue.enqueue("r1", "hello", None).unwrap();
    let mut record = message_record("m1", sender, "their text");
    record["ClientRequestToken"] = json!(id);

    f.dispatch(room(room_id), event("RoomMessage", "create", record))
        .unwrap();
    assert_eq!(f.queue.len(), 1);
    assert!(f.queue.contains(&id));
    assert_eq!(f.host.messages().len(), 1);
    assert_eq!(f.host.messages()[0].body, "their text");
}

#[test]
fn test_attachment_queues_download() {
    let mut f = Fixture::new();
    let mut record = message_record("m7", OWN_ID, "");
    record["Attachment"] = json!({
        "FileName": "pic.png",
        "Url": "https://files.example.com/pic",
        "ContentType": "image/png",
    });
    f.dispatch(room("r1"), event("RoomMessage", "create", record))
        .unwrap();

    assert!(f.host.messages().is_empty());
    let download = f
        .effects
        .iter()
        .find_map(|e| match e {
            Effect::Download(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(download.dir, Path::new("/data/me@example.com/downloads"));
    assert_eq!(download.attachment.filename, "pic.png");
    assert_eq!(download.from, OWN_EMAIL);
}

#[test]
fn test_conversation_event_subscribes_channel() {
    let mut f = Fixture::new();
    f.dispatch(
        ChannelHandler::Device,
        event("Conversation", "create", conversation_record("c1", "conv-ch", &[OWN_ID, "p2"])),
    )
    .unwrap();

    assert!(f.caches.conversations.get("c1").unwrap().resolved);
    assert_eq!(
        f.effects,
        vec![Effect::Subscribe {
            channel: "conv-ch".into(),
            handler: ChannelHandler::Conversation("c1".into()),
        }]
    );
}

#[parameterized(
    by_type = { "delete", json!({"ConversationId": "c1"}) },
    by_flag = { "update", json!({"ConversationId": "c1", "Deleted": true}) },
)]
fn test_conversation_delete_unsubscribes(kind: &str, record: Value) {
    let mut f = Fixture::new();
    f.caches.conversations.upsert(
        Conversation::from_record(&conversation_record("c1", "conv-ch", &[OWN_ID, "p2"])).unwrap(),
    );
    f.dispatch(ChannelHandler::Device, event("Conversation", kind, record))
        .unwrap();

    assert!(f.caches.conversations.get("c1").is_none());
    assert_eq!(
        f.effects,
        vec![Effect::Unsubscribe {
            channel: "conv-ch".into()
        }]
    );
}

#[test]
fn test_room_delete_and_leave() {
    let mut f = Fixture::new();
    f.caches
        .rooms
        .upsert(Room::from_record(&room_record("r1", "Team", "room-ch")).unwrap());
    f.caches
        .rooms
        .upsert(Room::from_record(&room_record("r2", "Other", "room-2")).unwrap());

    // Someone else leaving changes nothing
    f.dispatch(
        ChannelHandler::Device,
        event(
            "RoomMembership",
            "update",
            json!({"RoomId": "r1", "Status": "Left", "Member": {"ProfileId": "p2"}}),
        ),
    )
    .unwrap();
    assert!(f.caches.rooms.get("r1").is_some());

    f.dispatch(
        ChannelHandler::Device,
        event(
            "RoomMembership",
            "update",
            json!({"RoomId": "r1", "Status": "Left", "Member": {"ProfileId": OWN_ID}}),
        ),
    )
    .unwrap();
    f.dispatch(ChannelHandler::Device, event("Room", "delete", json!({"RoomId": "r2"})))
        .unwrap();

    assert!(f.caches.rooms.is_empty());
    assert_eq!(
        f.effects,
        vec![
            Effect::Unsubscribe {
                channel: "room-ch".into()
            },
            Effect::Unsubscribe {
                channel: "room-2".into()
            },
        ]
    );
}

#[test]
fn test_contact_event_watches_presence_and_keeps_availability() {
    let mut f = Fixture::new();
    f.dispatch(
        ChannelHandler::Device,
        event("Presence", "update", json!({"ProfileId": "p2", "Availability": 2})),
    )
    .unwrap();
    assert_eq!(f.fetches(), vec![(EntityKind::Contact, "p2".to_string())]);
    f.effects.clear();

    f.dispatch(
        ChannelHandler::Device,
        event("Contact", "update", contact_record("p2", "bob@example.com", "presence-bob")),
    )
    .unwrap();

    let contact = f.caches.contacts.get("p2").unwrap();
    assert!(contact.resolved);
    assert_eq!(contact.availability, Availability::Available);
    assert_eq!(
        f.effects,
        vec![Effect::Subscribe {
            channel: "presence-bob".into(),
            handler: ChannelHandler::Presence("p2".into()),
        }]
    );
}

#[test]
fn test_own_profile_does_not_watch_presence() {
    let mut f = Fixture::new();
    f.dispatch(
        ChannelHandler::Profile,
        event("Profile", "update", contact_record(OWN_ID, OWN_EMAIL, "presence-me")),
    )
    .unwrap();
    assert!(f.effects.is_empty());

    f.dispatch(
        ChannelHandler::Presence(OWN_ID.into()),
        event("Presence", "update", json!({"ProfileId": OWN_ID, "Availability": 3})),
    )
    .unwrap();
    assert_eq!(
        f.caches.contacts.get(OWN_ID).unwrap().availability,
        Availability::Away
    );
    assert!(f.effects.is_empty());
}

#[test]
fn test_contact_delete_unsubscribes_presence() {
    let mut f = Fixture::new().with_contact("p2", "bob@example.com");
    f.dispatch(ChannelHandler::Device, event("Contact", "delete", json!({"ProfileId": "p2"})))
        .unwrap();
    assert!(f.caches.contacts.get("p2").is_none());
    assert_eq!(
        f.effects,
        vec![Effect::Unsubscribe {
            channel: "presence-p2".into()
        }]
    );
}

#[test]
fn test_unknown_klass_is_ignored() {
    let mut f = Fixture::new();
    f.dispatch(ChannelHandler::Device, json!({"klass": "Typing", "record": {}}))
        .unwrap();
    f.dispatch(ChannelHandler::Device, json!("not an object"))
        .unwrap();
    assert!(f.effects.is_empty());
    assert!(f.host.messages().is_empty());
}

#[test]
fn test_complete_fetch_contact_subscribes_presence() {
    let mut f = Fixture::new();
    f.caches.contacts.lookup("p2");

    let effects = complete_fetch(
        &mut f.caches,
        &f.account,
        EntityKind::Contact,
        "p2",
        &contact_record("p2", "bob@example.com", "presence-bob"),
    )
    .unwrap();

    assert_eq!(
        effects,
        vec![Effect::Subscribe {
            channel: "presence-bob".into(),
            handler: ChannelHandler::Presence("p2".into()),
        }]
    );
    assert_eq!(
        f.caches.contacts.get_by_key("bob@example.com").unwrap().profile_id,
        "p2"
    );
}

#[test]
fn test_complete_fetch_not_pending_is_dropped() {
    let mut f = Fixture::new();
    let effects = complete_fetch(
        &mut f.caches,
        &f.account,
        EntityKind::Conversation,
        "c1",
        &conversation_record("c1", "conv-ch", &[OWN_ID, "p2"]),
    )
    .unwrap();
    assert!(effects.is_empty());
    assert!(f.caches.conversations.get("c1").is_none());
}

#[test]
fn test_complete_fetch_conversation_and_room() {
    let mut f = Fixture::new();
    f.caches.conversations.lookup("c1");
    f.caches.rooms.lookup("r1");

    let effects = complete_fetch(
        &mut f.caches,
        &f.account,
        EntityKind::Conversation,
        "c1",
        &conversation_record("c1", "conv-ch", &[OWN_ID, "p2"]),
    )
    .unwrap();
    assert_eq!(
        effects,
        vec![Effect::Subscribe {
            channel: "conv-ch".into(),
            handler: ChannelHandler::Conversation("c1".into()),
        }]
    );

    let effects = complete_fetch(
        &mut f.caches,
        &f.account,
        EntityKind::Room,
        "r1",
        &room_record("r1", "Team", "room-ch"),
    )
    .unwrap();
    assert!(effects.is_empty());
    assert_eq!(
        f.caches.rooms.get("r1").unwrap().name.as_deref(),
        Some("Team")
    );
}

#[test]
fn test_account_download_dir() {
    let account = Account::new(&crate::test_helpers::session_info(), Path::new("/data"), 10);
    assert_eq!(account.email, OWN_EMAIL);
    assert_eq!(account.profile_id, OWN_ID);
    assert_eq!(account.downloads_dir, Path::new("/data/me@example.com/downloads"));
    assert_eq!(account.max_attachment_size, 10);
}
