// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! chime-core: Shared data types for the Chime client engine
//!
//! This crate provides the wire protocol codec, server record parsing, and
//! the entity and session data model used by the `chime` engine. It performs
//! no I/O of its own.

pub mod entity;
pub mod error;
pub mod protocol;
pub mod record;
pub mod session;

pub use entity::{Attachment, Availability, Contact, Conversation, Message, Room};
pub use error::{Error, Result};
pub use protocol::{Frame, FrameType, Handshake, Packet};
pub use session::{ServiceEndpoints, Session};
