// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Juggernaut wire protocol.
//!
//! The real-time channel speaks two layers:
//! - [`Packet`]: Socket.IO 0.9 framing (`<kind>:<id>:<endpoint>:<data>`), one
//!   packet per websocket text message
//! - [`Frame`]: the JSON channel frame carried in message (`3`) packets
//!
//! Before the websocket is opened the client negotiates a socket key over
//! HTTP; the response body is parsed by [`Handshake::parse`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Member of an ack or outgoing event payload carrying the correlation id.
pub const CLIENT_REQUEST_TOKEN: &str = "ClientRequestToken";

/// Frame types understood by the Juggernaut service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Fresh subscription to a channel.
    Subscribe,
    /// Drop a channel subscription.
    Unsubscribe,
    /// Resume a subscription after reconnect; the server may replay missed events.
    Resubscribe,
    /// Event pushed on a channel (or an outgoing message from the client).
    Event,
    /// Server acknowledgment of an outgoing message.
    Ack,
}

impl FrameType {
    /// Returns the wire name of the frame type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::Subscribe => "subscribe",
            FrameType::Unsubscribe => "unsubscribe",
            FrameType::Resubscribe => "resubscribe",
            FrameType::Event => "event",
            FrameType::Ack => "ack",
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel-scoped frame.
///
/// Encodes as `{"type": ..., "channel": ..., "data": ...}`; `data` is omitted
/// for control frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: FrameType,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Frame {
    fn control(kind: FrameType, channel: impl Into<String>) -> Self {
        Frame {
            kind,
            channel: channel.into(),
            data: None,
        }
    }

    /// Creates a subscribe frame.
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Frame::control(FrameType::Subscribe, channel)
    }

    /// Creates an unsubscribe frame.
    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Frame::control(FrameType::Unsubscribe, channel)
    }

    /// Creates a resubscribe frame.
    pub fn resubscribe(channel: impl Into<String>) -> Self {
        Frame::control(FrameType::Resubscribe, channel)
    }

    /// Creates an event frame carrying `data`.
    pub fn event(channel: impl Into<String>, data: Value) -> Self {
        Frame {
            kind: FrameType::Event,
            channel: channel.into(),
            data: Some(data),
        }
    }

    /// Creates an outgoing message event for the given destination.
    pub fn message(target: impl Into<String>, correlation_id: &str, content: &str) -> Self {
        Frame::event(
            target,
            serde_json::json!({
                "klass": "Message",
                CLIENT_REQUEST_TOKEN: correlation_id,
                "Content": content,
            }),
        )
    }

    /// Creates an ack frame for the given correlation id.
    pub fn ack(channel: impl Into<String>, correlation_id: &str) -> Self {
        Frame {
            kind: FrameType::Ack,
            channel: channel.into(),
            data: Some(serde_json::json!({ CLIENT_REQUEST_TOKEN: correlation_id })),
        }
    }

    /// Returns the correlation id carried in the payload, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get(CLIENT_REQUEST_TOKEN))
            .and_then(Value::as_str)
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a frame from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// A Socket.IO 0.9 packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `0::` the peer is closing the session.
    Disconnect,
    /// `1::` the server accepted the socket.
    Connect,
    /// `2::` keepalive; must be echoed back verbatim.
    Heartbeat,
    /// `3:::<json>` a channel frame.
    Message(Frame),
    /// `7:::<reason>` server-side error.
    Error(String),
    /// `8::` no-op.
    Noop,
}

impl Packet {
    /// Encodes the packet as websocket text.
    pub fn encode(&self) -> Result<String> {
        let text = match self {
            Packet::Disconnect => "0::".to_string(),
            Packet::Connect => "1::".to_string(),
            Packet::Heartbeat => "2::".to_string(),
            Packet::Message(frame) => format!("3:::{}", frame.to_json()?),
            Packet::Error(reason) => format!("7:::{}", reason),
            Packet::Noop => "8::".to_string(),
        };
        Ok(text)
    }

    /// Decodes websocket text into a packet.
    pub fn decode(text: &str) -> Result<Self> {
        let mut parts = text.splitn(4, ':');
        let kind = parts.next().unwrap_or_default();
        // Every packet carries at least `<kind>:<id>:`
        if parts.next().is_none() || parts.next().is_none() {
            return Err(Error::MalformedPacket(text.to_string()));
        }
        let data = parts.next().unwrap_or_default();

        match kind {
            "0" => Ok(Packet::Disconnect),
            "1" => Ok(Packet::Connect),
            "2" => Ok(Packet::Heartbeat),
            "3" if data.is_empty() => Err(Error::MalformedPacket(text.to_string())),
            "3" => Ok(Packet::Message(Frame::from_json(data)?)),
            "7" => Ok(Packet::Error(data.to_string())),
            "8" => Ok(Packet::Noop),
            other => Err(Error::UnknownPacketKind(other.to_string())),
        }
    }
}

/// Parsed response of the socket key negotiation.
///
/// The body has the form `<key>:<heartbeat_secs>:<close_secs>:<transports>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub key: String,
    pub heartbeat_secs: u64,
    pub close_timeout_secs: u64,
    pub transports: Vec<String>,
}

impl Handshake {
    pub fn parse(body: &str) -> Result<Self> {
        let fields: Vec<&str> = body.trim().split(':').collect();
        if fields.len() != 4 {
            return Err(Error::InvalidHandshake(format!(
                "expected 4 fields, got {}",
                fields.len()
            )));
        }
        if fields[0].is_empty() {
            return Err(Error::InvalidHandshake("empty key".to_string()));
        }

        let seconds = |name: &str, value: &str| -> Result<u64> {
            if value.is_empty() {
                return Ok(0);
            }
            value
                .parse()
                .map_err(|_| Error::InvalidHandshake(format!("bad {} value '{}'", name, value)))
        };

        Ok(Handshake {
            key: fields[0].to_string(),
            heartbeat_secs: seconds("heartbeat", fields[1])?,
            close_timeout_secs: seconds("close timeout", fields[2])?,
            transports: fields[3]
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    /// Returns true if the server offers the websocket transport.
    pub fn supports_websocket(&self) -> bool {
        self.transports.iter().any(|t| t == "websocket")
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
