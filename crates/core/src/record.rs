// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Field access helpers for JSON records returned by the Chime services.
//!
//! Server records are PascalCase JSON objects. Required members go through
//! the `parse_*` helpers, which report which member was missing; optional
//! members use [`opt_string`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Error, Result};

/// Returns a required string member.
pub fn parse_string<'a>(node: &'a Value, member: &str, context: &'static str) -> Result<&'a str> {
    match node.get(member) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(Error::InvalidField {
            field: member.to_string(),
            reason: "expected a string".to_string(),
        }),
        None => Err(Error::missing(member, context)),
    }
}

/// Returns an optional, non-empty string member.
pub fn opt_string(node: &Value, member: &str) -> Option<String> {
    node.get(member)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Returns a required integer member; numeric strings are accepted.
pub fn parse_int(node: &Value, member: &str, context: &'static str) -> Result<i64> {
    let value = node.get(member).ok_or_else(|| Error::missing(member, context))?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::InvalidField {
        field: member.to_string(),
        reason: format!("expected an integer, got {}", value),
    })
}

/// Returns a boolean member, defaulting to `false` when absent.
///
/// The services encode booleans either as JSON booleans or as the strings
/// `"true"`/`"false"`.
pub fn parse_boolean(node: &Value, member: &str) -> Result<bool> {
    match node.get(member) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s == "true" => Ok(true),
        Some(Value::String(s)) if s == "false" => Ok(false),
        Some(other) => Err(Error::InvalidField {
            field: member.to_string(),
            reason: format!("expected a boolean, got {}", other),
        }),
    }
}

/// Returns a required RFC 3339 timestamp member.
pub fn parse_time(node: &Value, member: &str, context: &'static str) -> Result<DateTime<Utc>> {
    let text = parse_string(node, member, context)?;
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::InvalidField {
            field: member.to_string(),
            reason: e.to_string(),
        })
}

/// Returns an optional RFC 3339 timestamp member; unparseable values are treated as absent.
pub fn opt_time(node: &Value, member: &str) -> Option<DateTime<Utc>> {
    node.get(member)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
