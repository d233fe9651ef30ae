// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event shapes emitted by the assistant CLI in `stream-json` mode.
//!
//! Events are kept loosely typed: the CLI adds fields between releases, so
//! each event holds its raw JSON object alongside the `type` discriminator.
//! Only the fields the driver acts on are pulled out.

use serde_json::Value;

/// A single parsed NDJSON event.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantEvent {
    /// The `type` discriminator: `init`, `system`, `assistant`, `user`,
    /// `result`, `content_block_start`, ... Unknown types are kept.
    pub kind: String,
    pub raw: Value,
}

impl AssistantEvent {
    /// The `session_id` field, when present.
    pub fn session_id(&self) -> Option<&str> {
        self.raw.get("session_id").and_then(Value::as_str)
    }
}

/// Terminal record extracted from a `result` event.
///
/// Its presence is the signal that the assistant completed normally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    pub session_id: String,
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub num_turns: u32,
    pub result_text: String,
    pub is_error: bool,
}

impl RunResult {
    /// Build a result from a raw `result` event object. Missing fields
    /// default to zero/empty.
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            session_id: raw
                .get("session_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            cost_usd: raw
                .get("total_cost_usd")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            duration_ms: raw
                .get("total_duration_ms")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            num_turns: raw
                .get("num_turns")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .min(u64::from(u32::MAX)) as u32,
            result_text: raw
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            is_error: raw
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}
