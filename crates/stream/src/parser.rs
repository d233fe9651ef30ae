// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-by-line NDJSON parsing and stream accumulation.
//!
//! The supervisor feeds stdout lines through [`parse_line`] and folds the
//! events into a [`ParsedStream`] with [`collect`]. Malformed lines are
//! logged and skipped; they never abort the stream.

use crate::event::{AssistantEvent, RunResult};
use indexmap::IndexSet;
use serde_json::Value;

/// Tools that modify files, keyed to the input field holding the path.
const FILE_MOD_TOOLS: &[(&str, &str)] = &[
    ("Edit", "file_path"),
    ("Write", "file_path"),
    ("MultiEdit", "file_path"),
];

/// Accumulated data from a fully parsed NDJSON stream.
#[derive(Debug, Clone, Default)]
pub struct ParsedStream {
    /// Events in receipt order.
    pub events: Vec<AssistantEvent>,
    /// First non-empty session id from init/system events, or the
    /// result's.
    pub session_id: Option<String>,
    /// Terminal result, absent on timeout.
    pub result: Option<RunResult>,
    /// Concatenated `text` blocks.
    pub assistant_text: String,
    /// Concatenated `thinking` blocks.
    pub thinking_text: String,
    /// File paths touched by file-modifying tools, first-seen order.
    pub files_modified: Vec<String>,
    /// Tool names seen, first-seen order.
    pub tools_used: IndexSet<String>,
    /// Supervisor-level errors (spawn failures etc.), not assistant output.
    pub errors: Vec<String>,
}

impl ParsedStream {
    /// Number of `user` events, used as a turn estimate when no result
    /// arrived.
    pub fn user_event_count(&self) -> u32 {
        self.events.iter().filter(|e| e.kind == "user").count() as u32
    }
}

/// Parse a single NDJSON line.
///
/// Empty and whitespace-only lines yield `None` silently; malformed JSON
/// yields `None` with a warning.
pub fn parse_line(line: &str) -> Option<AssistantEvent> {
    let stripped = line.trim();
    if stripped.is_empty() {
        return None;
    }

    let raw: Value = match serde_json::from_str(stripped) {
        Ok(v) => v,
        Err(e) => {
            let preview: String = stripped.chars().take(200).collect();
            tracing::warn!(line = %preview, error = %e, "malformed NDJSON line");
            return None;
        }
    };

    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    Some(AssistantEvent { kind, raw })
}

/// Fold a list of events into a [`ParsedStream`].
pub fn collect(events: Vec<AssistantEvent>) -> ParsedStream {
    let mut parsed = ParsedStream::default();

    for event in &events {
        fold_event(event, &mut parsed);
    }

    parsed.events = events;
    parsed
}

fn fold_event(event: &AssistantEvent, parsed: &mut ParsedStream) {
    match event.kind.as_str() {
        "init" => {
            if let Some(id) = event.session_id() {
                parsed.session_id = Some(id.to_string());
            }
        }
        "system" => {
            // Newer CLI versions carry the session id on system events;
            // the first one seen wins.
            if parsed.session_id.is_none() {
                if let Some(id) = event.session_id() {
                    if !id.is_empty() {
                        parsed.session_id = Some(id.to_string());
                    }
                }
            }
        }
        "result" => {
            if let Some(id) = event.session_id() {
                parsed.session_id = Some(id.to_string());
            }
            parsed.result = Some(RunResult::from_raw(&event.raw));
        }
        "assistant" => {
            let blocks = event
                .raw
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_array);
            if let Some(blocks) = blocks {
                for block in blocks {
                    fold_content_block(block, parsed);
                }
            }
        }
        "content_block_start" => {
            if let Some(block) = event.raw.get("content_block") {
                fold_content_block(block, parsed);
            }
        }
        _ => {}
    }
}

fn fold_content_block(block: &Value, parsed: &mut ParsedStream) {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                parsed.assistant_text.push_str(text);
            }
        }
        Some("thinking") => {
            if let Some(text) = block.get("thinking").and_then(Value::as_str) {
                parsed.thinking_text.push_str(text);
            }
        }
        Some("tool_use") => {
            let Some(name) = block.get("name").and_then(Value::as_str) else {
                return;
            };
            parsed.tools_used.insert(name.to_string());

            let path_key = FILE_MOD_TOOLS
                .iter()
                .find(|(tool, _)| *tool == name)
                .map(|(_, key)| *key);
            if let Some(key) = path_key {
                // Only string-typed paths are accepted
                let path = block
                    .get("input")
                    .and_then(|input| input.get(key))
                    .and_then(Value::as_str);
                if let Some(path) = path {
                    if !parsed.files_modified.iter().any(|p| p == path) {
                        parsed.files_modified.push(path.to_string());
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
