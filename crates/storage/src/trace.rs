// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only trace sink for loop observability.
//!
//! One JSON object per line in `.workflow/trace.jsonl`, carrying a UTC
//! timestamp, the event type, the current iteration, and event-specific
//! fields. External dashboards consume these records, so the event-type
//! vocabulary is a public interface: extending it is allowed, narrowing
//! it is not.
//!
//! Current vocabulary: `loop_start`, `claude_invoke`, `claude_complete`,
//! `completion_detected`, `research_start`, `research_complete`,
//! `timeout_detected`, `timeout_cooldown`, `model_fallback`,
//! `model_fallback_revert`, `stagnation_reset`, `stagnation_exit`,
//! `session_rotation`, `budget_exceeded`, `preflight_failed`, `loop_end`.

use crate::store::workflow_dir;
use serde_json::{json, Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Trace file name within the workflow directory.
const TRACE_FILE: &str = "trace.jsonl";

/// Append-only JSONL sink with size-triggered rotation.
pub struct TraceSink {
    path: PathBuf,
    /// Rotate when the file exceeds this size; 0 disables rotation.
    max_size_bytes: u64,
}

impl TraceSink {
    /// Create a sink for the given workspace.
    pub fn new(workspace: &Path, max_size_bytes: u64) -> Self {
        Self {
            path: workflow_dir(workspace).join(TRACE_FILE),
            max_size_bytes,
        }
    }

    /// Path of the trace file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one trace event.
    ///
    /// Best-effort: failures are logged and swallowed — tracing must not
    /// break the loop.
    pub fn emit(&self, iteration: u64, event_type: &str, fields: Value) {
        if let Err(e) = self.try_emit(iteration, event_type, fields) {
            tracing::warn!(event_type, error = %e, "failed to write trace event");
        }
    }

    fn try_emit(
        &self,
        iteration: u64,
        event_type: &str,
        fields: Value,
    ) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.rotate_if_needed();

        let mut event = Map::new();
        event.insert(
            "timestamp".into(),
            json!(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)),
        );
        event.insert("event_type".into(), json!(event_type));
        event.insert("iteration".into(), json!(iteration));
        if let Value::Object(extra) = fields {
            for (key, value) in extra {
                event.insert(key, value);
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", Value::Object(event))?;
        Ok(())
    }

    /// Rotate `trace.jsonl` to `trace.jsonl.1` when it exceeds the limit,
    /// replacing any prior rotation.
    fn rotate_if_needed(&self) {
        if self.max_size_bytes == 0 {
            return;
        }
        let size = match fs::metadata(&self.path) {
            Ok(m) => m.len(),
            Err(_) => return,
        };
        if size <= self.max_size_bytes {
            return;
        }

        let rotated = PathBuf::from(format!("{}.1", self.path.display()));
        let _ = fs::remove_file(&rotated);
        if let Err(e) = fs::rename(&self.path, &rotated) {
            tracing::warn!(error = %e, "failed to rotate trace file");
        }
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
