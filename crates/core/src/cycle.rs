// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record of a single completed loop iteration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters of the submitted prompt kept in the record.
pub const PROMPT_PREVIEW_LEN: usize = 200;

/// One completed iteration: the assistant invocation plus its outcome.
///
/// Immutable after it is appended to the workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub iteration: u64,
    #[serde(default)]
    pub prompt_preview: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CycleRecord {
    /// Truncate a prompt to the stored preview length on a char boundary.
    pub fn preview_of(prompt: &str) -> String {
        prompt.chars().take(PROMPT_PREVIEW_LEN).collect()
    }

    /// A cycle with zero turns and zero cost is classified as a timeout
    /// for analytics purposes.
    pub fn looks_like_timeout(&self) -> bool {
        self.num_turns == 0 && self.cost_usd == 0.0
    }
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod tests;
