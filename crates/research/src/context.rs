// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project context gathering for research queries.
//!
//! Collects a bounded snapshot of the workspace: the project description,
//! memory notes, a trimmed view of the workflow state, recent commits, and
//! the previous research result. Absent inputs are skipped; gathering
//! never fails.

use grist_storage::workflow_dir;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Per-input character caps keep the assembled query bounded.
const CLAUDE_MD_CAP: usize = 3000;
const MEMORY_MD_CAP: usize = 2000;
const LAST_RESEARCH_CAP: usize = 2000;

/// Timeout for the `git log` subprocess.
const GIT_LOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Gathers project context for research queries.
pub struct SessionContext {
    workspace: PathBuf,
}

impl SessionContext {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
        }
    }

    /// Build the full research query: strategist preamble, context
    /// sections, and the closing question.
    pub async fn build_query(&self, extra_context: Option<&str>) -> String {
        let mut parts = vec![
            "You are a software development strategist analyzing a project's current state."
                .to_string(),
            "Based on the context below, provide specific, actionable next steps.".to_string(),
            "Focus on: what to implement next, potential blockers, and strategic priorities."
                .to_string(),
            String::new(),
        ];

        if let Some(text) = self.read_capped(&self.workspace.join("CLAUDE.md"), CLAUDE_MD_CAP) {
            parts.push("## Project Definition (CLAUDE.md)".to_string());
            parts.push(text);
            parts.push(String::new());
        }

        if let Some(text) = self.read_capped(&self.workspace.join("MEMORY.md"), MEMORY_MD_CAP) {
            parts.push("## Memory Notes (MEMORY.md)".to_string());
            parts.push(text);
            parts.push(String::new());
        }

        if let Some(text) = self.state_summary() {
            parts.push("## Current Workflow State".to_string());
            parts.push(text);
            parts.push(String::new());
        }

        if let Some(text) = self.git_log().await {
            parts.push("## Recent Commits".to_string());
            parts.push(text);
            parts.push(String::new());
        }

        let research_file = workflow_dir(&self.workspace).join("research_result.md");
        if let Some(text) = self.read_capped(&research_file, LAST_RESEARCH_CAP) {
            parts.push("## Previous Research Result".to_string());
            parts.push(text);
            parts.push(String::new());
        }

        if let Some(extra) = extra_context {
            parts.push("## Additional Context".to_string());
            parts.push(extra.to_string());
            parts.push(String::new());
        }

        parts.push("## Question".to_string());
        parts.push(
            "What are the top 3-5 most important next steps for this project? \
             Be specific about files to modify, features to implement, and potential issues. \
             If the project appears complete, respond with PROJECT_COMPLETE."
                .to_string(),
        );

        parts.join("\n")
    }

    fn read_capped(&self, path: &Path, cap: usize) -> Option<String> {
        let text = std::fs::read_to_string(path).ok()?;
        Some(text.chars().take(cap).collect())
    }

    /// A trimmed view of `.workflow/state.json`: iteration, status,
    /// metrics, last session id.
    fn state_summary(&self) -> Option<String> {
        let path = workflow_dir(&self.workspace).join("state.json");
        let raw = std::fs::read_to_string(path).ok()?;
        let state: serde_json::Value = serde_json::from_str(&raw).ok()?;

        let summary = serde_json::json!({
            "iteration": state.get("iteration").cloned().unwrap_or(0.into()),
            "status": state.get("status").cloned().unwrap_or("unknown".into()),
            "metrics": state.get("metrics").cloned().unwrap_or_default(),
            "last_session_id": state.get("last_session_id").cloned().unwrap_or_default(),
        });
        serde_json::to_string_pretty(&summary).ok()
    }

    /// Last 10 oneline commits, or `None` outside a repository.
    async fn git_log(&self) -> Option<String> {
        let mut cmd = Command::new("git");
        cmd.args(["log", "--oneline", "-10"])
            .current_dir(&self.workspace)
            .stdin(std::process::Stdio::null());

        let output = tokio::time::timeout(GIT_LOG_TIMEOUT, cmd.output())
            .await
            .ok()?
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
