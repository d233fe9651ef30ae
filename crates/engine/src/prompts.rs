// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt templates for the iteration loop.

use std::path::Path;

/// Prompt used after the assistant reported an error.
pub const RECOVERY_PROMPT: &str = "The previous iteration encountered an error. \
    Please review the current state and continue from where we left off.";

/// Fallback continuation when research is unavailable.
pub const FALLBACK_CONTINUATION: &str = "Continue implementing the current plan.";

/// Short safe prompt used by `--smoke-test`.
const SMOKE_TEST_PROMPT: &str = "Review the current project. List the main files and their \
    purpose briefly. Then output PROJECT_COMPLETE.";

/// Pick the default initial prompt for a workspace.
///
/// Prefers the project description (`CLAUDE.md`, also checked one level
/// up since the assistant searches upward) and instructs the assistant to
/// follow its roadmap.
pub fn default_prompt(workspace: &Path, smoke_test: bool) -> String {
    if smoke_test {
        return SMOKE_TEST_PROMPT.to_string();
    }

    let has_claude_md = workspace.join("CLAUDE.md").exists()
        || workspace
            .parent()
            .is_some_and(|parent| parent.join("CLAUDE.md").exists());
    if has_claude_md {
        return "Read CLAUDE.md first — it contains the current roadmap with phases and their \
                status. Implement the first phase marked TODO. Do NOT output PROJECT_COMPLETE \
                unless every phase in CLAUDE.md is marked COMPLETE."
            .to_string();
    }

    "Review the project and continue implementation from where we left off.".to_string()
}

/// Wrap a research response into the next iteration's prompt.
pub fn build_next_prompt(research_response: &str) -> String {
    format!(
        "Continue the implementation. Here are the strategic next steps from research:\n\n\
         {research_response}\n\n\
         Focus on the highest priority item. If all tasks are complete, output PROJECT_COMPLETE."
    )
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
