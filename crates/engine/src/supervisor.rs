// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assistant CLI supervision.
//!
//! Spawns the assistant as a child process, streams its NDJSON stdout
//! through the extractor, and enforces the wall-clock timeout by killing
//! the whole process tree. Two details are load-bearing:
//!
//! - stderr is drained concurrently with stdout; a full stderr pipe
//!   buffer deadlocks the child.
//! - reading stops at the `result` event and the child is then killed:
//!   the CLI does not always close stdout afterwards (known upstream
//!   bug), so waiting for EOF can hang forever.

use crate::kill::kill_process_tree;
use async_trait::async_trait;
use grist_core::AssistantConfig;
use grist_stream::{collect, parse_line, AssistantEvent, ParsedStream, RunResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Instant;

/// Grace period past the timeout before force-killing a blocked read.
const READLINE_GRACE: Duration = Duration::from_secs(30);

/// Bounded wait for the child to exit after kill.
const EXIT_WAIT: Duration = Duration::from_secs(5);

/// Timeout for the preflight `--version` probe.
const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(30);

/// One assistant invocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeSpec {
    pub prompt: String,
    pub resume_session_id: Option<String>,
    pub model: String,
    pub max_turns: u32,
    pub timeout_seconds: u64,
}

/// Errors from the preflight readiness check.
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("assistant executable '{0}' not found on PATH")]
    NotFound(String),
    #[error("assistant preflight timed out after {}s", PREFLIGHT_TIMEOUT.as_secs())]
    Timeout,
    #[error("assistant preflight failed (exit {code:?}): {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// Something that can run one assistant iteration.
///
/// The driver is written against this trait so tests can script
/// iterations without a real CLI.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Run one iteration and return whatever was extracted before the
    /// child finished or was killed. Never fails: spawn errors surface
    /// through `ParsedStream::errors`.
    async fn invoke(&self, spec: &InvokeSpec) -> ParsedStream;

    /// One-shot readiness probe; returns the version line.
    async fn preflight(&self) -> Result<String, PreflightError>;
}

/// Real subprocess supervisor for the assistant CLI.
pub struct Supervisor {
    workspace: PathBuf,
    config: AssistantConfig,
}

impl Supervisor {
    pub fn new(workspace: &Path, config: AssistantConfig) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            config,
        }
    }

    fn command_for(&self, spec: &InvokeSpec) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("-p").arg(&spec.prompt);
        cmd.args(["--output-format", "stream-json"]);
        if self.config.verbose {
            cmd.arg("--verbose");
        }
        cmd.args(["--model", &spec.model]);
        cmd.args(["--max-turns", &spec.max_turns.to_string()]);
        if self.config.dangerously_skip_permissions {
            cmd.arg("--dangerously-skip-permissions");
        }
        if let Some(resume) = &spec.resume_session_id {
            cmd.args(["--resume", resume]);
        }
        cmd.current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[async_trait]
impl Assistant for Supervisor {
    async fn invoke(&self, spec: &InvokeSpec) -> ParsedStream {
        let mut cmd = self.command_for(spec);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    command = self.config.command,
                    error = %e,
                    "failed to spawn assistant CLI"
                );
                let mut parsed = ParsedStream::default();
                parsed
                    .errors
                    .push(format!("failed to spawn '{}': {e}", self.config.command));
                return parsed;
            }
        };

        let pid = child.id().unwrap_or(0);
        tracing::debug!(pid, model = spec.model, "assistant spawned, reading NDJSON events");

        // Drain stderr concurrently to prevent pipe-buffer deadlock
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut captured = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !captured.is_empty() {
                        captured.push('\n');
                    }
                    captured.push_str(&line);
                }
            }
            captured
        });

        let mut events: Vec<AssistantEvent> = Vec::new();
        let mut timed_out = false;
        let deadline = Instant::now() + Duration::from_secs(spec.timeout_seconds);
        let hard_deadline = deadline + READLINE_GRACE;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                if let Some(event) = parse_line(&line) {
                                    let is_result = event.kind == "result";
                                    events.push(event);
                                    if is_result {
                                        break;
                                    }
                                }
                            }
                            // EOF, or the pipe was closed by the kill
                            Ok(None) | Err(_) => break,
                        }
                    }
                    _ = tokio::time::sleep_until(deadline), if !timed_out => {
                        timed_out = true;
                        tracing::warn!(
                            pid,
                            timeout_seconds = spec.timeout_seconds,
                            model = spec.model,
                            "assistant timed out, killing process tree"
                        );
                        kill_process_tree(pid).await;
                        let _ = child.start_kill();
                    }
                    _ = tokio::time::sleep_until(hard_deadline), if timed_out => {
                        tracing::error!(
                            pid,
                            "readline deadline exceeded after timeout kill, force-killing"
                        );
                        let _ = child.start_kill();
                        kill_process_tree(pid).await;
                        break;
                    }
                }
            }
        }

        // The child may outlive its result event; never leak it
        kill_process_tree(pid).await;
        let _ = child.start_kill();
        let exit = tokio::time::timeout(EXIT_WAIT, child.wait()).await;

        if let Ok(stderr_text) = tokio::time::timeout(Duration::from_secs(2), stderr_task).await {
            let stderr_text = stderr_text.unwrap_or_default();
            if !stderr_text.is_empty() {
                let preview: String = stderr_text.chars().take(500).collect();
                tracing::debug!(stderr = %preview, "assistant stderr");
            }
        }

        let parsed = collect(events);

        match exit {
            Ok(Ok(status)) => {
                if !status.success() && spec.resume_session_id.is_some() {
                    tracing::warn!(
                        code = status.code(),
                        resume = spec.resume_session_id.as_deref(),
                        "assistant exited non-zero with --resume, session may have expired"
                    );
                }
            }
            Ok(Err(e)) => tracing::debug!(error = %e, "failed to reap assistant child"),
            Err(_) => tracing::warn!(pid, "assistant child did not exit within wait window"),
        }

        if let Some(result) = &parsed.result {
            tracing::info!(
                session_id = parsed.session_id.as_deref(),
                cost_usd = result.cost_usd,
                num_turns = result.num_turns,
                "assistant finished"
            );
        } else if timed_out {
            tracing::warn!(
                events = parsed.events.len(),
                "assistant killed on timeout before a result event"
            );
        }

        parsed
    }

    async fn preflight(&self) -> Result<String, PreflightError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(PREFLIGHT_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PreflightError::NotFound(self.config.command.clone()));
            }
            Ok(Err(e)) => {
                return Err(PreflightError::Failed {
                    code: None,
                    stderr: e.to_string(),
                });
            }
            Err(_) => return Err(PreflightError::Timeout),
        };

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(200)
                .collect();
            return Err(PreflightError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        let version: String = String::from_utf8_lossy(&output.stdout)
            .trim()
            .chars()
            .take(100)
            .collect();
        Ok(version)
    }
}

/// Assistant stand-in for `--dry-run`: no process is spawned and the
/// simulated iteration costs nothing.
pub struct DryRunAssistant;

#[async_trait]
impl Assistant for DryRunAssistant {
    async fn invoke(&self, spec: &InvokeSpec) -> ParsedStream {
        tracing::info!(
            model = spec.model,
            max_turns = spec.max_turns,
            "[dry run] simulating assistant invocation"
        );
        let epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let session_id = format!("dry-run-{epoch}");
        ParsedStream {
            session_id: Some(session_id.clone()),
            assistant_text: "[DRY RUN] Simulated output".to_string(),
            result: Some(RunResult {
                session_id,
                result_text: "[DRY RUN] No actual execution".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn preflight(&self) -> Result<String, PreflightError> {
        Ok("dry-run".to_string())
    }
}

/// Scripted assistant for tests: pops one parsed stream per invocation
/// and records every spec it was called with.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeAssistant {
    streams: parking_lot::Mutex<std::collections::VecDeque<ParsedStream>>,
    invocations: parking_lot::Mutex<Vec<InvokeSpec>>,
    preflight_result: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeAssistant {
    pub fn new(streams: Vec<ParsedStream>) -> Self {
        Self {
            streams: parking_lot::Mutex::new(streams.into()),
            invocations: parking_lot::Mutex::new(Vec::new()),
            preflight_result: Some("claude 0.0.0 (fake)".to_string()),
        }
    }

    /// Script a preflight failure.
    pub fn failing_preflight(mut self) -> Self {
        self.preflight_result = None;
        self
    }

    /// Every spec `invoke` was called with, in order.
    pub fn invocations(&self) -> Vec<InvokeSpec> {
        self.invocations.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Assistant for FakeAssistant {
    async fn invoke(&self, spec: &InvokeSpec) -> ParsedStream {
        self.invocations.lock().push(spec.clone());
        self.streams.lock().pop_front().unwrap_or_default()
    }

    async fn preflight(&self) -> Result<String, PreflightError> {
        match &self.preflight_result {
            Some(version) => Ok(version.clone()),
            None => Err(PreflightError::NotFound("claude".to_string())),
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
