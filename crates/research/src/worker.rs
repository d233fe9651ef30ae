// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Research worker invocation.
//!
//! The oracle runs as a separate interpreter process that prints a single
//! JSON document (`synthesis`, optional `error`, `execution_time_ms`).
//! [`SubprocessWorker`] spawns it; [`FakeWorker`] replays scripted
//! outcomes for tests.

use crate::client::ResearchError;
use async_trait::async_trait;
use grist_core::ResearchConfig;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Executes one research query and returns the synthesis text.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn run_query(&self, query: &str) -> Result<String, ResearchError>;
}

/// Spawns the research worker script via the configured interpreter.
pub struct SubprocessWorker {
    config: ResearchConfig,
}

impl SubprocessWorker {
    pub fn new(config: ResearchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl WorkerInvoker for SubprocessWorker {
    async fn run_query(&self, query: &str) -> Result<String, ResearchError> {
        let script = self.config.worker_script_path();
        if !script.exists() {
            return Err(ResearchError::ScriptNotFound(script.display().to_string()));
        }

        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(&script);
        cmd.args(["--perplexity-mode", &self.config.perplexity_mode]);
        if self.config.headful {
            cmd.arg("--headful");
        }
        cmd.arg(query);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.config.research_timeout_seconds);
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ResearchError::Query(e.to_string())),
            Err(_) => {
                return Err(ResearchError::Timeout(self.config.research_timeout_seconds));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let detail = if stderr.is_empty() { "unknown error" } else { stderr };
            return Err(ResearchError::Worker(format!(
                "worker exited {}: {detail}",
                output.status
            )));
        }

        let doc: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ResearchError::Parse(format!("invalid worker JSON: {e}")))?;

        if let Some(error) = doc.get("error").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(ResearchError::Worker(error.to_string()));
            }
        }

        let synthesis = doc
            .get("synthesis")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if synthesis.is_empty() {
            return Err(ResearchError::Parse("empty synthesis from worker".to_string()));
        }

        Ok(synthesis.to_string())
    }
}

/// Scripted worker for tests: pops one outcome per call.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeWorker {
    outcomes: parking_lot::Mutex<std::collections::VecDeque<Result<String, ResearchError>>>,
    pub calls: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeWorker {
    pub fn new(outcomes: Vec<Result<String, ResearchError>>) -> Self {
        Self {
            outcomes: parking_lot::Mutex::new(outcomes.into()),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl WorkerInvoker for FakeWorker {
    async fn run_query(&self, _query: &str) -> Result<String, ResearchError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ResearchError::Query("fake worker exhausted".to_string())))
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
