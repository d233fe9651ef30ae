// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Research client: query assembly, retries with jittered backoff, and a
//! circuit breaker around the oracle worker.
//!
//! All research failures are soft for the loop: the driver substitutes a
//! generic continuation prompt and keeps going. The breaker keeps a
//! flapping worker from stalling every iteration on doomed retries.

use crate::context::SessionContext;
use crate::worker::WorkerInvoker;
use chrono::{DateTime, Utc};
use grist_core::{Clock, RetryConfig};
use grist_storage::workflow_dir;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Length of the query preview kept on a [`Research`] record.
const QUERY_PREVIEW_LEN: usize = 500;

/// Research failure kinds.
///
/// `Timeout`, `Worker`, and `Parse` are transient and retryable;
/// `ScriptNotFound` and `Query` are not. `CircuitOpen` is returned without
/// attempting the worker at all.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("research worker timed out after {0}s")]
    Timeout(u64),
    #[error("research worker failed: {0}")]
    Worker(String),
    #[error("unusable worker response: {0}")]
    Parse(String),
    #[error("worker script not found: {0}")]
    ScriptNotFound(String),
    #[error("research query failed: {0}")]
    Query(String),
    #[error(
        "circuit breaker open: {failures} consecutive failures, resets after {reset_seconds:.0}s"
    )]
    CircuitOpen { failures: u32, reset_seconds: f64 },
}

impl ResearchError {
    /// Whether another attempt is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResearchError::Timeout(_) | ResearchError::Worker(_) | ResearchError::Parse(_)
        )
    }

    /// Stable kind label for trace events.
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchError::Timeout(_) => "TIMEOUT",
            ResearchError::Worker(_) => "WORKER_ERROR",
            ResearchError::Parse(_) => "PARSE_ERROR",
            ResearchError::ScriptNotFound(_) => "SCRIPT_NOT_FOUND",
            ResearchError::Query(_) => "QUERY_ERROR",
            ResearchError::CircuitOpen { .. } => "CIRCUIT_OPEN",
        }
    }
}

/// A successful research response.
#[derive(Debug, Clone)]
pub struct Research {
    pub query_preview: String,
    pub response: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure_ms: u64,
}

/// Pre-jitter backoff delay for the given attempt (0-based):
/// `min(base * 2^attempt, cap)` seconds.
pub fn backoff_delay_seconds(attempt: u32, cfg: &RetryConfig) -> f64 {
    let delay = cfg.base_delay_seconds * 2f64.powi(attempt.min(62) as i32);
    delay.min(cfg.max_delay_seconds)
}

/// Apply a uniform jitter factor in [0.5, 1.5) to a delay.
pub fn apply_jitter(delay_seconds: f64, jitter: f64) -> f64 {
    delay_seconds * (0.5 + jitter)
}

/// Queries the research oracle with project context.
pub struct ResearchClient<W: WorkerInvoker> {
    workspace: PathBuf,
    context: SessionContext,
    worker: W,
    retry: RetryConfig,
    model_label: String,
    clock: Arc<dyn Clock>,
    breaker: Mutex<BreakerState>,
}

impl<W: WorkerInvoker> ResearchClient<W> {
    pub fn new(
        workspace: &Path,
        worker: W,
        retry: RetryConfig,
        mode: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            context: SessionContext::new(workspace),
            worker,
            retry,
            model_label: format!("perplexity-{mode}"),
            clock,
            breaker: Mutex::new(BreakerState::default()),
        }
    }

    /// Execute a research query with retry and circuit breaking.
    ///
    /// On success the response is also written to
    /// `.workflow/research_result.md`.
    pub async fn query(&self, extra_context: Option<&str>) -> Result<Research, ResearchError> {
        if let Some(err) = self.circuit_open() {
            return Err(err);
        }

        let query = self.context.build_query(extra_context).await;
        let mut last_err = ResearchError::Query("no attempts made".to_string());

        for attempt in 0..=self.retry.max_retries {
            match self.worker.run_query(&query).await {
                Ok(response) => {
                    self.record_success();
                    let research = Research {
                        query_preview: query.chars().take(QUERY_PREVIEW_LEN).collect(),
                        response,
                        model: self.model_label.clone(),
                        timestamp: self.clock.now_utc(),
                    };
                    self.save_result(&research);
                    return Ok(research);
                }
                Err(err) => {
                    self.record_failure();
                    if !err.is_retryable() {
                        tracing::warn!(kind = err.kind(), error = %err, "non-retryable research error");
                        return Err(err);
                    }
                    if attempt < self.retry.max_retries {
                        let delay = apply_jitter(
                            backoff_delay_seconds(attempt, &self.retry),
                            rand::random::<f64>(),
                        );
                        tracing::info!(
                            attempt = attempt + 1,
                            max = self.retry.max_retries,
                            delay_seconds = delay,
                            kind = err.kind(),
                            "retrying research query"
                        );
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    }
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    /// When open, returns the `CircuitOpen` error to surface.
    fn circuit_open(&self) -> Option<ResearchError> {
        let mut breaker = self.breaker.lock();
        if breaker.consecutive_failures < self.retry.circuit_breaker_threshold {
            return None;
        }
        let elapsed_ms = self.clock.epoch_ms().saturating_sub(breaker.last_failure_ms);
        let reset_ms = (self.retry.circuit_breaker_reset_seconds * 1000.0) as u64;
        if elapsed_ms >= reset_ms {
            tracing::info!(
                elapsed_seconds = elapsed_ms / 1000,
                "circuit breaker reset after cooldown"
            );
            breaker.consecutive_failures = 0;
            return None;
        }
        Some(ResearchError::CircuitOpen {
            failures: breaker.consecutive_failures,
            reset_seconds: self.retry.circuit_breaker_reset_seconds,
        })
    }

    fn record_failure(&self) {
        let mut breaker = self.breaker.lock();
        breaker.consecutive_failures += 1;
        breaker.last_failure_ms = self.clock.epoch_ms();
    }

    fn record_success(&self) {
        self.breaker.lock().consecutive_failures = 0;
    }

    /// Persist the latest research result for operators and the next
    /// context gather. Best-effort.
    fn save_result(&self, research: &Research) {
        let dir = workflow_dir(&self.workspace);
        let path = dir.join("research_result.md");
        let content = format!(
            "# Research Result\n\n**Timestamp:** {}\n**Model:** {}\n\n---\n\n{}\n",
            research.timestamp.to_rfc3339(),
            research.model,
            research.response
        );
        let write = std::fs::create_dir_all(&dir).and_then(|()| std::fs::write(&path, content));
        match write {
            Ok(()) => tracing::info!(path = %path.display(), "research result saved"),
            Err(e) => tracing::warn!(error = %e, "failed to save research result"),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
