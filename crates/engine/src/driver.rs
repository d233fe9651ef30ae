// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The iteration driver: invokes the assistant, accounts the cycle,
//! consults the policies, and decides whether to exit, rotate, fall back,
//! or ask the research oracle for the next prompt.
//!
//! Nothing propagates as an error past an iteration boundary. Every
//! failure either becomes a trace event plus a recovery action, or a
//! terminal exit with a well-defined code. Terminal exits always write
//! the metrics summary.

use crate::prompts;
use crate::supervisor::{Assistant, InvokeSpec};
use grist_core::{policy, Clock, CycleRecord, WorkflowConfig, WorkflowState};
use grist_research::{ResearchClient, WorkerInvoker};
use grist_storage::{workflow_dir, write_summary, StateStore, TraceSink};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Completion marker observed.
pub const EXIT_COMPLETE: i32 = 0;
/// Iteration budget reached without completion.
pub const EXIT_MAX_ITERATIONS: i32 = 1;
/// Cost budget exceeded.
pub const EXIT_BUDGET_EXCEEDED: i32 = 2;
/// Stagnation (any form) or preflight failure.
pub const EXIT_STAGNATION: i32 = 3;

/// Per-run options supplied by the CLI.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// Initial prompt; empty selects a default for the workspace.
    pub initial_prompt: String,
    pub dry_run: bool,
    pub smoke_test: bool,
    pub skip_preflight: bool,
}

/// Orchestrates the assistant → research loop for one workspace.
pub struct Driver<A: Assistant, W: WorkerInvoker> {
    workspace: PathBuf,
    config: WorkflowConfig,
    options: DriverOptions,
    store: StateStore,
    trace: TraceSink,
    assistant: A,
    research: ResearchClient<W>,
    clock: Arc<dyn Clock>,
    initial_prompt: String,
    /// Model currently in use; diverges from config under fallback.
    model: String,

    // Transient per-run state, reset on every `run()`; never persisted.
    consecutive_timeouts: u32,
    stagnation_reset_done: bool,
    using_fallback: bool,
    original_model: Option<String>,
}

impl<A: Assistant, W: WorkerInvoker> Driver<A, W> {
    pub fn new(
        workspace: &Path,
        config: WorkflowConfig,
        options: DriverOptions,
        assistant: A,
        research: ResearchClient<W>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = StateStore::new(workspace);
        let trace = TraceSink::new(workspace, config.limits.trace_max_size_bytes);
        let initial_prompt = if options.initial_prompt.is_empty() {
            prompts::default_prompt(workspace, options.smoke_test)
        } else {
            options.initial_prompt.clone()
        };
        let model = config.assistant.model.clone();

        Self {
            workspace: workspace.to_path_buf(),
            config,
            options,
            store,
            trace,
            assistant,
            research,
            clock,
            initial_prompt,
            model,
            consecutive_timeouts: 0,
            stagnation_reset_done: false,
            using_fallback: false,
            original_model: None,
        }
    }

    /// Final state, for inspection after `run`.
    pub fn state(&self) -> &WorkflowState {
        &self.store.state
    }

    /// Execute the loop to a terminal exit code.
    pub async fn run(&mut self) -> i32 {
        self.consecutive_timeouts = 0;
        self.stagnation_reset_done = false;
        self.using_fallback = false;
        self.original_model = None;
        self.model = self.config.assistant.model.clone();

        let effective_timeout = policy::effective_timeout(&self.model, &self.config.limits);
        tracing::info!(
            workspace = %self.workspace.display(),
            max_iterations = self.config.limits.max_iterations,
            model = self.model,
            timeout_seconds = effective_timeout,
            base_timeout_seconds = self.config.limits.timeout_seconds,
            dry_run = self.options.dry_run,
            smoke_test = self.options.smoke_test,
            "starting loop driver"
        );

        if let Err(e) = self.store.load() {
            tracing::warn!(error = %e, "state load failed, continuing with fresh state");
        }
        self.store.state.start_run(self.clock.now_utc());

        if !self.preflight().await {
            return EXIT_STAGNATION;
        }

        self.trace.emit(
            self.store.state.iteration,
            "loop_start",
            json!({
                "max_iterations": self.config.limits.max_iterations,
                "model": self.model.clone(),
                "dry_run": self.options.dry_run,
                "smoke_test": self.options.smoke_test,
            }),
        );

        let mut current_prompt = self.initial_prompt.clone();
        let mut session_id =
            WorkflowState::validate_session_id(self.store.state.last_session_id.as_deref());

        for i in 1..=self.config.limits.max_iterations {
            tracing::info!(
                iteration = i,
                max = self.config.limits.max_iterations,
                prompt_preview = %CycleRecord::preview_of(&current_prompt),
                "iteration start"
            );
            self.trace.emit(
                self.store.state.iteration,
                "claude_invoke",
                json!({
                    "prompt_preview": CycleRecord::preview_of(&current_prompt),
                    "session_id": session_id.clone(),
                }),
            );

            let spec = InvokeSpec {
                prompt: current_prompt.clone(),
                resume_session_id: session_id.clone(),
                model: self.model.clone(),
                max_turns: policy::effective_max_turns(&self.model, &self.config.limits),
                timeout_seconds: policy::effective_timeout(&self.model, &self.config.limits),
            };

            let started = std::time::Instant::now();
            let parsed = self.assistant.invoke(&spec).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            if let Some(id) = &parsed.session_id {
                session_id = Some(id.clone());
            }

            let cost_usd = parsed.result.as_ref().map_or(0.0, |r| r.cost_usd);
            let num_turns = match &parsed.result {
                Some(result) => result.num_turns,
                None => {
                    // Informational estimate; the iteration is still
                    // classified as a timeout below.
                    let estimated = parsed.user_event_count();
                    if estimated > 0 {
                        tracing::info!(
                            estimated,
                            "no result event, estimated turns from streamed events"
                        );
                    }
                    estimated
                }
            };
            let is_error = parsed
                .result
                .as_ref()
                .map_or(!parsed.errors.is_empty(), |r| r.is_error);

            self.trace.emit(
                self.store.state.iteration,
                "claude_complete",
                json!({
                    "session_id": parsed.session_id.clone(),
                    "cost_usd": cost_usd,
                    "num_turns": num_turns,
                    "is_error": is_error,
                    "duration_ms": duration_ms,
                }),
            );

            self.store.state.increment_iteration();
            self.store.state.add_cycle(CycleRecord {
                iteration: self.store.state.iteration,
                prompt_preview: CycleRecord::preview_of(&current_prompt),
                session_id: session_id.clone(),
                model: Some(self.model.clone()),
                cost_usd,
                duration_ms,
                num_turns,
                is_error,
                error_message: parsed.errors.first().cloned(),
                completed_at: Some(self.clock.now_utc()),
            });
            self.store
                .state
                .merge_files_modified(parsed.files_modified.iter());
            self.save_state();

            // Proactive session rotation for fresh context
            if let Some(sid) = session_id.clone() {
                if let Some(reason) =
                    policy::should_rotate_session(&sid, &self.store.state, &self.config.stagnation)
                {
                    tracing::info!(reason, "session rotation");
                    self.trace.emit(
                        self.store.state.iteration,
                        "session_rotation",
                        json!({
                            "reason": reason,
                            "session_turns": self.store.state.session_turns(Some(&sid)),
                            "session_cost": self.store.state.session_cost(Some(&sid)),
                        }),
                    );
                    self.store.state.clear_session();
                    self.save_state();
                    session_id = None;
                }
            }

            // Budget check
            let verdict = self.store.state.check_budget(
                self.config.limits.max_per_iteration_budget_usd,
                self.config.limits.max_total_budget_usd,
            );
            if !verdict.is_within_budget() {
                let reason = verdict.to_string();
                tracing::error!(reason, "budget exceeded");
                self.trace.emit(
                    self.store.state.iteration,
                    "budget_exceeded",
                    json!({"error": reason.clone()}),
                );
                return self.finish_failed(EXIT_BUDGET_EXCEEDED, "budget_exceeded", &reason);
            }

            // A timeout is "no result and no supervisor errors"
            let timed_out = parsed.result.is_none() && parsed.errors.is_empty();
            if timed_out {
                self.consecutive_timeouts += 1;
                tracing::warn!(
                    consecutive = self.consecutive_timeouts,
                    "timeout detected, clearing session for fresh context"
                );
                self.trace.emit(
                    self.store.state.iteration,
                    "timeout_detected",
                    json!({
                        "consecutive_count": self.consecutive_timeouts,
                        "ndjson_events_received": parsed.events.len(),
                        "had_session_id": parsed.session_id.is_some(),
                    }),
                );
                if parsed.events.is_empty() {
                    tracing::warn!(
                        "timeout with zero events, the CLI likely never started \
                         (rate limit? PATH issue?)"
                    );
                }

                self.store.state.clear_session();
                self.save_state();
                session_id = None;

                // Fallback model before the stagnation exit
                let fallback = self.config.limits.model_fallback.get(&self.model).cloned();
                if self.consecutive_timeouts >= self.config.limits.model_fallback_after_timeouts
                    && fallback.is_some()
                    && !self.using_fallback
                {
                    let to_model = fallback.unwrap_or_default();
                    tracing::warn!(
                        from = self.model,
                        to = to_model,
                        timeouts = self.consecutive_timeouts,
                        "falling back to alternate model"
                    );
                    self.trace.emit(
                        self.store.state.iteration,
                        "model_fallback",
                        json!({"from_model": self.model.clone(), "to_model": to_model.clone()}),
                    );
                    self.original_model = Some(self.model.clone());
                    self.model = to_model;
                    self.using_fallback = true;
                    self.consecutive_timeouts = 0;
                    current_prompt = self.initial_prompt.clone();
                    self.cooldown(1).await;
                    continue;
                }

                let max_timeouts = policy::max_timeouts_for(&self.model, &self.config.stagnation);
                if self.consecutive_timeouts >= max_timeouts {
                    let reason = format!(
                        "stagnation: {} consecutive timeouts (limit: {max_timeouts})",
                        self.consecutive_timeouts
                    );
                    tracing::error!(reason);
                    self.trace.emit(
                        self.store.state.iteration,
                        "stagnation_exit",
                        json!({"reason": reason.clone()}),
                    );
                    return self.finish_failed(EXIT_STAGNATION, "stagnation", &reason);
                }

                self.cooldown(self.consecutive_timeouts).await;
                current_prompt = self.initial_prompt.clone();
                continue;
            }

            // Reset the timeout counter on success. An assistant-reported
            // error is distinct from a timeout and leaves the counter
            // untouched.
            if !is_error {
                self.consecutive_timeouts = 0;
            }
            if self.using_fallback && num_turns > self.config.stagnation.low_turn_threshold {
                let primary = self.original_model.take().unwrap_or_default();
                tracing::info!(
                    from = self.model,
                    to = primary,
                    "reverting to primary model after productive iteration"
                );
                self.trace.emit(
                    self.store.state.iteration,
                    "model_fallback_revert",
                    json!({"from_model": self.model.clone(), "to_model": primary.clone()}),
                );
                self.model = primary;
                self.using_fallback = false;
            }

            // Assistant-reported error: recover with a fresh session and
            // a generic prompt
            if is_error {
                tracing::warn!("assistant returned an error, clearing session for fresh start");
                self.store.state.clear_session();
                self.save_state();
                session_id = None;
                current_prompt = prompts::RECOVERY_PROMPT.to_string();
                continue;
            }

            // Diminishing-returns check
            let verdict = policy::check_stagnation(&self.store.state, &self.config.stagnation);
            if !verdict.is_ok() {
                let reason = verdict.to_string();
                if !self.stagnation_reset_done {
                    tracing::warn!(reason, "diminishing returns detected, resetting session");
                    self.trace.emit(
                        self.store.state.iteration,
                        "stagnation_reset",
                        json!({"reason": reason.clone()}),
                    );
                    self.stagnation_reset_done = true;
                    self.store.state.clear_session();
                    self.save_state();
                    session_id = None;
                    current_prompt = self.initial_prompt.clone();
                    continue;
                }
                tracing::error!(reason, "stagnation persists after session reset");
                self.trace.emit(
                    self.store.state.iteration,
                    "stagnation_exit",
                    json!({"reason": reason.clone()}),
                );
                return self.finish_failed(EXIT_STAGNATION, "stagnation", &reason);
            }

            // A productive iteration re-arms the stagnation reset
            if num_turns > self.config.stagnation.low_turn_threshold {
                self.stagnation_reset_done = false;
            }

            // Completion detection over result text plus assistant text
            let mut output_text = parsed
                .result
                .as_ref()
                .map(|r| r.result_text.clone())
                .unwrap_or_default();
            output_text.push(' ');
            output_text.push_str(&parsed.assistant_text);
            if policy::matches_completion(&output_text, &self.config.completion.markers) {
                tracing::info!("completion marker detected");
                self.trace
                    .emit(self.store.state.iteration, "completion_detected", json!({}));
                self.store.state.mark_complete(self.clock.now_utc());
                self.save_state();
                self.log_summary();
                self.trace.emit(
                    self.store.state.iteration,
                    "loop_end",
                    json!({"exit_code": EXIT_COMPLETE, "status": "completed"}),
                );
                self.write_summary(EXIT_COMPLETE);
                return EXIT_COMPLETE;
            }

            // Ask the oracle for the next prompt
            tracing::info!("querying research oracle for next steps");
            self.trace
                .emit(self.store.state.iteration, "research_start", json!({}));
            let research = self.research.query(None).await;
            self.trace.emit(
                self.store.state.iteration,
                "research_complete",
                json!({
                    "success": research.is_ok(),
                    "error_code": research.as_ref().err().map(|e| e.kind()),
                }),
            );
            let research_text = match research {
                Ok(research) => research.response,
                Err(e) => {
                    tracing::warn!(kind = e.kind(), error = %e, "research failed, using fallback prompt");
                    prompts::FALLBACK_CONTINUATION.to_string()
                }
            };
            current_prompt = prompts::build_next_prompt(&research_text);
            tracing::info!(chars = current_prompt.len(), "next prompt built");
        }

        let reason = format!(
            "max iterations reached ({})",
            self.config.limits.max_iterations
        );
        tracing::warn!(reason);
        self.finish_failed(EXIT_MAX_ITERATIONS, "max_iterations", &reason)
    }

    /// Pre-flight checks before the first iteration. Returns false on a
    /// terminal failure (exit 3).
    async fn preflight(&mut self) -> bool {
        // Make sure the state directory exists up front
        if let Err(e) = std::fs::create_dir_all(workflow_dir(&self.workspace)) {
            tracing::warn!(error = %e, "failed to create state directory");
        }

        if !self.workspace.join("CLAUDE.md").exists() {
            tracing::warn!(
                "workspace has no CLAUDE.md; the assistant will run without a project \
                 description. Recovery: add a CLAUDE.md roadmap to steer iterations"
            );
        }
        if !self.workspace.join(".git").exists() {
            tracing::warn!("workspace is not version-controlled; progress cannot be rolled back");
        }

        if self.options.dry_run || self.options.skip_preflight {
            return true;
        }

        match self.assistant.preflight().await {
            Ok(version) => {
                tracing::info!(version, "assistant preflight ok");
                true
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "assistant preflight failed. Recovery: check the assistant CLI is on PATH, \
                     or re-run with --skip-preflight"
                );
                self.trace
                    .emit(self.store.state.iteration, "preflight_failed", json!({}));
                self.write_summary(EXIT_STAGNATION);
                false
            }
        }
    }

    /// Cooldown sleep after the `count`-th consecutive timeout.
    async fn cooldown(&self, count: u32) {
        let seconds = policy::compute_cooldown(count, &self.config.limits);
        if seconds == 0 {
            return;
        }
        tracing::info!(seconds, timeout_number = count, "cooling down before retry");
        self.trace.emit(
            self.store.state.iteration,
            "timeout_cooldown",
            json!({"cooldown_seconds": seconds}),
        );
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }

    /// Terminal failure path: mark failed, log, trace `loop_end`, write
    /// the summary, and hand back the exit code.
    fn finish_failed(&mut self, exit_code: i32, status: &str, reason: &str) -> i32 {
        self.store.state.mark_failed(reason, self.clock.now_utc());
        self.save_state();
        self.log_summary();
        self.trace.emit(
            self.store.state.iteration,
            "loop_end",
            json!({"exit_code": exit_code, "status": status}),
        );
        self.write_summary(exit_code);
        exit_code
    }

    /// Persist state; a failed save is logged and the loop continues.
    fn save_state(&mut self) {
        if let Err(e) = self.store.save() {
            tracing::warn!(error = %e, "state save failed, continuing");
        }
    }

    fn write_summary(&self, exit_code: i32) {
        match write_summary(&self.workspace, exit_code, &self.store.state) {
            Ok(path) => tracing::info!(path = %path.display(), "metrics summary written"),
            Err(e) => tracing::warn!(error = %e, "failed to write metrics summary"),
        }
    }

    fn log_summary(&self) {
        let state = &self.store.state;
        tracing::info!(
            status = %state.status,
            iterations = state.iteration,
            total_cost_usd = state.metrics.total_cost_usd,
            total_turns = state.metrics.total_turns,
            errors = state.metrics.error_count,
            "loop ended"
        );
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
