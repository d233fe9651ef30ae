// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Statically-typed loop configuration.
//!
//! Loaded from `.workflow/config.json`; every field is optional in the file
//! and falls back to the defaults below. `load_config` returns either the
//! validated record or a single error: malformed JSON or the first field
//! whose value is out of range.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Iteration, timeout, and budget limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_iterations: u64,
    /// Base per-iteration wall-clock timeout, before model multipliers.
    pub timeout_seconds: u64,
    pub max_per_iteration_budget_usd: f64,
    pub max_total_budget_usd: f64,
    pub max_turns_per_iteration: u32,
    /// Timeout multiplier per model name (default 1.0).
    pub model_timeout_multipliers: HashMap<String, f64>,
    /// Per-model cap on `max_turns_per_iteration`.
    pub model_max_turns_override: HashMap<String, u32>,
    /// Base cooldown after a timeout before retrying (0 disables).
    pub timeout_cooldown_base_seconds: u64,
    pub timeout_cooldown_max_seconds: u64,
    /// Fallback model substituted after sustained timeouts on the primary.
    pub model_fallback: HashMap<String, String>,
    pub model_fallback_after_timeouts: u32,
    /// Max `trace.jsonl` size before rotation (0 = unlimited).
    pub trace_max_size_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            timeout_seconds: 300,
            max_per_iteration_budget_usd: 5.0,
            max_total_budget_usd: 50.0,
            max_turns_per_iteration: 50,
            model_timeout_multipliers: HashMap::from([
                ("opus".to_string(), 2.0),
                ("sonnet".to_string(), 1.0),
                ("haiku".to_string(), 0.5),
            ]),
            model_max_turns_override: HashMap::from([("opus".to_string(), 25)]),
            timeout_cooldown_base_seconds: 60,
            timeout_cooldown_max_seconds: 300,
            model_fallback: HashMap::from([("opus".to_string(), "sonnet".to_string())]),
            model_fallback_after_timeouts: 2,
            trace_max_size_bytes: 10_000_000,
        }
    }
}

/// Diminishing-returns detection and session rotation ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagnationConfig {
    pub enabled: bool,
    /// Sliding window of recent cycles examined for stagnation.
    pub window_size: usize,
    /// Turn count at or below which an iteration counts as low-productivity.
    pub low_turn_threshold: u32,
    pub max_consecutive_timeouts: u32,
    /// Per-model override for `max_consecutive_timeouts`.
    pub model_timeout_overrides: HashMap<String, u32>,
    /// Hard turn ceiling per session before rotation.
    pub session_max_turns: u64,
    /// Hard cost ceiling per session before rotation.
    pub session_max_cost_usd: f64,
    /// Turns below this count as low-productivity for rotation detection.
    pub context_exhaustion_turn_threshold: u32,
    /// Window size for behavioural context-exhaustion detection.
    pub context_exhaustion_window: usize,
}

impl Default for StagnationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: 3,
            low_turn_threshold: 2,
            max_consecutive_timeouts: 2,
            model_timeout_overrides: HashMap::from([("opus".to_string(), 3)]),
            session_max_turns: 200,
            session_max_cost_usd: 20.0,
            context_exhaustion_turn_threshold: 5,
            context_exhaustion_window: 3,
        }
    }
}

/// Retry and circuit-breaker settings for the research oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_reset_seconds: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_seconds: 1.0,
            max_delay_seconds: 30.0,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_seconds: 120.0,
        }
    }
}

/// Completion detection markers and the optional review gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Case-insensitive substrings signalling project completion.
    pub markers: Vec<String>,
    pub gate_enabled: bool,
    /// Heading of the checklist section the gate validates against.
    pub gate_section: String,
    /// Max consecutive gate rejections before exiting with stagnation.
    pub max_gate_rejections: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            markers: vec![
                "PROJECT_COMPLETE".to_string(),
                "ALL_TASKS_DONE".to_string(),
                "IMPLEMENTATION_COMPLETE".to_string(),
            ],
            gate_enabled: true,
            gate_section: "## Completion Gate".to_string(),
            max_gate_rejections: 3,
        }
    }
}

/// Assistant CLI invocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Executable resolved via PATH.
    pub command: String,
    pub model: String,
    pub dangerously_skip_permissions: bool,
    pub verbose: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            model: "sonnet".to_string(),
            dangerously_skip_permissions: true,
            verbose: true,
        }
    }
}

/// Research oracle worker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Interpreter that runs the worker script.
    pub interpreter: String,
    /// Worker script path; `None` uses `~/.claude/research-worker/worker.py`.
    pub worker_script: Option<PathBuf>,
    pub perplexity_mode: String,
    pub headful: bool,
    pub research_timeout_seconds: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            worker_script: None,
            perplexity_mode: "research".to_string(),
            headful: true,
            research_timeout_seconds: 600,
        }
    }
}

impl ResearchConfig {
    /// Resolve the worker script path, defaulting under the home directory.
    pub fn worker_script_path(&self) -> PathBuf {
        match &self.worker_script {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".claude")
                .join("research-worker")
                .join("worker.py"),
        }
    }
}

/// Log redaction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Regex patterns replaced with `[REDACTED]` in log output.
    pub log_redact_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            log_redact_patterns: vec![
                r"sk-ant-[\w-]+".to_string(),
                r"pplx-[\w]+".to_string(),
                r"sk-proj-[\w-]+".to_string(),
            ],
        }
    }
}

/// Root configuration record for `.workflow/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub limits: LimitsConfig,
    pub stagnation: StagnationConfig,
    pub retry: RetryConfig,
    pub completion: CompletionConfig,
    pub assistant: AssistantConfig,
    pub research: ResearchConfig,
    pub security: SecurityConfig,
}

impl WorkflowConfig {
    /// Check every field against its allowed range, returning the first
    /// violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn range<T: PartialOrd + std::fmt::Display + Copy>(
            field: &str,
            value: T,
            min: T,
            max: T,
        ) -> Result<(), ConfigError> {
            if value < min || value > max {
                return Err(ConfigError::Validation(format!(
                    "{field} must be in [{min}, {max}], got {value}"
                )));
            }
            Ok(())
        }
        fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{field} must be > 0, got {value}"
                )));
            }
            Ok(())
        }

        let l = &self.limits;
        range("limits.max_iterations", l.max_iterations, 1, 500)?;
        range("limits.timeout_seconds", l.timeout_seconds, 30, 1800)?;
        positive(
            "limits.max_per_iteration_budget_usd",
            l.max_per_iteration_budget_usd,
        )?;
        positive("limits.max_total_budget_usd", l.max_total_budget_usd)?;
        range("limits.max_turns_per_iteration", l.max_turns_per_iteration, 1, 200)?;
        range(
            "limits.timeout_cooldown_base_seconds",
            l.timeout_cooldown_base_seconds,
            0,
            600,
        )?;
        range(
            "limits.timeout_cooldown_max_seconds",
            l.timeout_cooldown_max_seconds,
            0,
            600,
        )?;
        range(
            "limits.model_fallback_after_timeouts",
            l.model_fallback_after_timeouts,
            1,
            10,
        )?;
        for (model, multiplier) in &l.model_timeout_multipliers {
            positive(&format!("limits.model_timeout_multipliers.{model}"), *multiplier)?;
        }

        let s = &self.stagnation;
        range("stagnation.window_size", s.window_size, 2, 10)?;
        range("stagnation.max_consecutive_timeouts", s.max_consecutive_timeouts, 1, 10)?;
        if s.session_max_turns < 10 {
            return Err(ConfigError::Validation(format!(
                "stagnation.session_max_turns must be >= 10, got {}",
                s.session_max_turns
            )));
        }
        positive("stagnation.session_max_cost_usd", s.session_max_cost_usd)?;
        if s.context_exhaustion_turn_threshold < 1 {
            return Err(ConfigError::Validation(
                "stagnation.context_exhaustion_turn_threshold must be >= 1".to_string(),
            ));
        }
        range(
            "stagnation.context_exhaustion_window",
            s.context_exhaustion_window,
            2,
            10,
        )?;

        let r = &self.retry;
        range("retry.max_retries", r.max_retries, 0, 10)?;
        positive("retry.base_delay_seconds", r.base_delay_seconds)?;
        positive("retry.max_delay_seconds", r.max_delay_seconds)?;
        if r.circuit_breaker_threshold < 1 {
            return Err(ConfigError::Validation(
                "retry.circuit_breaker_threshold must be >= 1".to_string(),
            ));
        }
        positive(
            "retry.circuit_breaker_reset_seconds",
            r.circuit_breaker_reset_seconds,
        )?;

        if self.completion.markers.is_empty() {
            return Err(ConfigError::Validation(
                "completion.markers must not be empty".to_string(),
            ));
        }
        if self.completion.max_gate_rejections < 1 {
            return Err(ConfigError::Validation(
                "completion.max_gate_rejections must be >= 1".to_string(),
            ));
        }

        if self.research.research_timeout_seconds < 60 {
            return Err(ConfigError::Validation(format!(
                "research.research_timeout_seconds must be >= 60, got {}",
                self.research.research_timeout_seconds
            )));
        }

        Ok(())
    }
}

/// Load and validate the workflow config from a JSON file.
///
/// A missing file yields the defaults; malformed JSON and out-of-range
/// values are errors.
pub fn load_config(path: &Path) -> Result<WorkflowConfig, ConfigError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "config not found, using defaults");
        return Ok(WorkflowConfig::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: WorkflowConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
