// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow state: cycle history, aggregated metrics, and session tracking.
//!
//! The state is a plain value mutated only through the operations below.
//! Persistence (atomic save, load, schema migration) lives in grist-storage;
//! everything here is side-effect free so policy code and tests can work on
//! in-memory states.

use crate::cycle::CycleRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current schema version written by `save`.
pub const STATE_VERSION: u32 = 1;

/// Maximum accepted length of a stored assistant session id.
pub const MAX_SESSION_ID_LEN: usize = 200;

/// Lifecycle status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Idle => write!(f, "idle"),
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Running sums across all recorded cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub total_duration_ms: u64,
    #[serde(default)]
    pub total_turns: u64,
    #[serde(default)]
    pub error_count: u64,
    /// Paths the assistant claims to have modified, first-seen order.
    #[serde(default)]
    pub files_modified: Vec<String>,
}

/// Per-model performance metrics derived from cycle history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAnalytics {
    pub model: String,
    pub iterations: u64,
    pub avg_turns: f64,
    pub avg_cost_usd: f64,
    pub avg_duration_ms: f64,
    pub timeout_count: u64,
    pub timeout_rate: f64,
    pub error_count: u64,
    pub error_rate: f64,
}

/// Outcome of a budget check.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetVerdict {
    WithinBudget,
    /// The most recent cycle's cost exceeded the per-iteration cap.
    IterationExceeded { cost_usd: f64, limit_usd: f64 },
    /// The running total exceeded the whole-run cap.
    TotalExceeded { cost_usd: f64, limit_usd: f64 },
}

impl BudgetVerdict {
    pub fn is_within_budget(&self) -> bool {
        matches!(self, BudgetVerdict::WithinBudget)
    }
}

impl fmt::Display for BudgetVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetVerdict::WithinBudget => write!(f, "within budget"),
            BudgetVerdict::IterationExceeded { cost_usd, limit_usd } => write!(
                f,
                "per-iteration budget exceeded: ${cost_usd:.4} > ${limit_usd:.4}"
            ),
            BudgetVerdict::TotalExceeded { cost_usd, limit_usd } => {
                write!(f, "total budget exceeded: ${cost_usd:.4} > ${limit_usd:.4}")
            }
        }
    }
}

/// Root state record persisted to `.workflow/state.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub version: u32,
    /// Stable identifier for this workflow, minted once at creation.
    pub workflow_id: String,
    #[serde(default)]
    pub iteration: u64,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub cycles: Vec<CycleRecord>,
    #[serde(default)]
    pub metrics: WorkflowMetrics,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Most recent assistant session id, replayed via `--resume`.
    #[serde(default)]
    pub last_session_id: Option<String>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            workflow_id: uuid::Uuid::new_v4().to_string(),
            iteration: 0,
            status: WorkflowStatus::Idle,
            cycles: Vec::new(),
            metrics: WorkflowMetrics::default(),
            start_time: None,
            end_time: None,
            last_session_id: None,
        }
    }
}

impl WorkflowState {
    /// Mark the workflow running with a fresh start time.
    pub fn start_run(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Running;
        self.start_time = Some(now);
    }

    /// Advance the iteration counter and return the new value.
    pub fn increment_iteration(&mut self) -> u64 {
        self.iteration += 1;
        self.iteration
    }

    /// Append a completed cycle and fold it into the aggregated metrics.
    ///
    /// A cycle carrying a session id becomes the new `last_session_id`.
    pub fn add_cycle(&mut self, cycle: CycleRecord) {
        self.metrics.total_cost_usd += cycle.cost_usd;
        self.metrics.total_duration_ms += cycle.duration_ms;
        self.metrics.total_turns += u64::from(cycle.num_turns);
        if cycle.is_error {
            self.metrics.error_count += 1;
        }
        if let Some(id) = &cycle.session_id {
            self.last_session_id = Some(id.clone());
        }
        self.cycles.push(cycle);
    }

    /// Merge modified-file paths into the aggregate list, keeping
    /// first-seen order and dropping duplicates.
    pub fn merge_files_modified<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            let path = path.as_ref();
            if !self.metrics.files_modified.iter().any(|p| p == path) {
                self.metrics.files_modified.push(path.to_string());
            }
        }
    }

    /// Forget the last assistant session (next iteration starts fresh).
    pub fn clear_session(&mut self) {
        self.last_session_id = None;
    }

    /// Mark the workflow completed.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Completed;
        self.end_time = Some(now);
    }

    /// Mark the workflow failed.
    pub fn mark_failed(&mut self, reason: &str, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Failed;
        self.end_time = Some(now);
        tracing::error!(reason, "workflow failed");
    }

    /// Check the most recent cycle and the running total against budgets.
    pub fn check_budget(&self, per_iteration_limit: f64, total_limit: f64) -> BudgetVerdict {
        if let Some(last) = self.cycles.last() {
            if last.cost_usd > per_iteration_limit {
                return BudgetVerdict::IterationExceeded {
                    cost_usd: last.cost_usd,
                    limit_usd: per_iteration_limit,
                };
            }
        }
        if self.metrics.total_cost_usd > total_limit {
            return BudgetVerdict::TotalExceeded {
                cost_usd: self.metrics.total_cost_usd,
                limit_usd: total_limit,
            };
        }
        BudgetVerdict::WithinBudget
    }

    /// Validate a stored session id: non-empty after trimming, printable,
    /// and at most [`MAX_SESSION_ID_LEN`] chars. Returns the trimmed id.
    pub fn validate_session_id(candidate: Option<&str>) -> Option<String> {
        let trimmed = candidate?.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_SESSION_ID_LEN {
            return None;
        }
        if trimmed.chars().any(char::is_control) {
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Sum of turns across cycles under the given session id
    /// (defaults to `last_session_id`).
    pub fn session_turns(&self, session_id: Option<&str>) -> u64 {
        let Some(target) = session_id.or(self.last_session_id.as_deref()) else {
            return 0;
        };
        self.cycles
            .iter()
            .filter(|c| c.session_id.as_deref() == Some(target))
            .map(|c| u64::from(c.num_turns))
            .sum()
    }

    /// Sum of cost across cycles under the given session id
    /// (defaults to `last_session_id`).
    pub fn session_cost(&self, session_id: Option<&str>) -> f64 {
        let Some(target) = session_id.or(self.last_session_id.as_deref()) else {
            return 0.0;
        };
        self.cycles
            .iter()
            .filter(|c| c.session_id.as_deref() == Some(target))
            .map(|c| c.cost_usd)
            .sum()
    }

    /// Partition cycles by model and compute per-model metrics.
    ///
    /// Cycles without a model are grouped under `"unknown"`. Zero-turn
    /// zero-cost cycles are counted as timeouts.
    pub fn compute_model_analytics(&self) -> BTreeMap<String, ModelAnalytics> {
        let mut by_model: BTreeMap<String, Vec<&CycleRecord>> = BTreeMap::new();
        for cycle in &self.cycles {
            let model = cycle.model.clone().unwrap_or_else(|| "unknown".to_string());
            by_model.entry(model).or_default().push(cycle);
        }

        by_model
            .into_iter()
            .map(|(model, cycles)| {
                let n = cycles.len() as u64;
                let nf = n as f64;
                let timeouts = cycles.iter().filter(|c| c.looks_like_timeout()).count() as u64;
                let errors = cycles.iter().filter(|c| c.is_error).count() as u64;
                let analytics = ModelAnalytics {
                    model: model.clone(),
                    iterations: n,
                    avg_turns: cycles.iter().map(|c| f64::from(c.num_turns)).sum::<f64>() / nf,
                    avg_cost_usd: cycles.iter().map(|c| c.cost_usd).sum::<f64>() / nf,
                    avg_duration_ms: cycles.iter().map(|c| c.duration_ms as f64).sum::<f64>() / nf,
                    timeout_count: timeouts,
                    timeout_rate: timeouts as f64 / nf,
                    error_count: errors,
                    error_rate: errors as f64 / nf,
                };
                (model, analytics)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
