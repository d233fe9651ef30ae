// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics summary written once at loop exit.

use crate::store::workflow_dir;
use grist_core::{ModelAnalytics, WorkflowState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Summary file name within the workflow directory.
const SUMMARY_FILE: &str = "metrics_summary.json";

/// Final run summary persisted to `.workflow/metrics_summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub exit_code: i32,
    pub status: String,
    pub iterations: u64,
    pub total_cost_usd: f64,
    pub total_turns: u64,
    pub error_count: u64,
    pub total_duration_ms: u64,
    pub model_analytics: BTreeMap<String, ModelAnalytics>,
}

impl MetricsSummary {
    /// Build the summary from the final workflow state.
    pub fn from_state(exit_code: i32, state: &WorkflowState) -> Self {
        Self {
            exit_code,
            status: state.status.to_string(),
            iterations: state.iteration,
            total_cost_usd: state.metrics.total_cost_usd,
            total_turns: state.metrics.total_turns,
            error_count: state.metrics.error_count,
            total_duration_ms: state.metrics.total_duration_ms,
            model_analytics: state.compute_model_analytics(),
        }
    }
}

/// Write the metrics summary for a workspace. Returns the file path.
pub fn write_summary(
    workspace: &Path,
    exit_code: i32,
    state: &WorkflowState,
) -> std::io::Result<PathBuf> {
    let summary = MetricsSummary::from_state(exit_code, state);
    let dir = workflow_dir(workspace);
    fs::create_dir_all(&dir)?;
    let path = dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
