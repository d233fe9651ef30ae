// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn defaults_are_valid() {
    let config = WorkflowConfig::default();
    config.validate().unwrap();
    assert_eq!(config.limits.max_iterations, 50);
    assert_eq!(config.limits.timeout_seconds, 300);
    assert_eq!(config.assistant.model, "sonnet");
    assert_eq!(config.assistant.command, "claude");
    assert_eq!(config.stagnation.window_size, 3);
    assert!(config
        .completion
        .markers
        .iter()
        .any(|m| m == "PROJECT_COMPLETE"));
}

#[test]
fn load_missing_file_returns_defaults() {
    let dir = tempdir().unwrap();
    let config = load_config(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, WorkflowConfig::default());
}

#[test]
fn load_partial_file_fills_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"limits": {"max_iterations": 5}, "assistant": {"model": "opus"}}"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.limits.max_iterations, 5);
    // Untouched fields keep their defaults
    assert_eq!(config.limits.timeout_seconds, 300);
    assert_eq!(config.assistant.model, "opus");
    assert!(config.assistant.dangerously_skip_permissions);
}

#[test]
fn load_malformed_json_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json").unwrap();

    match load_config(&path) {
        Err(ConfigError::Json { .. }) => {}
        other => panic!("expected Json error, got {other:?}"),
    }
}

#[yare::parameterized(
    zero_iterations    = { r#"{"limits": {"max_iterations": 0}}"# },
    huge_iterations    = { r#"{"limits": {"max_iterations": 1000}}"# },
    short_timeout      = { r#"{"limits": {"timeout_seconds": 5}}"# },
    negative_budget    = { r#"{"limits": {"max_total_budget_usd": -1.0}}"# },
    zero_budget        = { r#"{"limits": {"max_per_iteration_budget_usd": 0.0}}"# },
    tiny_window        = { r#"{"stagnation": {"window_size": 1}}"# },
    low_session_turns  = { r#"{"stagnation": {"session_max_turns": 5}}"# },
    excess_retries     = { r#"{"retry": {"max_retries": 50}}"# },
    zero_cb_threshold  = { r#"{"retry": {"circuit_breaker_threshold": 0}}"# },
    no_markers         = { r#"{"completion": {"markers": []}}"# },
    fast_research      = { r#"{"research": {"research_timeout_seconds": 10}}"# },
)]
fn out_of_range_values_are_rejected(json: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, json).unwrap();

    match load_config(&path) {
        Err(ConfigError::Validation(_)) => {}
        other => panic!("expected Validation error, got {other:?}"),
    }
}

#[test]
fn unknown_fields_are_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"future_section": {"x": 1}}"#).unwrap();
    assert!(load_config(&path).is_ok());
}

#[test]
fn default_model_maps_cover_fallback_chain() {
    let config = WorkflowConfig::default();
    assert_eq!(
        config.limits.model_fallback.get("opus").map(String::as_str),
        Some("sonnet")
    );
    assert_eq!(config.limits.model_fallback_after_timeouts, 2);
    assert_eq!(config.stagnation.model_timeout_overrides.get("opus"), Some(&3));
}

#[test]
fn worker_script_path_prefers_explicit_config() {
    let mut config = ResearchConfig::default();
    config.worker_script = Some(PathBuf::from("/opt/worker.py"));
    assert_eq!(config.worker_script_path(), PathBuf::from("/opt/worker.py"));
}

#[test]
fn config_round_trips_through_json() {
    let config = WorkflowConfig::default();
    let json = serde_json::to_string_pretty(&config).unwrap();
    let back: WorkflowConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
