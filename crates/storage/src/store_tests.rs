// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use grist_core::{CycleRecord, WorkflowStatus};
use tempfile::tempdir;

fn cycle(iteration: u64, session: Option<&str>) -> CycleRecord {
    CycleRecord {
        iteration,
        prompt_preview: "p".into(),
        session_id: session.map(String::from),
        model: Some("sonnet".into()),
        cost_usd: 0.05,
        duration_ms: 1_000,
        num_turns: 2,
        is_error: false,
        error_message: None,
        completed_at: None,
    }
}

#[test]
fn load_missing_file_keeps_defaults() {
    let dir = tempdir().unwrap();
    let mut store = StateStore::new(dir.path());
    store.load().unwrap();
    assert_eq!(store.state.iteration, 0);
    assert_eq!(store.state.status, WorkflowStatus::Idle);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();

    let mut store = StateStore::new(dir.path());
    store.state.start_run(chrono::Utc::now());
    store.state.increment_iteration();
    store.state.add_cycle(cycle(1, Some("s1")));
    store.save().unwrap();

    let mut loaded = StateStore::new(dir.path());
    loaded.load().unwrap();
    assert_eq!(loaded.state, store.state);
}

#[test]
fn save_is_atomic() {
    let dir = tempdir().unwrap();
    let mut store = StateStore::new(dir.path());
    store.save().unwrap();

    assert!(store.path().exists());
    assert!(!store.path().with_extension("tmp").exists());
}

#[test]
fn save_creates_workflow_dir() {
    let dir = tempdir().unwrap();
    let mut store = StateStore::new(dir.path());
    store.save().unwrap();
    assert!(workflow_dir(dir.path()).is_dir());
}

#[test]
fn load_corrupt_json_is_an_error() {
    let dir = tempdir().unwrap();
    let mut store = StateStore::new(dir.path());
    fs::create_dir_all(workflow_dir(dir.path())).unwrap();
    fs::write(store.path(), "{broken").unwrap();

    match store.load() {
        Err(StoreError::Json(_)) => {}
        other => panic!("expected Json error, got {other:?}"),
    }
}

#[test]
fn load_unversioned_state_migrates_to_current() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(workflow_dir(dir.path())).unwrap();

    // A pre-versioning state file: no version field at all
    let legacy = serde_json::json!({
        "workflow_id": "legacy-id",
        "iteration": 4,
        "status": "running",
        "cycles": [],
        "metrics": {},
        "last_session_id": "s-old"
    });
    let path = workflow_dir(dir.path()).join("state.json");
    fs::write(&path, serde_json::to_string(&legacy).unwrap()).unwrap();

    let mut store = StateStore::new(dir.path());
    store.load().unwrap();
    assert_eq!(store.state.version, grist_core::STATE_VERSION);
    assert_eq!(store.state.iteration, 4);
    assert_eq!(store.state.workflow_id, "legacy-id");
    assert_eq!(store.state.last_session_id.as_deref(), Some("s-old"));

    // Saving once produces a file valid under the current schema
    store.save().unwrap();
    let mut reloaded = StateStore::new(dir.path());
    reloaded.load().unwrap();
    assert_eq!(reloaded.state, store.state);
}

#[test]
fn save_overwrites_previous_state() {
    let dir = tempdir().unwrap();
    let mut store = StateStore::new(dir.path());
    store.save().unwrap();

    store.state.increment_iteration();
    store.state.add_cycle(cycle(1, None));
    store.save().unwrap();

    let mut loaded = StateStore::new(dir.path());
    loaded.load().unwrap();
    assert_eq!(loaded.state.iteration, 1);
    assert_eq!(loaded.state.cycles.len(), 1);
}
