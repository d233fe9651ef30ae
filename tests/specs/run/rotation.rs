//! Session rotation specs

use crate::prelude::*;

#[test]
fn behavioural_rotation_after_low_productivity_window() {
    let ws = TestWorkspace::new();
    // Three short iterations under one session, then completion
    let cli = ws.fake_assistant(
        r#"case "$n" in
  1|2|3)
    echo '{"type": "result", "session_id": "s1", "total_cost_usd": 0.01, "num_turns": 3, "result": "a little progress", "is_error": false}'
    ;;
  *)
    echo '{"type": "result", "session_id": "s2", "total_cost_usd": 0.01, "num_turns": 8, "result": "PROJECT_COMPLETE", "is_error": false}'
    ;;
esac"#,
    );
    ws.write_config(&cli, serde_json::json!({}));

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(0));

    let rotations = ws.trace_events("session_rotation");
    assert_eq!(rotations.len(), 1);
    assert!(rotations[0]["reason"]
        .as_str()
        .unwrap()
        .contains("context exhaustion"));

    // The iteration after the rotation starts without --resume
    let args = ws.assistant_args();
    assert_eq!(args.len(), 4);
    assert!(args[2].contains("--resume s1"));
    assert!(!args[3].contains("--resume"));
}

#[test]
fn session_cost_ceiling_rotates() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"case "$n" in
  1)
    echo '{"type": "result", "session_id": "s1", "total_cost_usd": 3.0, "num_turns": 20, "result": "big chunk", "is_error": false}'
    ;;
  *)
    echo '{"type": "result", "session_id": "s2", "total_cost_usd": 0.01, "num_turns": 8, "result": "PROJECT_COMPLETE", "is_error": false}'
    ;;
esac"#,
    );
    ws.write_config(
        &cli,
        serde_json::json!({
            "stagnation": {"session_max_cost_usd": 2.0},
            "limits": {"max_per_iteration_budget_usd": 5.0}
        }),
    );

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(0));

    let rotations = ws.trace_events("session_rotation");
    assert_eq!(rotations.len(), 1);
    assert!(rotations[0]["reason"]
        .as_str()
        .unwrap()
        .contains("cost limit"));
    assert!(!ws.assistant_args()[1].contains("--resume"));
}
