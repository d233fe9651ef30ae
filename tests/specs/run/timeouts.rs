//! Timeout escalation and model fallback specs
//!
//! A fake assistant that exits without emitting a result event is
//! indistinguishable from a timed-out run: no result, no supervisor
//! errors.

use crate::prelude::*;

#[test]
fn consecutive_timeouts_exit_three() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant("exit 0");
    ws.write_config(&cli, serde_json::json!({}));

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(3));

    let timeouts = ws.trace_events("timeout_detected");
    assert_eq!(timeouts.len(), 2);
    assert_eq!(timeouts[0]["consecutive_count"], 1);
    assert_eq!(timeouts[0]["ndjson_events_received"], 0);
    assert_eq!(timeouts[0]["had_session_id"], false);
    assert_eq!(timeouts[1]["consecutive_count"], 2);

    assert_eq!(ws.trace_events("stagnation_exit").len(), 1);
    assert_eq!(ws.summary()["exit_code"], 3);
    assert_eq!(ws.summary()["status"], "failed");
}

#[test]
fn model_fallback_then_completion() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"case "$n" in
  1|2)
    exit 0
    ;;
  *)
    echo '{"type": "result", "session_id": "s1", "total_cost_usd": 0.05, "num_turns": 5, "result": "PROJECT_COMPLETE", "is_error": false}'
    ;;
esac"#,
    );
    ws.write_config(
        &cli,
        serde_json::json!({
            "assistant": {"model": "opus"}
        }),
    );

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(0));

    let fallbacks = ws.trace_events("model_fallback");
    assert_eq!(fallbacks.len(), 1);
    assert_eq!(fallbacks[0]["from_model"], "opus");
    assert_eq!(fallbacks[0]["to_model"], "sonnet");

    let args = ws.assistant_args();
    assert!(args[0].contains("--model opus"));
    assert!(args[1].contains("--model opus"));
    assert!(args[2].contains("--model sonnet"));
}

#[test]
fn timeouts_reuse_the_initial_prompt_without_a_session() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"case "$n" in
  1)
    echo '{"type": "init", "session_id": "s1"}'
    exit 0
    ;;
  *)
    echo '{"type": "result", "session_id": "s2", "total_cost_usd": 0.01, "num_turns": 5, "result": "PROJECT_COMPLETE", "is_error": false}'
    ;;
esac"#,
    );
    ws.write_config(&cli, serde_json::json!({}));

    let output = ws.run_grist(&["--prompt", "the initial prompt"]);
    assert_eq!(output.status.code(), Some(0));

    // The partial stream carried a session id, noted in the diagnostics
    let timeouts = ws.trace_events("timeout_detected");
    assert_eq!(timeouts[0]["ndjson_events_received"], 1);
    assert_eq!(timeouts[0]["had_session_id"], true);

    // Retry starts fresh with the original prompt
    let args = ws.assistant_args();
    assert!(args[1].contains("-p the initial prompt"));
    assert!(!args[1].contains("--resume"));
}
