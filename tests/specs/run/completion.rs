//! Completion detection specs
//!
//! The loop exits 0 when the assistant's output carries a completion
//! marker, and resumes the previous session across iterations.

use crate::prelude::*;

#[test]
fn clean_completion_exits_zero() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"echo '{"type": "init", "session_id": "s1"}'
echo '{"type": "assistant", "message": {"content": [{"type": "text", "text": "done"}]}}'
echo '{"type": "result", "session_id": "s1", "total_cost_usd": 0.05, "num_turns": 2, "result": "PROJECT_COMPLETE", "is_error": false}'"#,
    );
    ws.write_config(&cli, serde_json::json!({}));

    let output = ws.run_grist(&["--prompt", "finish the project"]);
    assert_eq!(output.status.code(), Some(0));

    let state = ws.state();
    assert_eq!(state["status"], "completed");
    assert_eq!(state["iteration"], 1);
    assert!((state["metrics"]["total_cost_usd"].as_f64().unwrap() - 0.05).abs() < 1e-9);

    assert_eq!(ws.trace_events("completion_detected").len(), 1);
    assert_eq!(ws.summary()["exit_code"], 0);
}

#[test]
fn session_resumes_across_iterations() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"case "$n" in
  1)
    echo '{"type": "result", "session_id": "s1", "total_cost_usd": 0.01, "num_turns": 5, "result": "continue please", "is_error": false}'
    ;;
  *)
    echo '{"type": "result", "session_id": "s2", "total_cost_usd": 0.01, "num_turns": 5, "result": "all done. PROJECT_COMPLETE.", "is_error": false}'
    ;;
esac"#,
    );
    ws.write_config(&cli, serde_json::json!({}));

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(0));

    let state = ws.state();
    assert_eq!(state["last_session_id"], "s2");
    assert_eq!(state["iteration"], 2);

    let args = ws.assistant_args();
    assert_eq!(args.len(), 2);
    assert!(!args[0].contains("--resume"));
    assert!(args[1].contains("--resume s1"));
}

#[test]
fn research_response_feeds_the_next_prompt() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"case "$n" in
  1)
    echo '{"type": "result", "session_id": "s1", "total_cost_usd": 0.01, "num_turns": 5, "result": "not yet", "is_error": false}'
    ;;
  *)
    echo '{"type": "result", "session_id": "s1", "total_cost_usd": 0.01, "num_turns": 5, "result": "PROJECT_COMPLETE", "is_error": false}'
    ;;
esac"#,
    );
    ws.write_config(&cli, serde_json::json!({}));

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(0));

    // The second invocation's prompt embeds the fake worker's synthesis
    let args = ws.assistant_args();
    assert!(args[1].contains("research synthesis: proceed"));

    let research = ws.trace_events("research_complete");
    assert_eq!(research.len(), 1);
    assert_eq!(research[0]["success"], true);
}
