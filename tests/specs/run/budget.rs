//! Budget enforcement specs

use crate::prelude::*;

#[test]
fn per_iteration_budget_breach_exits_two() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"echo '{"type": "result", "session_id": "s1", "total_cost_usd": 10.0, "num_turns": 5, "result": "expensive", "is_error": false}'"#,
    );
    ws.write_config(
        &cli,
        serde_json::json!({
            "limits": {"max_per_iteration_budget_usd": 0.10}
        }),
    );

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(2));

    assert_eq!(ws.summary()["status"], "failed");
    assert_eq!(ws.summary()["exit_code"], 2);
    assert_eq!(ws.trace_events("budget_exceeded").len(), 1);

    // The terminal message names the recovery step
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Recovery:"));
}

#[test]
fn total_budget_breach_exits_two() {
    let ws = TestWorkspace::new();
    let cli = ws.fake_assistant(
        r#"echo '{"type": "result", "session_id": "s1", "total_cost_usd": 0.8, "num_turns": 5, "result": "chipping away", "is_error": false}'"#,
    );
    ws.write_config(&cli, serde_json::json!({}));

    // Total cap below two iterations of cost
    let output = ws.run_grist(&["--prompt", "work", "--max-budget", "1.5"]);
    assert_eq!(output.status.code(), Some(2));

    let state = ws.state();
    assert_eq!(state["status"], "failed");
    assert_eq!(state["cycles"].as_array().unwrap().len(), 2);
}
