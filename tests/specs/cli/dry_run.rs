//! Dry-run specs
//!
//! `--dry-run` never spawns the assistant: iterations are simulated with
//! zero cost and the loop exercises its bookkeeping end to end.

use crate::prelude::*;

#[test]
fn dry_run_simulates_iterations_without_the_assistant() {
    let ws = TestWorkspace::new();
    // Point at a nonexistent assistant: dry-run must never touch it
    ws.write_config("/nonexistent/assistant", serde_json::json!({}));

    let output = ws.run_grist(&["--prompt", "work", "--dry-run", "--max-iterations", "2"]);
    // Simulated iterations never complete, so the iteration cap is hit
    assert_eq!(output.status.code(), Some(1));

    let state = ws.state();
    assert_eq!(state["iteration"], 2);
    assert_eq!(state["status"], "failed");
    assert_eq!(state["metrics"]["total_cost_usd"], 0.0);
    assert!(state["cycles"][0]["session_id"]
        .as_str()
        .unwrap()
        .starts_with("dry-run-"));

    // No assistant invocation was logged
    assert!(ws.assistant_args().is_empty());
}
