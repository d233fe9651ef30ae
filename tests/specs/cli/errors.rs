//! Configuration error specs

use crate::prelude::*;

#[test]
fn corrupt_config_fails_fast_with_recovery_hint() {
    let ws = TestWorkspace::new();
    let wf = ws.path().join(".workflow");
    std::fs::create_dir_all(&wf).unwrap();
    std::fs::write(wf.join("config.json"), "{broken json").unwrap();

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config error"));
    assert!(stderr.contains("Recovery:"));
}

#[test]
fn out_of_range_config_fails_validation() {
    let ws = TestWorkspace::new();
    let wf = ws.path().join(".workflow");
    std::fs::create_dir_all(&wf).unwrap();
    std::fs::write(wf.join("config.json"), r#"{"limits": {"max_iterations": 0}}"#).unwrap();

    let output = ws.run_grist(&["--prompt", "work"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_iterations"));
}
