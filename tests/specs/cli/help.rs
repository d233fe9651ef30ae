//! CLI surface specs

use crate::prelude::*;

#[test]
fn help_shows_usage_and_flags() {
    let ws = TestWorkspace::new();
    let output = ws.run_grist(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--max-iterations"));
    assert!(stdout.contains("--smoke-test"));
    assert!(stdout.contains("--dry-run"));
    assert!(stdout.contains("--skip-preflight"));
}

#[test]
fn version_prints_the_crate_version() {
    let ws = TestWorkspace::new();
    let output = ws.run_grist(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("grist"));
}

#[test]
fn unknown_flag_is_rejected() {
    let ws = TestWorkspace::new();
    let output = ws.run_grist(&["--definitely-not-a-flag"]);
    assert!(!output.status.success());
}
