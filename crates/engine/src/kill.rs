// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-tree termination.
//!
//! The assistant CLI spawns its own children on some hosts; all of them
//! must die when an iteration is cut short. Windows has a native
//! tree-kill primitive; on Unix the child is started in its own process
//! group and the whole group is signalled.

use std::time::Duration;
use tokio::process::Command;

/// Timeout for the kill helper subprocess itself.
const KILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period between the polite SIGTERM and the hard SIGKILL.
#[cfg(unix)]
const TERM_GRACE: Duration = Duration::from_millis(300);

/// Kill `pid` and all of its descendants. Best-effort: failures are
/// logged at debug level, never propagated.
#[cfg(windows)]
pub async fn kill_process_tree(pid: u32) {
    run_kill("taskkill", &["/F", "/T", "/PID", &pid.to_string()]).await;
}

/// Kill `pid` and all of its descendants. Best-effort: failures are
/// logged at debug level, never propagated.
///
/// Sends SIGTERM to the process group (the supervisor spawns the child
/// as a group leader) and to the pid itself, then SIGKILL to the group.
/// The supervisor follows up with a hard kill and a bounded wait.
#[cfg(unix)]
pub async fn kill_process_tree(pid: u32) {
    let group = format!("-{pid}");
    run_kill("kill", &["-TERM", "--", &group]).await;
    run_kill("kill", &["-TERM", &pid.to_string()]).await;
    tokio::time::sleep(TERM_GRACE).await;
    run_kill("kill", &["-KILL", "--", &group]).await;
}

async fn run_kill(program: &str, args: &[&str]) {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    match tokio::time::timeout(KILL_TIMEOUT, cmd.status()).await {
        Ok(Ok(status)) if status.success() => {
            tracing::debug!(program, ?args, "kill succeeded");
        }
        Ok(Ok(status)) => {
            // Usually the process is already gone
            tracing::debug!(program, ?args, code = status.code(), "kill returned non-zero");
        }
        Ok(Err(e)) => {
            tracing::debug!(program, ?args, error = %e, "kill failed to run");
        }
        Err(_) => {
            tracing::warn!(program, ?args, "kill helper timed out");
        }
    }
}

#[cfg(test)]
#[path = "kill_tests.rs"]
mod tests;
