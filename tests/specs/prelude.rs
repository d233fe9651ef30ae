//! Test helpers for behavioral specifications.
//!
//! Provides a workspace fixture with a scripted fake assistant CLI and a
//! fake research worker, plus accessors for the files grist writes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Returns the path to the grist binary in the shared target directory.
///
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale.
fn grist_binary() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug/grist");
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where grist is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("grist");
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// A throwaway project workspace with a scripted assistant.
pub struct TestWorkspace {
    dir: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable fake assistant script.
    ///
    /// The script handles `--version`, appends its argv to `args.log`,
    /// and keeps an invocation counter in `$n` for the scenario body.
    pub fn fake_assistant(&self, body: &str) -> String {
        #[cfg(unix)]
        use std::os::unix::fs::PermissionsExt;

        let path = self.path().join("fake-claude");
        // Argv is logged one line per invocation; newlines inside prompt
        // arguments are flattened so line counts match invocation counts.
        let script = format!(
            "#!/bin/sh\n\
             DIR=\"$(dirname \"$0\")\"\n\
             if [ \"$1\" = \"--version\" ]; then echo \"fake-claude 1.0.0\"; exit 0; fi\n\
             printf '%s ' \"$@\" | tr '\\n' ' ' >> \"$DIR/args.log\"\n\
             echo \"\" >> \"$DIR/args.log\"\n\
             n=$(cat \"$DIR/count\" 2>/dev/null || echo 0)\n\
             n=$((n+1))\n\
             echo \"$n\" > \"$DIR/count\"\n\
             {body}\n"
        );
        std::fs::write(&path, script).unwrap();
        #[cfg(unix)]
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    /// Write a fake research worker that always answers.
    pub fn fake_worker(&self) -> String {
        let path = self.path().join("fake-worker.sh");
        std::fs::write(
            &path,
            "#!/bin/sh\necho '{\"synthesis\": \"research synthesis: proceed\"}'\n",
        )
        .unwrap();
        path.display().to_string()
    }

    /// Write `.workflow/config.json` wiring in the fake assistant, the
    /// fake worker, and zeroed cooldowns so specs never sleep.
    pub fn write_config(&self, assistant_command: &str, extra: serde_json::Value) {
        let mut config = serde_json::json!({
            "limits": {
                "timeout_cooldown_base_seconds": 0,
                "timeout_cooldown_max_seconds": 0,
            },
            "assistant": {
                "command": assistant_command,
            },
            "research": {
                "interpreter": "sh",
                "worker_script": self.fake_worker(),
                "headful": false,
                "research_timeout_seconds": 60,
            },
            "retry": {
                "max_retries": 0,
                "base_delay_seconds": 0.001,
                "max_delay_seconds": 0.002,
            },
        });
        merge(&mut config, extra);

        let wf = self.path().join(".workflow");
        std::fs::create_dir_all(&wf).unwrap();
        std::fs::write(
            wf.join("config.json"),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();
    }

    /// Run grist against this workspace and return the raw output.
    pub fn run_grist(&self, args: &[&str]) -> Output {
        Command::new(grist_binary())
            .arg("--project")
            .arg(self.path())
            .args(args)
            .output()
            .expect("failed to run grist binary")
    }

    pub fn state(&self) -> serde_json::Value {
        let raw = std::fs::read_to_string(self.path().join(".workflow/state.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    pub fn summary(&self) -> serde_json::Value {
        let raw =
            std::fs::read_to_string(self.path().join(".workflow/metrics_summary.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    pub fn trace(&self) -> Vec<serde_json::Value> {
        std::fs::read_to_string(self.path().join(".workflow/trace.jsonl"))
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    pub fn trace_events(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.trace()
            .into_iter()
            .filter(|e| e["event_type"] == event_type)
            .collect()
    }

    /// One line of argv per assistant invocation.
    pub fn assistant_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("args.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }
}

fn merge(base: &mut serde_json::Value, extra: serde_json::Value) {
    if let (Some(base), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
        for (key, value) in extra {
            match (base.get_mut(&key), value) {
                (Some(slot @ serde_json::Value::Object(_)), value @ serde_json::Value::Object(_)) => {
                    merge(slot, value);
                }
                (_, value) => {
                    base.insert(key, value);
                }
            }
        }
    }
}
