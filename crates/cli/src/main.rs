// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! grist - autonomous iteration driver for an agentic coding assistant
//!
//! Repeatedly invokes the assistant CLI against a project, tracks cost
//! and progress budgets, and consults a research oracle for the next
//! prompt until a completion marker appears.

mod logging;

use anyhow::Result;
use clap::Parser;
use grist_core::{load_config, Clock, Redactor, SystemClock, WorkflowConfig};
use grist_engine::{
    Assistant, Driver, DriverOptions, DryRunAssistant, Supervisor, EXIT_BUDGET_EXCEEDED,
    EXIT_MAX_ITERATIONS, EXIT_STAGNATION,
};
use grist_research::{ResearchClient, SubprocessWorker};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "grist",
    version,
    about = "Autonomous iteration driver for an agentic coding assistant"
)]
struct Cli {
    /// Project directory path
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Path to config.json (default: <project>/.workflow/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Max loop iterations
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Assistant model (sonnet, opus, haiku)
    #[arg(long)]
    model: Option<String>,

    /// Initial prompt for the first iteration
    #[arg(long, default_value = "")]
    prompt: String,

    /// Per-iteration timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Max total budget in USD
    #[arg(long)]
    max_budget: Option<f64>,

    /// Simulate without spawning the assistant
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Output structured JSON logs
    #[arg(long)]
    json_log: bool,

    /// Safe single-iteration production validation
    #[arg(long)]
    smoke_test: bool,

    /// Disable diminishing-returns detection
    #[arg(long)]
    no_stagnation_check: bool,

    /// Skip the assistant preflight check
    #[arg(long)]
    skip_preflight: bool,
}

/// Apply command-line overrides onto the loaded config.
fn apply_overrides(config: &mut WorkflowConfig, cli: &Cli) {
    if let Some(max_iterations) = cli.max_iterations {
        config.limits.max_iterations = max_iterations;
    }
    if let Some(model) = &cli.model {
        config.assistant.model = model.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.limits.timeout_seconds = timeout;
    }
    if let Some(max_budget) = cli.max_budget {
        config.limits.max_total_budget_usd = max_budget;
    }
    if cli.no_stagnation_check {
        config.stagnation.enabled = false;
    }
}

/// Clamp limits for `--smoke-test`: one short, cheap iteration.
fn apply_smoke_test_clamps(config: &mut WorkflowConfig) {
    config.limits.max_iterations = 1;
    config.limits.timeout_seconds = 120;
    config.limits.max_per_iteration_budget_usd = 2.0;
    config.limits.max_turns_per_iteration = 10;
}

async fn drive<A: Assistant>(
    workspace: &std::path::Path,
    config: WorkflowConfig,
    options: DriverOptions,
    assistant: A,
) -> i32 {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let research = ResearchClient::new(
        workspace,
        SubprocessWorker::new(config.research.clone()),
        config.retry.clone(),
        &config.research.perplexity_mode,
        Arc::clone(&clock),
    );
    let mut driver = Driver::new(workspace, config, options, assistant, research, clock);
    driver.run().await
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let workspace = cli.project.canonicalize().unwrap_or(cli.project.clone());
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| workspace.join(".workflow").join("config.json"));

    let mut config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            eprintln!(
                "Recovery: fix {} or delete it to fall back to defaults",
                config_path.display()
            );
            return Ok(1);
        }
    };

    apply_overrides(&mut config, &cli);
    if cli.smoke_test {
        apply_smoke_test_clamps(&mut config);
    }

    logging::setup(
        cli.verbose,
        cli.json_log,
        Redactor::new(&config.security.log_redact_patterns),
    );

    if cli.smoke_test {
        tracing::info!("*** SMOKE TEST MODE ***");
    }

    let options = DriverOptions {
        initial_prompt: cli.prompt.clone(),
        dry_run: cli.dry_run,
        smoke_test: cli.smoke_test,
        skip_preflight: cli.skip_preflight,
    };

    let exit_code = if cli.dry_run {
        drive(&workspace, config, options, DryRunAssistant).await
    } else {
        let supervisor = Supervisor::new(&workspace, config.assistant.clone());
        drive(&workspace, config, options, supervisor).await
    };

    match exit_code {
        EXIT_MAX_ITERATIONS => eprintln!(
            "Recovery: inspect .workflow/metrics_summary.json, then re-run with a higher \
             --max-iterations or a sharper prompt"
        ),
        EXIT_BUDGET_EXCEEDED => eprintln!(
            "Recovery: inspect .workflow/metrics_summary.json and raise --max-budget or the \
             per-iteration cap in config.json"
        ),
        EXIT_STAGNATION => eprintln!(
            "Recovery: inspect .workflow/trace.jsonl for stagnation_exit or preflight_failed \
             events; refine CLAUDE.md, or re-run with --skip-preflight if the CLI probe is at \
             fault"
        ),
        _ => {}
    }

    Ok(exit_code)
}

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("grist failed: {e:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
