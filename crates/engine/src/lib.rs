// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! grist-engine: assistant process supervision and the iteration driver

pub mod driver;
pub mod kill;
pub mod prompts;
pub mod supervisor;

pub use driver::{
    Driver, DriverOptions, EXIT_BUDGET_EXCEEDED, EXIT_COMPLETE, EXIT_MAX_ITERATIONS,
    EXIT_STAGNATION,
};
pub use kill::kill_process_tree;
pub use supervisor::{Assistant, DryRunAssistant, InvokeSpec, PreflightError, Supervisor};

#[cfg(any(test, feature = "test-support"))]
pub use supervisor::FakeAssistant;
