// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! grist-research: research oracle client with retry and circuit breaking

pub mod client;
pub mod context;
pub mod worker;

pub use client::{Research, ResearchClient, ResearchError};
pub use context::SessionContext;
pub use worker::{SubprocessWorker, WorkerInvoker};

#[cfg(any(test, feature = "test-support"))]
pub use worker::FakeWorker;
