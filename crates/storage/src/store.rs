// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed workflow state.
//!
//! The store owns the in-memory [`WorkflowState`] and its on-disk home at
//! `<workspace>/.workflow/state.json`. Saves are atomic (write to `.tmp`,
//! fsync, rename) so a crash mid-save never corrupts the file.

use crate::migrate::{MigrationError, MigrationRegistry};
use grist_core::{WorkflowState, STATE_VERSION};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-workspace state directory.
pub const WORKFLOW_DIR: &str = ".workflow";

/// State file name within the workflow directory.
const STATE_FILE: &str = "state.json";

/// The workflow directory for a workspace.
pub fn workflow_dir(workspace: &Path) -> PathBuf {
    workspace.join(WORKFLOW_DIR)
}

/// Errors from loading or saving state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt state file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Persistent workflow state rooted in a workspace directory.
pub struct StateStore {
    state_path: PathBuf,
    pub state: WorkflowState,
}

impl StateStore {
    /// Create a store for the given workspace with fresh default state.
    pub fn new(workspace: &Path) -> Self {
        Self {
            state_path: workflow_dir(workspace).join(STATE_FILE),
            state: WorkflowState::default(),
        }
    }

    /// Path of the backing state file.
    pub fn path(&self) -> &Path {
        &self.state_path
    }

    /// Load state from disk, upgrading older schema versions in place.
    ///
    /// A missing file keeps the fresh defaults; corrupt JSON is an error.
    pub fn load(&mut self) -> Result<(), StoreError> {
        if !self.state_path.exists() {
            tracing::info!(path = %self.state_path.display(), "no existing state, starting fresh");
            return Ok(());
        }

        let raw = fs::read_to_string(&self.state_path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let value = MigrationRegistry::new().migrate_to(value, STATE_VERSION)?;
        self.state = serde_json::from_value(value)?;
        Ok(())
    }

    /// Persist the current state atomically.
    ///
    /// Always writes the current schema version.
    pub fn save(&mut self) -> Result<(), StoreError> {
        self.state.version = STATE_VERSION;

        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.state_path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &self.state)?;
            writer.write_all(b"\n")?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.state_path)?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
