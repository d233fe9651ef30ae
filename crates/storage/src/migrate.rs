// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-file migration for schema evolution.
//!
//! Migrations transform the raw state JSON from one version to the next.
//! The registry chains them to reach the current version. A state file
//! without a `version` field is treated as version 1.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during migration
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration v{from}→v{to} failed: {reason}")]
    Failed { from: u32, to: u32, reason: String },
    #[error("no migration path from v{0} to v{1}")]
    NoPath(u32, u32),
    #[error("state version {0} is newer than supported ({1})")]
    TooNew(u32, u32),
}

/// A migration from one state version to the next.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, state: &mut Value) -> Result<(), MigrationError>;
}

/// Registry of migrations for upgrading state files.
pub struct MigrationRegistry {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    /// Create a new registry with all known migrations.
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    /// Migrate a raw state document to the target version.
    ///
    /// Stamps `version: 1` on documents that predate the field.
    pub fn migrate_to(&self, mut state: Value, target: u32) -> Result<Value, MigrationError> {
        if state.get("version").is_none() {
            if let Some(obj) = state.as_object_mut() {
                obj.insert("version".into(), 1.into());
                tracing::info!("migrated state file: added version=1");
            }
        }

        let current = state
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(1) as u32;

        if current == target {
            return Ok(state);
        }
        if current > target {
            return Err(MigrationError::TooNew(current, target));
        }

        let mut version = current;
        while version < target {
            let migration = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(version, target))?;

            migration.migrate(&mut state)?;
            version = migration.target_version();

            if let Some(obj) = state.as_object_mut() {
                obj.insert("version".into(), version.into());
            }
        }
        Ok(state)
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
