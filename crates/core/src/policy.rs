// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy engine: pure decision functions over cycle history.
//!
//! Nothing here performs I/O. The driver feeds in the current state and
//! configuration and acts on the verdicts.

use crate::config::{LimitsConfig, StagnationConfig};
use crate::state::WorkflowState;
use std::fmt;

/// Outcome of a stagnation check over the recent cycle window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagnationVerdict {
    Ok,
    /// Every cycle in the window had at most `threshold` turns.
    LowTurns { window: usize, threshold: u32 },
    /// Every cycle in the window cost nothing.
    ZeroCost { window: usize },
}

impl StagnationVerdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, StagnationVerdict::Ok)
    }
}

impl fmt::Display for StagnationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagnationVerdict::Ok => write!(f, "ok"),
            StagnationVerdict::LowTurns { window, threshold } => write!(
                f,
                "stagnation: last {window} iterations all had <= {threshold} turns"
            ),
            StagnationVerdict::ZeroCost { window } => {
                write!(f, "stagnation: last {window} iterations all cost $0.00")
            }
        }
    }
}

/// Check whether the current session should be rotated for fresh context.
///
/// Returns a human-readable reason when any ceiling holds:
/// 1. hard turn limit per session,
/// 2. hard cost limit per session,
/// 3. behavioural context exhaustion (most of the recent window ran under
///    this session with very few turns).
pub fn should_rotate_session(
    session_id: &str,
    state: &WorkflowState,
    cfg: &StagnationConfig,
) -> Option<String> {
    if !cfg.enabled {
        return None;
    }

    let session_turns = state.session_turns(Some(session_id));
    if session_turns >= cfg.session_max_turns {
        return Some(format!(
            "session turn limit reached: {session_turns} >= {}",
            cfg.session_max_turns
        ));
    }

    let session_cost = state.session_cost(Some(session_id));
    if session_cost >= cfg.session_max_cost_usd {
        return Some(format!(
            "session cost limit reached: ${session_cost:.2} >= ${:.2}",
            cfg.session_max_cost_usd
        ));
    }

    if state.cycles.len() >= cfg.context_exhaustion_window {
        let window = &state.cycles[state.cycles.len() - cfg.context_exhaustion_window..];
        let low_count = window
            .iter()
            .filter(|c| {
                c.num_turns < cfg.context_exhaustion_turn_threshold
                    && c.session_id.as_deref() == Some(session_id)
            })
            .count();
        // Majority of the window, e.g. 2 of 3
        let majority = cfg.context_exhaustion_window - 1;
        if low_count >= majority {
            return Some(format!(
                "context exhaustion: {low_count}/{} recent iterations below {} turns",
                cfg.context_exhaustion_window, cfg.context_exhaustion_turn_threshold
            ));
        }
    }

    None
}

/// Detect diminishing returns over the last `window_size` cycles.
pub fn check_stagnation(state: &WorkflowState, cfg: &StagnationConfig) -> StagnationVerdict {
    if !cfg.enabled || state.cycles.len() < cfg.window_size {
        return StagnationVerdict::Ok;
    }

    let window = &state.cycles[state.cycles.len() - cfg.window_size..];

    if window.iter().all(|c| c.num_turns <= cfg.low_turn_threshold) {
        return StagnationVerdict::LowTurns {
            window: cfg.window_size,
            threshold: cfg.low_turn_threshold,
        };
    }

    if window.iter().all(|c| c.cost_usd == 0.0) {
        return StagnationVerdict::ZeroCost {
            window: cfg.window_size,
        };
    }

    StagnationVerdict::Ok
}

/// Exponential-backoff cooldown after the `count`-th consecutive timeout.
///
/// `min(base * 2^(count-1), cap)`; 0 when the base is 0 or `count` is 0.
pub fn compute_cooldown(count: u32, cfg: &LimitsConfig) -> u64 {
    let base = cfg.timeout_cooldown_base_seconds;
    if base == 0 || count == 0 {
        return 0;
    }
    let factor = 2u64.saturating_pow(count.saturating_sub(1));
    base.saturating_mul(factor)
        .min(cfg.timeout_cooldown_max_seconds)
}

/// Wall-clock timeout for one iteration under the given model.
pub fn effective_timeout(model: &str, cfg: &LimitsConfig) -> u64 {
    let multiplier = cfg
        .model_timeout_multipliers
        .get(model)
        .copied()
        .unwrap_or(1.0);
    (cfg.timeout_seconds as f64 * multiplier) as u64
}

/// Max turns for one iteration: the global limit capped by any per-model
/// override.
pub fn effective_max_turns(model: &str, cfg: &LimitsConfig) -> u32 {
    match cfg.model_max_turns_override.get(model) {
        Some(cap) => cfg.max_turns_per_iteration.min(*cap),
        None => cfg.max_turns_per_iteration,
    }
}

/// Consecutive-timeout limit for the given model.
pub fn max_timeouts_for(model: &str, cfg: &StagnationConfig) -> u32 {
    cfg.model_timeout_overrides
        .get(model)
        .copied()
        .unwrap_or(cfg.max_consecutive_timeouts)
}

/// Case-insensitive substring search for any completion marker.
pub fn matches_completion(text: &str, markers: &[String]) -> bool {
    let haystack = text.to_lowercase();
    markers
        .iter()
        .any(|marker| !marker.is_empty() && haystack.contains(&marker.to_lowercase()))
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
