// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret redaction for log output.
//!
//! Children consume the API keys; the driver only has to make sure none of
//! them leak through its own logs. Patterns come from the security section
//! of the config; anything matching is replaced with `[REDACTED]`.

use regex::Regex;
use std::borrow::Cow;

const REPLACEMENT: &str = "[REDACTED]";

/// Compiled redaction patterns.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    patterns: Vec<Regex>,
}

impl Redactor {
    /// Compile the given patterns. Invalid regexes are skipped with a
    /// warning rather than failing startup.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(p.as_ref()) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = p.as_ref(), error = %e, "skipping invalid redact pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Replace every pattern match in `text` with `[REDACTED]`.
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        for pattern in &self.patterns {
            if pattern.is_match(&out) {
                out = Cow::Owned(pattern.replace_all(&out, REPLACEMENT).into_owned());
            }
        }
        out
    }

    /// True when no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
