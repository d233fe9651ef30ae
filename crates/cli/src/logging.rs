// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging setup with secret redaction.
//!
//! Every formatted log line passes through the [`Redactor`] before it
//! reaches stderr, so child-process output echoed into logs cannot leak
//! API keys.

use grist_core::Redactor;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `MakeWriter` that scrubs secrets from each buffer before writing.
#[derive(Clone)]
pub struct RedactingMakeWriter {
    redactor: Arc<Redactor>,
}

impl RedactingMakeWriter {
    pub fn new(redactor: Redactor) -> Self {
        Self {
            redactor: Arc::new(redactor),
        }
    }
}

pub struct RedactingWriter {
    redactor: Arc<Redactor>,
    inner: io::Stderr,
}

impl Write for RedactingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let redacted = self.redactor.redact(&text);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            redactor: Arc::clone(&self.redactor),
            inner: io::stderr(),
        }
    }
}

/// Install the global subscriber: env-filter (default `info`, `debug`
/// with `--verbose`), human or JSON line format, redacting writer.
pub fn setup(verbose: bool, json_log: bool, redactor: Redactor) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let writer = RedactingMakeWriter::new(redactor);

    if json_log {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(writer))
            .init();
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
