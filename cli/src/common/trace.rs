//! # Pipewright Trace Sink (`common::trace`)
//!
//! File: cli/src/common/trace.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Every invocation writes one human-readable line before it runs:
//!
//! ```text
//! + FOO=bar make test
//! + <stream> | sort | uniq -c
//! ```
//!
//! Lines go to a single process-wide sink. It starts out as standard error
//! and can be swapped for any writer or discarded entirely with [`set_sink`].
//! This is separate from `tracing` logging: trace lines are part of the tool's
//! user-facing output, log records are for debugging the engine.
//!
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Destination for trace lines.
pub enum TraceSink {
    /// Standard error of the current process (the default).
    Stderr,
    /// Drop every line.
    Discard,
    /// Any other writer, e.g. a log file or a test buffer.
    Writer(Box<dyn Write + Send>),
}

impl std::fmt::Debug for TraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceSink::Stderr => f.write_str("Stderr"),
            TraceSink::Discard => f.write_str("Discard"),
            TraceSink::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

static SINK: Mutex<TraceSink> = Mutex::new(TraceSink::Stderr);

/// Replaces the global trace sink, returning the previous one.
pub fn set_sink(sink: TraceSink) -> TraceSink {
    let mut guard = SINK.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *guard, sink)
}

/// Writes `+ <text>` to the trace sink.
pub fn line(text: &str) {
    tracing::debug!("+ {}", text);
    let mut guard = SINK.lock().unwrap_or_else(PoisonError::into_inner);
    let result = match &mut *guard {
        TraceSink::Stderr => writeln!(io::stderr().lock(), "+ {text}"),
        TraceSink::Discard => Ok(()),
        TraceSink::Writer(writer) => writeln!(writer, "+ {text}").and_then(|_| writer.flush()),
    };
    // A broken trace sink must never fail the command being traced.
    if let Err(err) = result {
        warn!("Failed to write trace line: {}", err);
    }
}

/// Writes one line for a whole pipeline, stages joined by ` | `.
pub fn pipeline<I, S>(stages: I)
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    let rendered = stages
        .into_iter()
        .map(|stage| stage.to_string())
        .collect::<Vec<_>>()
        .join(" | ");
    line(&rendered);
}
