//! # Pipewright Error Types
//!
//! File: cli/src/core/error.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module defines how process and pipeline failures are represented and
//! rendered. There are exactly three ways running something can fail:
//!
//! - `Error::Start`: the process never launched (not found, not executable,
//!   empty argv). Always fatal at the point of use.
//! - `Error::Exit`: the process launched and exited unsuccessfully. Carries
//!   the exit code (absent when a signal killed it) and the trimmed text the
//!   process wrote to its diagnostic channel. Recoverable through `check`.
//! - `Error::Engine`: one of the copy engine's own reads or writes failed.
//!   Names the offending endpoint. Always fatal.
//!
//! ## Architecture
//!
//! - `Error` is `Clone` so a `Stream` can hand the same sticky failure to
//!   every later caller. Underlying `std::io::Error`s are kept behind `Arc`.
//! - `CopyError` wraps an `Error` with the pipeline leg that failed and how
//!   many bytes had reached the final destination at that point.
//! - `Result<T>` is `anyhow::Result<T>`, the "fatal" class that `run`, `get`
//!   and the pipe modes return for callers to propagate with `?`.
//! - `report` renders a fatal error for humans, printing captured diagnostic
//!   text under its own heading.
//!
//! ## Examples
//!
//! ```rust
//! use pipewright::{Error, Namespace};
//!
//! # async fn example() {
//! match Namespace::new().try_run(["nonexistent-binary-xyz"]).await {
//!     Err(Error::Start { .. }) => println!("not installed"),
//!     Err(other) => println!("failed: {other}"),
//!     Ok(()) => println!("ran"),
//! }
//! # }
//! ```
//!
use crate::stream::Invocation;
use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;

/// Heading printed above captured diagnostic text by [`report`].
pub const DIAGNOSTIC_HEADING: &str = "--- stderr ---";
/// Closing rule printed after captured diagnostic text by [`report`].
pub const DIAGNOSTIC_FOOTER: &str = "--------------";

/// A failure to run a process or move bytes through a pipeline.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("failed to start `{invocation}`")]
    Start {
        invocation: Invocation,
        source: Arc<io::Error>,
    },

    #[error("`{invocation}` {}", describe_status(.code, .signal))]
    Exit {
        invocation: Invocation,
        code: Option<i32>,
        signal: Option<i32>,
        log: String,
    },

    #[error("pipeline I/O failed at {endpoint}")]
    Engine {
        endpoint: String,
        source: Arc<io::Error>,
    },
}

impl Error {
    pub(crate) fn start(invocation: &Invocation, source: io::Error) -> Self {
        Error::Start {
            invocation: invocation.clone(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn engine(endpoint: impl Into<String>, source: io::Error) -> Self {
        Error::Engine {
            endpoint: endpoint.into(),
            source: Arc::new(source),
        }
    }

    /// Exit code recorded for an `Exit` failure, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Exit { code, .. } => *code,
            _ => None,
        }
    }

    /// Captured diagnostic text, if any was recorded.
    pub fn log(&self) -> Option<&str> {
        match self {
            Error::Exit { log, .. } if !log.is_empty() => Some(log),
            _ => None,
        }
    }

    /// The process this failure belongs to, when it belongs to one.
    pub fn invocation(&self) -> Option<&Invocation> {
        match self {
            Error::Start { invocation, .. } | Error::Exit { invocation, .. } => Some(invocation),
            Error::Engine { .. } => None,
        }
    }

    /// Whether `check` may turn this failure into an unsuccessful `Outcome`
    /// instead of aborting: only a normal exit with a nonzero code qualifies.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Exit { code: Some(code), .. } if *code > 0)
    }

    /// Moves this error across an `AsyncRead`/`AsyncWrite` boundary.
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }

    /// Recovers an `Error` previously wrapped by [`Error::into_io`].
    pub(crate) fn from_io(err: &io::Error) -> Option<Self> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<Error>())
            .cloned()
    }
}

fn describe_status(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exited with code {code}"),
        (None, Some(signal)) => format!("was terminated by signal {signal}"),
        (None, None) => "exited unsuccessfully".to_string(),
    }
}

/// A pipeline leg failed. The first failing leg cancels every other leg.
#[derive(Error, Debug, Clone)]
#[error("pipeline leg {leg} ({endpoint}) failed")]
pub struct CopyError {
    /// Zero-based leg index: leg 0 reads the source.
    pub leg: usize,
    /// Label of the endpoint whose read, write or close failed.
    pub endpoint: String,
    /// Bytes that had reached the final destination when the leg failed.
    pub written: u64,
    #[source]
    pub error: Error,
}

/// Errors raised while loading or validating configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Type alias for Result using anyhow::Error for the fatal paths.
pub type Result<T> = anyhow::Result<T>;

/// Finds the first pipeline [`Error`] anywhere in an error chain.
pub fn find(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<Error>()
            .or_else(|| cause.downcast_ref::<CopyError>().map(|copy| &copy.error))
    })
}

/// # Report Error (`report`)
///
/// Renders a fatal error for the terminal: the message chain on one line,
/// then any diagnostic text the failed process wrote, framed by
/// [`DIAGNOSTIC_HEADING`] and [`DIAGNOSTIC_FOOTER`] so it cannot be mistaken
/// for the tool's own output.
pub fn report(err: &anyhow::Error, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Error: {err:#}")?;
    if let Some(log) = find(err).and_then(Error::log) {
        writeln!(out, "{DIAGNOSTIC_HEADING}")?;
        writeln!(out, "{log}")?;
        writeln!(out, "{DIAGNOSTIC_FOOTER}")?;
    }
    Ok(())
}
