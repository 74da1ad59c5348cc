//! # Pipe Execution Modes (`stream::pipe`)
//!
//! File: cli/src/stream/pipe.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Wraps the copy engine in the same failure semantics `Namespace` offers for
//! single commands, for chains mixing processes, buffers and readers. Each
//! mode traces one `+ a | b | c` line and picks the destination itself:
//!
//! | Mode         | Destination     | Nonzero exit of a process        | Anything else |
//! |--------------|-----------------|----------------------------------|---------------|
//! | `run_pipe`   | standard output | fatal                            | fatal         |
//! | `check_pipe` | discarded       | `Outcome { ok: false, code }`    | fatal         |
//! | `get_pipe`   | memory          | fatal                            | fatal         |
//!
//! "Fatal" means an `anyhow::Error` wrapping the [`CopyError`] (leg, endpoint,
//! bytes written, and the typed `Error` as its source), meant to be propagated
//! with `?` to a top-level handler such as `core::error::report`. Use
//! `core::error::find` to get at the typed `Error`.
//! Only an `Error::Exit` with a recorded nonzero code counts as recoverable;
//! a signal-terminated process, a start failure, or an engine failure never is.
//!
use super::engine::{copy_to, Buffer, Label, Source, Stage};
use super::outcome::Outcome;
use crate::common::trace;
use crate::core::error::{CopyError, Result};
use tracing::debug;

fn trace_pipeline(src: &Source, stages: &[Stage]) {
    trace::pipeline(
        std::iter::once(src.to_string()).chain(stages.iter().map(ToString::to_string)),
    );
}

/// Runs a pipeline with its output going to standard output.
/// Returns the number of bytes written there.
pub async fn run_pipe(src: impl Into<Source>, stages: Vec<Stage>) -> Result<u64> {
    let src = src.into();
    trace_pipeline(&src, &stages);
    copy_to(Label::Named("<stdout>"), tokio::io::stdout(), src, stages)
        .await
        .map_err(fatal)
}

/// Runs a pipeline, discarding its output. A process exiting with a nonzero
/// code yields an unsuccessful `Outcome` tagged with that process.
pub async fn check_pipe(src: impl Into<Source>, stages: Vec<Stage>) -> Result<Outcome> {
    let src = src.into();
    trace_pipeline(&src, &stages);
    match copy_to(Label::Named("<discard>"), tokio::io::sink(), src, stages).await {
        Ok(_) => Ok(Outcome::success("", None)),
        Err(err) => recover(err, ""),
    }
}

/// Runs a pipeline and captures its output. On success the `Outcome` is
/// tagged with the terminal stage when that stage is a process.
pub async fn get_pipe(src: impl Into<Source>, stages: Vec<Stage>) -> Result<Outcome> {
    let src = src.into();
    trace_pipeline(&src, &stages);
    capture(src, stages, false).await
}

/// Shared by `get_pipe`, `Namespace::check` and `Namespace::get`. Does not trace.
pub(crate) async fn capture(
    src: Source,
    stages: Vec<Stage>,
    recover_exit: bool,
) -> Result<Outcome> {
    let terminal = stages
        .last()
        .map_or_else(|| src.invocation(), Stage::invocation)
        .cloned();
    let buffer = Buffer::new();
    match copy_to(Label::Named("<buffer>"), buffer.clone(), src, stages).await {
        Ok(_) => Ok(Outcome::success(&buffer.text(), terminal)),
        Err(err) if recover_exit => recover(err, &buffer.text()),
        Err(err) => Err(fatal(err)),
    }
}

fn recover(err: CopyError, output: &str) -> Result<Outcome> {
    match err.error.code() {
        Some(code) if err.error.is_recoverable() => {
            debug!(code, "Recovered nonzero exit at {}", err.endpoint);
            Ok(Outcome::failure(output, code, err.error.invocation().cloned()))
        }
        _ => Err(fatal(err)),
    }
}

fn fatal(err: CopyError) -> anyhow::Error {
    debug!(
        leg = err.leg,
        written = err.written,
        "Pipeline failure is fatal at {}",
        err.endpoint
    );
    anyhow::Error::new(err)
}
