//! # Pipewright Library Root
//!
//! File: cli/src/lib.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Pipewright lets task-runner and build-automation tools start external
//! processes, chain them together the way a shell pipe chain does, capture
//! their output, and turn process failures into typed errors carrying exit
//! codes and captured diagnostic text. No shell is ever spawned: argv[0] is
//! resolved on `PATH` and arguments are passed through verbatim.
//!
//! ## Architecture
//!
//! - `core`: the error taxonomy (`Error::{Start, Exit, Engine}`), the top-level
//!   error renderer, and configuration loading.
//! - `common`: shell quoting for trace lines and the global trace sink.
//! - `stream`: the lazily-started process `Stream`, the multi-leg `copy` engine,
//!   and the `run_pipe` / `check_pipe` / `get_pipe` execution modes.
//! - `namespace`: environment-scoped `Namespace` with `run`, `try_run`,
//!   `check` and `get`.
//!
//! ## Example
//!
//! ```no_run
//! use pipewright::{Namespace, Source, Stage, Stream};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ns = Namespace::new().with_env([("LC_ALL", "C")]);
//! let hello = ns.get(["echo", "hello"]).await?;
//! assert_eq!(hello.output, "hello");
//!
//! let sorted = pipewright::get_pipe(
//!     Source::bytes("b\na\nc\n"),
//!     vec![Stage::from(Stream::new(["sort"]))],
//! )
//! .await?;
//! assert_eq!(sorted.output, "a\nb\nc");
//! # Ok(())
//! # }
//! ```
//!
pub mod common;
pub mod core;
pub mod namespace;
pub mod stream;

pub use crate::core::error::{CopyError, Error};
pub use crate::namespace::Namespace;
pub use crate::stream::{
    check_pipe, copy, get_pipe, run_pipe, Buffer, CancelSignal, Invocation, Outcome, Source,
    Stage, Stream,
};
