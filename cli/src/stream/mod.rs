//! # Pipewright Streams (`stream`)
//!
//! File: cli/src/stream/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Everything that moves bytes between processes:
//!
//! - **`process`**: [`Stream`], one external process as an `AsyncRead + AsyncWrite`
//!   with deferred start, a single await phase, and optional cancellation.
//! - **`cancel`**: [`CancelSignal`], the fire-once signal reads race against.
//! - **`engine`**: the multi-leg [`copy`] engine plus its [`Source`], [`Stage`]
//!   and [`Buffer`] endpoints.
//! - **`pipe`**: the `run_pipe` / `check_pipe` / `get_pipe` execution modes.
//! - **`outcome`**: [`Outcome`], the captured result of checking or getting.
//!
//! ## Usage
//!
//! ```no_run
//! use pipewright::stream::{self, Source, Stage, Stream};
//!
//! # async fn example() -> anyhow::Result<()> {
//! // git log | grep fix | wc -l
//! let count = stream::get_pipe(
//!     Source::from(Stream::new(["git", "log", "--oneline"])),
//!     vec![
//!         Stage::from(Stream::new(["grep", "fix"])),
//!         Stage::from(Stream::new(["wc", "-l"])),
//!     ],
//! )
//! .await?;
//! println!("{} fixes", count.output.trim());
//! # Ok(())
//! # }
//! ```
//!
mod cancel;
mod engine;
mod outcome;
mod pipe;
mod process;

pub use self::cancel::CancelSignal;
pub use self::engine::{copy, Buffer, Source, Stage};
pub use self::outcome::Outcome;
pub use self::pipe::{check_pipe, get_pipe, run_pipe};
pub use self::process::{Invocation, Stream};

pub(crate) use self::pipe::capture;
