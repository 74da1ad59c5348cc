//! # Pipewright Namespaces (`namespace`)
//!
//! File: cli/src/namespace.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! A [`Namespace`] is an immutable set of environment overrides and a factory
//! for the `Stream`s that should run under them. It also ties the four ways a
//! task typically wants to run a command to one place:
//!
//! | Method    | Output              | Nonzero exit                  | Failure to run |
//! |-----------|---------------------|-------------------------------|----------------|
//! | `run`     | the terminal        | fatal                         | fatal          |
//! | `try_run` | the terminal        | returned `Error::Exit`        | returned `Error::Start` |
//! | `check`   | captured            | `Outcome { ok: false, code }` | fatal          |
//! | `get`     | captured            | fatal                         | fatal          |
//!
//! "Fatal" results are `anyhow::Error`s; callers propagate them with `?` up to
//! a handler such as `core::error::report`. `run` wraps the typed `Error`
//! directly, the capturing modes wrap the pipeline's `CopyError`, and
//! `core::error::find` reaches the typed `Error` in either case.
//!
//! ## Environment Scoping
//!
//! Overrides are layered over the ambient environment when each process
//! starts. [`Namespace::with_env`] returns a new namespace (caller wins on
//! conflicts) and never changes the one it was derived from, so namespaces
//! can be shared freely across tasks.
//!
//! ## Examples
//!
//! ```no_run
//! use pipewright::Namespace;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ns = Namespace::new();
//! let release = ns.with_env([("PROFILE", "release")]);
//!
//! release.run(["cargo", "build"]).await?;
//! if !ns.check(["git", "diff", "--quiet"]).await?.ok {
//!     println!("working tree is dirty");
//! }
//! let head = ns.get(["git", "rev-parse", "HEAD"]).await?.output;
//! # Ok(())
//! # }
//! ```
//!
use crate::common::trace;
use crate::core::error::{Error, Result};
use crate::stream::{self, CancelSignal, Outcome, Source, Stream};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Environment overrides plus the execution modes that use them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    env: Arc<BTreeMap<String, String>>,
}

impl Namespace {
    /// A namespace with no overrides: processes see the ambient environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a namespace with `overrides` layered over this one's.
    pub fn with_env<I, K, V>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = (*self.env).clone();
        env.extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self { env: Arc::new(env) }
    }

    /// The override for `key`, if this namespace sets one.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// All overrides, sorted by name.
    pub fn overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Builds a `Stream` for `argv` under this namespace's overrides.
    pub fn stream<I, S>(&self, argv: I) -> Stream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stream::new(argv).with_env(self.env.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Like [`Namespace::stream`], with reads racing `signal`.
    pub fn stream_with_cancel<I, S>(&self, signal: &CancelSignal, argv: I) -> Stream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream(argv).with_cancel(signal)
    }

    /// Runs a command attached to the terminal. Any failure is fatal.
    pub async fn run<I, S>(&self, argv: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.try_run(argv).await.map_err(anyhow::Error::new)
    }

    /// Runs a command attached to the terminal, returning any failure.
    pub async fn try_run<I, S>(&self, argv: I) -> std::result::Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stream = self.stream(argv).inherit_stdio();
        trace::line(&stream.to_string());
        stream::copy(tokio::io::sink(), Source::from(stream), Vec::new())
            .await
            .map(|_| ())
            .map_err(|err| err.error)
    }

    /// Runs a command and captures its output. A nonzero exit code becomes
    /// `Outcome { ok: false, code, .. }`; failing to run at all is fatal.
    pub async fn check<I, S>(&self, argv: I) -> Result<Outcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stream = self.stream(argv);
        trace::line(&stream.to_string());
        let outcome = stream::capture(Source::from(stream), Vec::new(), true).await?;
        debug!(ok = outcome.ok, code = outcome.code, "Check finished");
        Ok(outcome)
    }

    /// Runs a command and captures its output. Any failure is fatal.
    pub async fn get<I, S>(&self, argv: I) -> Result<Outcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stream = self.stream(argv);
        trace::line(&stream.to_string());
        stream::capture(Source::from(stream), Vec::new(), false).await
    }
}
