//! # Pipewright Commands Module
//!
//! File: cli/src/commands/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The binary's three subcommands mirror the library's execution modes:
//!
//! - `run`: output goes to the terminal, any failure is an error.
//! - `check`: output is discarded; a nonzero exit is reported and becomes the
//!   binary's own exit status instead of an error.
//! - `get`: output is captured, trimmed, and printed.
//!
//! Every subcommand takes a pipeline: argv words with literal `|` arguments
//! separating stages (quote the bar so the shell passes it through):
//!
//! ```bash
//! pipewright get -- printf 'b\na\n' '|' sort
//! ```
//!
//! A single stage runs through the matching `Namespace` method; longer chains
//! run through the pipe modes with the first stage's process as the source.
//!
use anyhow::bail;
use clap::Args;
use pipewright::core::error::Result;
use pipewright::{Namespace, Source, Stage};

pub mod check;
pub mod get;
pub mod run;

/// The separator word between pipeline stages.
pub const STAGE_SEPARATOR: &str = "|";

/// # Pipeline Arguments (`PipelineArgs`)
///
/// Shared by every subcommand: the argv words of one or more stages.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Command to run. Separate pipeline stages with a quoted '|'.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub argv: Vec<String>,
}

impl PipelineArgs {
    /// Splits the argv words into stages, rejecting empty ones.
    pub fn stages(&self) -> Result<Vec<Vec<String>>> {
        let stages: Vec<Vec<String>> = self
            .argv
            .split(|word| word == STAGE_SEPARATOR)
            .map(<[String]>::to_vec)
            .collect();
        if stages.iter().any(Vec::is_empty) {
            bail!("Empty pipeline stage: every '{STAGE_SEPARATOR}' must have a command on both sides");
        }
        Ok(stages)
    }
}

/// Turns stages after the first into pipeline stages under `ns`. The first
/// stage becomes the source so an empty standard input is never read.
pub fn build_pipeline(ns: &Namespace, stages: Vec<Vec<String>>) -> (Source, Vec<Stage>) {
    let mut stages = stages.into_iter();
    let source = match stages.next() {
        Some(first) => Source::from(ns.stream(first)),
        None => Source::empty(),
    };
    let rest = stages.map(|argv| Stage::from(ns.stream(argv))).collect();
    (source, rest)
}
