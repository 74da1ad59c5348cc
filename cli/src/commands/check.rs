//! # Pipewright Check Command
//!
//! File: cli/src/commands/check.rs
//! Author: Christi Mahu
//!
//! `pipewright check -- ARGV... ['|' ARGV...]...`
//!
//! Probes whether a command (or pipeline) succeeds. Output is not shown.
//! A nonzero exit is not an error: it is reported on stderr and returned so
//! `main` can exit with the same code. Failing to run at all is an error.
//!
use super::{build_pipeline, PipelineArgs};
use clap::Args;
use pipewright::core::error::Result;
use pipewright::{check_pipe, Namespace};

/// Arguments for `pipewright check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// # Handle Check Command (`handle_check`)
///
/// Returns the exit code to terminate with: 0 on success, otherwise the
/// code of the process that failed.
pub async fn handle_check(args: CheckArgs, ns: &Namespace) -> Result<i32> {
    let mut stages = args.pipeline.stages()?;
    let outcome = if stages.len() == 1 {
        ns.check(stages.remove(0)).await?
    } else {
        let (source, rest) = build_pipeline(ns, stages);
        check_pipe(source, rest).await?
    };
    if !outcome.ok {
        match &outcome.invocation {
            Some(invocation) => eprintln!("`{}`: exit code {}", invocation, outcome.code),
            None => eprintln!("exit code {}", outcome.code),
        }
    }
    Ok(outcome.code)
}
