//! # Pipewright Run Command
//!
//! File: cli/src/commands/run.rs
//! Author: Christi Mahu
//!
//! `pipewright run -- ARGV... ['|' ARGV...]...`
//!
//! A single command runs attached to the terminal (all three standard
//! channels inherited). A pipeline streams its final output to stdout.
//!
use super::{build_pipeline, PipelineArgs};
use clap::Args;
use pipewright::core::error::Result;
use pipewright::{run_pipe, Namespace};
use tracing::debug;

/// Arguments for `pipewright run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// # Handle Run Command (`handle_run`)
///
/// Runs the command or pipeline; any failure propagates to `main`.
pub async fn handle_run(args: RunArgs, ns: &Namespace) -> Result<()> {
    let mut stages = args.pipeline.stages()?;
    if stages.len() == 1 {
        return ns.run(stages.remove(0)).await;
    }
    let (source, rest) = build_pipeline(ns, stages);
    let written = run_pipe(source, rest).await?;
    debug!(written, "Pipeline output written to stdout");
    Ok(())
}
