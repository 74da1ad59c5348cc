//! # Pipewright Get Command
//!
//! File: cli/src/commands/get.rs
//! Author: Christi Mahu
//!
//! `pipewright get -- ARGV... ['|' ARGV...]...`
//!
//! Captures the output, trims surrounding newlines, and prints it followed by
//! a single newline (nothing at all when the output is empty).
//!
use super::{build_pipeline, PipelineArgs};
use clap::Args;
use pipewright::core::error::Result;
use pipewright::{get_pipe, Namespace};

/// Arguments for `pipewright get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// # Handle Get Command (`handle_get`)
pub async fn handle_get(args: GetArgs, ns: &Namespace) -> Result<()> {
    let mut stages = args.pipeline.stages()?;
    let outcome = if stages.len() == 1 {
        ns.get(stages.remove(0)).await?
    } else {
        let (source, rest) = build_pipeline(ns, stages);
        get_pipe(source, rest).await?
    };
    if !outcome.output.is_empty() {
        println!("{}", outcome.output);
    }
    Ok(())
}
