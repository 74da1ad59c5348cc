//! # Pipewright Main Entry Point
//!
//! File: cli/src/main.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This file is the entry point for the `pipewright` binary, a thin front end
//! over the library's execution modes. It handles:
//! - Command-line argument parsing using Clap
//! - Setting up logging based on verbosity flags
//! - Loading configuration and building the `Namespace` commands run under
//! - Routing to the `run` / `check` / `get` handlers
//! - Rendering failures (with captured diagnostics) and choosing the exit status
//!
//! ## Architecture
//!
//! The binary is deliberately thin; all behavior lives in the library:
//! - Each subcommand (`run`, `check`, `get`) is a variant of the `Commands` enum
//! - Variants map to `handle_*` functions in `commands/`, which call the
//!   matching `Namespace` method or pipe mode
//! - Every error propagates back here and is rendered once by
//!   `core::error::report`
//!
//! ## Examples
//!
//! ```bash
//! pipewright get -- git rev-parse HEAD
//! pipewright -e RUST_LOG=debug run -- cargo test
//! pipewright check -- sh -c 'test -f Cargo.lock'
//! pipewright -q get -- printf 'b\na\n' '|' sort
//! ```
//!
//! Command processing flow:
//! 1. Parse command-line args via Clap
//! 2. Configure logging based on verbosity level
//! 3. Load configuration, silence tracing if asked, build the `Namespace`
//! 4. Route to the subcommand handler
//! 5. Report any error and exit with 1, or with the code `check` returned
//!
use clap::Parser;
use pipewright::common::trace::{self, TraceSink};
use pipewright::core::{config, error};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "pipewright",
    about = "Run commands and shell-style pipelines without a shell",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Do not print `+ ...` trace lines.
    #[arg(short, long, global = true, env = "PIPEWRIGHT_QUIET")]
    quiet: bool,
    /// Environment override for every command (repeatable).
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair, global = true)]
    env: Vec<(String, String)>,
}

/// Enum defining all available top-level commands.
#[derive(Parser, Debug)]
enum Commands {
    /// Run attached to the terminal; fail on any error.
    #[command(alias = "r")]
    Run(commands::run::RunArgs),
    /// Run silently; exit with the command's exit code.
    #[command(alias = "c")]
    Check(commands::check::CheckArgs),
    /// Capture and print the trimmed output; fail on any error.
    #[command(alias = "g")]
    Get(commands::get::GetArgs),
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Command execution failed: {:?}", e);
            if let Err(io_err) = error::report(&e, &mut std::io::stderr().lock()) {
                tracing::error!("Failed to report error: {}", io_err);
            }
            1
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> error::Result<i32> {
    let cfg = config::load_config()?;
    if cli.quiet || !cfg.trace_enabled() {
        trace::set_sink(TraceSink::Discard);
    }
    let ns = cfg.namespace().with_env(cli.env);

    match cli.command {
        Commands::Run(args) => commands::run::handle_run(args, &ns).await.map(|()| 0),
        Commands::Check(args) => commands::check::handle_check(args, &ns).await,
        Commands::Get(args) => commands::get::handle_get(args, &ns).await.map(|()| 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
        assert_eq!(parse_env_pair("EMPTY="), Ok(("EMPTY".to_string(), String::new())));
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_pipeline_with_flags() {
        let cli = Cli::try_parse_from([
            "pipewright", "-q", "-e", "K=V", "get", "--", "printf", "-x", "|", "sort",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.env, vec![("K".to_string(), "V".to_string())]);
        match cli.command {
            Commands::Get(args) => assert_eq!(args.pipeline.stages().unwrap().len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
