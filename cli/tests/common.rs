//! # Pipewright Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Shared helpers for the integration test crates in `cli/tests/`. Each `.rs`
//! file there is compiled as its own test crate; the ones that drive the
//! binary declare `mod common;` to reach [`pipewright_cmd`].
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use tempfile::TempDir;

/// # Get Pipewright Command (`pipewright_cmd`)
///
/// An `assert_cmd::Command` for the compiled `pipewright` binary, isolated
/// from the developer's own configuration: it runs inside `sandbox` (which
/// contains a `.git` directory so the project search stops there) and points
/// the user config directory into it as well.
///
/// ## Panics
/// Panics if the `pipewright` binary cannot be found via `Command::cargo_bin`.
pub fn pipewright_cmd(sandbox: &TempDir) -> Command {
    let mut cmd =
        Command::cargo_bin("pipewright").expect("Failed to find pipewright binary for testing");
    cmd.current_dir(sandbox.path())
        .env("XDG_CONFIG_HOME", sandbox.path().join("xdg"))
        .env_remove("RUST_LOG");
    cmd
}

/// A fresh working directory for one test, marked as a repository root.
pub fn sandbox() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join(".git")).expect("Failed to create .git marker");
    dir
}
