//! # Pipewright Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Foundational pieces shared by the engine and the binary:
//! - `error`: the Start/Exit/Engine failure taxonomy, the copy-engine error,
//!   and `report`, the top-level renderer used before converting a failure
//!   into a process exit status.
//! - `config`: loading, merging and validating `.pipewright.toml` files.
//!
pub mod config;
pub mod error;
