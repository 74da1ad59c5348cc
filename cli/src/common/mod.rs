//! # Pipewright Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Small cross-cutting helpers used by the stream engine and the namespace
//! layer. Neither affects how processes run; both only shape what the user
//! sees about them.
//!
//! - **`quote`**: POSIX shell quoting of argument vectors, for display only.
//! - **`trace`**: the process-wide sink receiving one `+ ...` line per invocation.
//!

/// Shell-safe rendering of arguments for trace lines.
pub mod quote;
/// Global, redirectable destination for invocation trace lines.
pub mod trace;
