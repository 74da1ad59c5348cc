//! # Captured Outcomes (`stream::outcome`)
//!
//! File: cli/src/stream/outcome.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! An [`Outcome`] is what a caller gets back when it asked for output or for
//! a verdict instead of an error: `Namespace::check`, `Namespace::get`,
//! `check_pipe` and `get_pipe`. Output is trimmed of surrounding newlines
//! only, so `echo`-style output compares cleanly while meaningful
//! whitespace survives.
//!
use super::process::Invocation;
use std::fmt;

/// What `check`, `get` and the capturing pipe modes hand back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether everything ran and exited successfully.
    pub ok: bool,
    /// Captured output with leading and trailing newlines removed.
    pub output: String,
    /// Exit code of the failed process; 0 when `ok` (or when unknown).
    pub code: i32,
    /// The process the outcome is about: the terminal stage on success, the
    /// failed process otherwise. `None` when that endpoint was not a process.
    pub invocation: Option<Invocation>,
}

impl Outcome {
    pub(crate) fn success(raw: &str, invocation: Option<Invocation>) -> Self {
        Self {
            ok: true,
            output: trim_output(raw),
            code: 0,
            invocation,
        }
    }

    pub(crate) fn failure(raw: &str, code: i32, invocation: Option<Invocation>) -> Self {
        Self {
            ok: false,
            output: trim_output(raw),
            code,
            invocation,
        }
    }
}

fn trim_output(raw: &str) -> String {
    raw.trim_matches('\n').to_string()
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_trimmed_of_newlines_only() {
        let outcome = Outcome::success("\n  hello \n\n", None);
        assert_eq!(outcome.output, "  hello ");
        assert!(outcome.ok);
        assert_eq!(outcome.code, 0);
    }

    #[test]
    fn test_failure_keeps_code_and_invocation() {
        let invocation = Invocation::new(["false"]);
        let outcome = Outcome::failure("", 1, Some(invocation.clone()));
        assert!(!outcome.ok);
        assert_eq!(outcome.code, 1);
        assert_eq!(outcome.invocation, Some(invocation));
        assert_eq!(outcome.to_string(), "");
    }
}
