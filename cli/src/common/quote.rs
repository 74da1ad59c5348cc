//! # Pipewright Shell Quoting (`common::quote`)
//!
//! File: cli/src/common/quote.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Renders argument vectors the way a POSIX shell would need to see them, so
//! trace lines can be copied into a terminal and replayed. Quoting is only
//! ever used for display: processes are always spawned with the raw argv.
//!
//! The quoting itself is `shell_quote`'s `Sh` dialect: inert words are printed
//! as-is, everything else is escaped so that `sh` reads back the exact bytes.
//! The empty string renders as `''`.
//!
use shell_quote::{QuoteRefExt, Sh};

/// Quotes a single argument for display.
pub fn quote(arg: &str) -> String {
    let bytes: Vec<u8> = arg.quoted(Sh);
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Quotes every argument and joins them with single spaces.
pub fn join<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| quote(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    /// What `sh` prints for `printf FORMAT <rendered>`.
    fn replay(format: &str, rendered: &str) -> String {
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("printf '{format}' {rendered}"))
            .output()
            .unwrap();
        assert!(output.status.success(), "sh rejected: {rendered}");
        String::from_utf8(output.stdout).unwrap()
    }

    #[test]
    fn test_inert_arguments_are_untouched() {
        assert_eq!(quote("echo"), "echo");
        assert_eq!(quote("--flag"), "--flag");
        assert_eq!(quote("./path/to/file_1.txt"), "./path/to/file_1.txt");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_special_arguments_are_escaped() {
        for arg in ["hello world", "$HOME", "it's", "a\"b", "back\\slash", "*?[x]", "a;b|c&d"] {
            assert_ne!(quote(arg), arg, "{arg} should be escaped");
        }
    }

    #[test]
    fn test_sh_reads_back_the_exact_argument() {
        for arg in [
            "hello world",
            "$HOME",
            "it's",
            "a\"b",
            "back\\slash",
            "*?[x]",
            "a;b|c&d",
            "ünïcödé",
            "",
        ] {
            assert_eq!(replay("%s", &quote(arg)), arg);
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join::<&str>(&[]), "");
        assert_eq!(join(&["ls", "-l"]), "ls -l");
        let rendered = join(&["exit 3", "", "it's"]);
        assert_eq!(replay("[%s]", &rendered), "[exit 3][][it's]");
    }
}
