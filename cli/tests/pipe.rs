//! # Pipeline Integration Tests
//!
//! File: cli/tests/pipe.rs
//! Author: Christi Mahu
//!
//! Runs real multi-process pipelines through `copy` and the pipe modes:
//! ordering, in-process stages, byte accounting when a stage changes the
//! size of the data, fail-fast cancellation, and exit code recovery.
//!

use pipewright::common::quote::quote;
use pipewright::core::error::find;
use pipewright::{
    check_pipe, copy, get_pipe, Buffer, CopyError, Error, Invocation, Source, Stage, Stream,
};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_get_pipe_sorts_bytes() {
    let outcome = get_pipe(
        Source::bytes("b\na\nc\n"),
        vec![Stage::from(Stream::new(["sort"]))],
    )
    .await
    .unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.output, "a\nb\nc");
    assert_eq!(
        outcome.invocation.map(|inv| inv.to_string()),
        Some("sort".to_string())
    );
}

#[tokio::test]
async fn test_get_pipe_zero_stages_tags_source() {
    let outcome = get_pipe(Stream::new(["echo", "solo"]), Vec::new())
        .await
        .unwrap();
    assert_eq!(outcome.output, "solo");
    assert_eq!(
        outcome.invocation.map(|inv| inv.to_string()),
        Some("echo solo".to_string())
    );
}

#[tokio::test]
async fn test_in_process_identity_stage_between_processes() {
    let (upstream, downstream) = tokio::io::duplex(64);
    let outcome = get_pipe(
        Stream::new(["printf", "one\ntwo\n"]),
        vec![
            Stage::pair(downstream, upstream),
            Stage::from(Stream::new(["cat"])),
        ],
    )
    .await
    .unwrap();
    assert_eq!(outcome.output, "one\ntwo");
}

#[tokio::test]
async fn test_count_matches_destination_when_stage_resizes() {
    let buffer = Buffer::new();
    let written = copy(
        buffer.clone(),
        Source::bytes("abcabc\n"),
        vec![Stage::from(Stream::new(["sed", "s/a/aaa/g"]))],
    )
    .await
    .unwrap();
    assert_eq!(buffer.text(), "aaabcaaabc\n");
    assert_eq!(written, buffer.len() as u64);
}

#[tokio::test]
async fn test_large_transfer_through_two_processes() {
    let data = "0123456789abcdef\n".repeat(32 * 1024);
    let buffer = Buffer::new();
    let written = copy(
        buffer.clone(),
        Source::bytes(data.clone()),
        vec![
            Stage::from(Stream::new(["cat"])),
            Stage::from(Stream::new(["cat"])),
        ],
    )
    .await
    .unwrap();
    assert_eq!(written, data.len() as u64);
    assert_eq!(buffer.contents(), data.into_bytes());
}

#[tokio::test]
async fn test_first_failure_cancels_remaining_legs() {
    let started = Instant::now();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        get_pipe(
            Stream::new(["sh", "-c", "exit 4"]),
            vec![Stage::from(Stream::new(["sleep", "10"]).kill_on_drop(true))],
        ),
    )
    .await
    .expect("pipeline should not wait for the sleeping stage");

    let err = result.unwrap_err();
    assert_eq!(find(&err).and_then(Error::code), Some(4));
    assert_eq!(err.downcast_ref::<CopyError>().map(|copy| copy.leg), Some(0));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_copy_error_names_leg_and_endpoint() {
    let err = copy(
        Buffer::new(),
        Source::bytes("data"),
        vec![Stage::from(Stream::new(["sh", "-c", "cat; exit 6"]))],
    )
    .await
    .unwrap_err();
    assert_eq!(err.leg, 1);
    assert_eq!(err.endpoint, format!("sh -c {}", quote("cat; exit 6")));
    assert_eq!(err.error.code(), Some(6));
}

#[tokio::test]
async fn test_check_pipe_recovers_nonzero_exit() {
    let outcome = check_pipe(
        Source::bytes("x\n"),
        vec![
            Stage::from(Stream::new(["cat"])),
            Stage::from(Stream::new(["sh", "-c", "cat >/dev/null; exit 3"])),
        ],
    )
    .await
    .unwrap();
    assert!(!outcome.ok);
    assert_eq!(outcome.code, 3);
    assert_eq!(
        outcome.invocation,
        Some(Invocation::new(["sh", "-c", "cat >/dev/null; exit 3"]))
    );

    let outcome = check_pipe(Source::bytes("x\n"), vec![Stage::from(Stream::new(["cat"]))])
        .await
        .unwrap();
    assert!(outcome.ok);
}

#[tokio::test]
async fn test_check_pipe_start_failure_is_fatal() {
    let err = check_pipe(
        Source::bytes("x\n"),
        vec![Stage::from(Stream::new(["nonexistent-binary-xyz"]))],
    )
    .await
    .unwrap_err();
    assert!(matches!(find(&err), Some(Error::Start { .. })));
}

#[tokio::test]
async fn test_check_pipe_reports_exit_of_stage_that_ignores_input() {
    // Far more than a pipe buffer, so the writer always finds the stage gone.
    for _ in 0..10 {
        let outcome = check_pipe(
            Source::bytes(vec![b'x'; 1 << 20]),
            vec![Stage::from(Stream::new(["sh", "-c", "exit 3"]))],
        )
        .await
        .unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.code, 3);
        assert_eq!(outcome.invocation, Some(Invocation::new(["sh", "-c", "exit 3"])));
    }
}

#[tokio::test]
async fn test_get_pipe_fails_with_exit_of_stage_that_ignores_input() {
    let err = get_pipe(
        Source::bytes(vec![b'x'; 1 << 20]),
        vec![
            Stage::from(Stream::new(["sh", "-c", "exit 5"])),
            Stage::from(Stream::new(["cat"])),
        ],
    )
    .await
    .unwrap_err();
    assert_eq!(find(&err).and_then(Error::code), Some(5));
    assert_eq!(err.downcast_ref::<CopyError>().map(|copy| copy.leg), Some(1));
}

#[tokio::test]
async fn test_broken_pipe_stands_when_stage_exits_cleanly() {
    let err = copy(
        Buffer::new(),
        Source::bytes(vec![b'x'; 1 << 20]),
        vec![Stage::from(Stream::new(["true"]))],
    )
    .await
    .unwrap_err();
    assert_eq!(err.leg, 0);
    assert_eq!(err.endpoint, "true");
    assert_eq!(err.written, 0);
    assert!(matches!(err.error, Error::Engine { .. }));
}
