//! # Pipeline Copy Engine (`stream::engine`)
//!
//! File: cli/src/stream/engine.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! [`copy`] moves bytes from a [`Source`] through zero or more [`Stage`]s into
//! a destination writer, the way `a | b | c > dst` does in a shell: every
//! stage consumes input as soon as its upstream produces it.
//!
//! ## Architecture
//!
//! A pipeline with `K` stages has `K + 1` legs:
//!
//! ```text
//! leg 0:  source   -> stage 1
//! leg 1:  stage 1  -> stage 2
//! ...
//! leg K:  stage K  -> destination
//! ```
//!
//! Each leg runs as its own Tokio task and:
//! 1. reads its source until end-of-stream, writing everything downstream;
//! 2. shuts down its destination, closing that stage's input exactly once;
//! 3. when it is the last leg, counts every byte the destination accepted.
//!
//! A `Stream` used directly as the source has its input closed before it is
//! read, so commands that read standard input see end-of-input at once.
//!
//! The first leg to fail wins: every other leg is aborted and awaited so
//! nothing keeps running in the background, and the failure comes back as a
//! [`CopyError`] naming the leg, the endpoint whose read, write or close
//! failed, and the bytes that reached the destination.
//!
//! One exception: a leg whose write hits a broken pipe into a process stage
//! means that process stopped reading, usually because it already exited.
//! The engine then waits for the next leg, the one draining that stage. If
//! the stage exited unsuccessfully, that exit failure is reported instead.
//! Otherwise the broken pipe stands.
//!
use super::process::{Invocation, Stream};
use crate::core::error::{CopyError, Error};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

const CHUNK_SIZE: usize = 8 * 1024;

type BoxRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// What a pipeline endpoint looks like in trace lines and error reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Label {
    Process(Invocation),
    Named(&'static str),
}

impl Label {
    const OPAQUE: Label = Label::Named("<stream>");

    fn invocation(&self) -> Option<&Invocation> {
        match self {
            Label::Process(invocation) => Some(invocation),
            Label::Named(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Process(invocation) => invocation.fmt(f),
            Label::Named(name) => f.write_str(name),
        }
    }
}

enum SourceIo {
    Stream(Stream),
    Reader(BoxRead),
}

/// The first endpoint of a pipeline: a process or any async reader.
pub struct Source {
    label: Label,
    io: SourceIo,
}

impl Source {
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            label: Label::OPAQUE,
            io: SourceIo::Reader(Box::new(reader)),
        }
    }

    /// A source yielding a fixed byte string.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::reader(io::Cursor::new(data.into()))
    }

    /// A source that is immediately exhausted.
    pub fn empty() -> Self {
        Self::reader(tokio::io::empty())
    }

    /// The process behind this source, when it is a `Stream`.
    pub fn invocation(&self) -> Option<&Invocation> {
        self.label.invocation()
    }
}

impl From<Stream> for Source {
    fn from(stream: Stream) -> Self {
        Self {
            label: Label::Process(stream.invocation().clone()),
            io: SourceIo::Stream(stream),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.label.fmt(f)
    }
}

/// An interior pipeline stage: written to by one leg, read by the next.
pub struct Stage {
    label: Label,
    reader: BoxRead,
    writer: BoxWrite,
}

impl Stage {
    /// Wraps anything readable and writable, e.g. an in-process transform.
    pub fn io<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::pair(reader, writer)
    }

    /// Builds a stage from separate halves: the upstream leg writes into
    /// `writer`, the downstream leg reads from `reader`.
    pub fn pair<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            label: Label::OPAQUE,
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// The process behind this stage, when it is a `Stream`.
    pub fn invocation(&self) -> Option<&Invocation> {
        self.label.invocation()
    }
}

impl From<Stream> for Stage {
    fn from(stream: Stream) -> Self {
        let label = Label::Process(stream.invocation().clone());
        let (reader, writer) = tokio::io::split(stream);
        Self {
            label,
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.label.fmt(f)
    }
}

/// A cloneable in-memory destination. Clones share the same bytes.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The contents as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsyncWrite for Buffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// # Copy Through A Pipeline (`copy`)
///
/// Streams `src` through every stage in order and into `dst`, one task per
/// leg. Returns the number of bytes `dst` accepted.
///
/// ## Errors
///
/// Returns the first leg failure as a [`CopyError`]. Process failures keep
/// their own variant (`Error::Start` / `Error::Exit`); any other I/O failure
/// becomes `Error::Engine` naming the endpoint involved.
pub async fn copy<W>(
    dst: W,
    src: impl Into<Source>,
    stages: Vec<Stage>,
) -> Result<u64, CopyError>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    copy_to(Label::OPAQUE, dst, src.into(), stages).await
}

/// One pipeline leg, ready to be spawned.
struct Leg {
    index: usize,
    src_label: Label,
    reader: LegReader,
    dst_label: Label,
    writer: BoxWrite,
    is_final: bool,
    total: Arc<AtomicU64>,
}

enum LegReader {
    Stream(Stream),
    Plain(BoxRead),
}

/// Why a leg stopped early.
struct LegFailure {
    copy: CopyError,
    /// The leg's destination is a process stage that stopped reading its
    /// input. That stage's own exit status decides the outcome.
    stage_closed: bool,
}

pub(crate) async fn copy_to<W>(
    dst_label: Label,
    dst: W,
    src: Source,
    stages: Vec<Stage>,
) -> Result<u64, CopyError>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let legs = stages.len() + 1;
    let total = Arc::new(AtomicU64::new(0));
    debug!(legs, "Starting pipeline from {}", src.label);

    let first = match src.io {
        SourceIo::Stream(stream) => LegReader::Stream(stream),
        SourceIo::Reader(reader) => LegReader::Plain(reader),
    };
    let mut readers = vec![(src.label, first)];
    let mut writers: Vec<(Label, BoxWrite)> = Vec::with_capacity(legs);
    for stage in stages {
        writers.push((stage.label.clone(), stage.writer));
        readers.push((stage.label, LegReader::Plain(stage.reader)));
    }
    writers.push((dst_label, Box::new(dst)));

    let mut tasks = JoinSet::new();
    for (index, ((src_label, reader), (dst_label, writer))) in
        readers.into_iter().zip(writers).enumerate()
    {
        tasks.spawn(run_leg(Leg {
            index,
            src_label,
            reader,
            dst_label,
            writer,
            is_final: index + 1 == legs,
            total: Arc::clone(&total),
        }));
    }

    // A leg that hit a closed process stage waits here until the leg reading
    // that stage's output reports, so `a | false` fails with `false`'s status.
    let mut held: Option<CopyError> = None;
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = match joined {
            Ok(report) => report,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!("Pipeline leg ended unexpectedly: {}", err);
                continue;
            }
        };
        match result {
            Ok(_) => {
                if held.as_ref().is_some_and(|first| first.leg + 1 == index) {
                    failure = held.take();
                    break;
                }
            }
            Err(LegFailure {
                copy,
                stage_closed: true,
            }) if held.is_none() => {
                debug!(
                    leg = copy.leg,
                    "{} stopped reading its input, waiting for its exit status", copy.endpoint
                );
                held = Some(copy);
            }
            Err(LegFailure { copy, .. }) => {
                failure = Some(match held.take() {
                    Some(first) if settles(&first, &copy) => copy,
                    Some(first) => first,
                    None => copy,
                });
                break;
            }
        }
    }

    let Some(mut err) = failure.or(held) else {
        let written = total.load(Ordering::SeqCst);
        debug!(written, "Pipeline finished");
        return Ok(written);
    };

    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    err.written = total.load(Ordering::SeqCst);
    warn!(
        leg = err.leg,
        written = err.written,
        cause = ?std::error::Error::source(&err.error),
        "Pipeline failed at {}: {}",
        err.endpoint,
        err.error
    );
    Err(err)
}

/// Whether `next` is the closed stage's own exit failure, reported by the
/// leg right after the one that found the stage closed.
fn settles(closed: &CopyError, next: &CopyError) -> bool {
    next.leg == closed.leg + 1 && matches!(next.error, Error::Exit { .. })
}

async fn run_leg(leg: Leg) -> (usize, Result<u64, LegFailure>) {
    let index = leg.index;
    (index, drain_leg(leg).await)
}

async fn drain_leg(leg: Leg) -> Result<u64, LegFailure> {
    let Leg {
        index,
        src_label,
        reader,
        dst_label,
        mut writer,
        is_final,
        total,
    } = leg;
    let read_fail = |err: io::Error| LegFailure {
        copy: leg_failure(index, &src_label, err, &total),
        stage_closed: false,
    };
    let write_fail = |err: io::Error| LegFailure {
        stage_closed: !is_final
            && err.kind() == io::ErrorKind::BrokenPipe
            && dst_label.invocation().is_some(),
        copy: leg_failure(index, &dst_label, err, &total),
    };

    let mut reader: BoxRead = match reader {
        LegReader::Stream(mut stream) => {
            stream.shutdown().await.map_err(read_fail)?;
            Box::new(stream)
        }
        LegReader::Plain(reader) => reader,
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut moved = 0u64;
    loop {
        let n = reader.read(&mut buf).await.map_err(read_fail)?;
        if n == 0 {
            break;
        }
        let mut chunk = &buf[..n];
        while !chunk.is_empty() {
            let accepted = writer.write(chunk).await.map_err(write_fail)?;
            if accepted == 0 {
                return Err(write_fail(io::ErrorKind::WriteZero.into()));
            }
            if is_final {
                total.fetch_add(accepted as u64, Ordering::SeqCst);
            }
            moved += accepted as u64;
            chunk = &chunk[accepted..];
        }
    }
    writer.shutdown().await.map_err(write_fail)?;
    trace!(leg = index, bytes = moved, "Leg {} -> {} drained", src_label, dst_label);
    Ok(moved)
}

fn leg_failure(leg: usize, endpoint: &Label, err: io::Error, total: &AtomicU64) -> CopyError {
    let error = Error::from_io(&err).unwrap_or_else(|| Error::engine(endpoint.to_string(), err));
    CopyError {
        leg,
        endpoint: endpoint.to_string(),
        written: total.load(Ordering::SeqCst),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::quote::quote;

    /// A writer that accepts a fixed number of bytes and then fails.
    struct FailingWriter {
        remaining: usize,
    }

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.remaining == 0 {
                return Poll::Ready(Err(io::Error::other("destination full")));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_zero_stages_is_one_leg() {
        let buffer = Buffer::new();
        let written = copy(buffer.clone(), Source::bytes("abc"), vec![])
            .await
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(buffer.text(), "abc");
    }

    #[tokio::test]
    async fn test_in_process_stage() {
        let (upstream, downstream) = tokio::io::duplex(16);
        let buffer = Buffer::new();
        let data = "x".repeat(100_000);
        let written = copy(
            buffer.clone(),
            Source::bytes(data.clone()),
            vec![Stage::pair(downstream, upstream)],
        )
        .await
        .unwrap();
        assert_eq!(written, 100_000);
        assert_eq!(buffer.text(), data);
    }

    #[tokio::test]
    async fn test_engine_failure_names_destination_and_counts_bytes() {
        let err = copy(
            FailingWriter { remaining: 5 },
            Source::bytes("0123456789"),
            vec![],
        )
        .await
        .unwrap_err();
        assert_eq!(err.leg, 0);
        assert_eq!(err.endpoint, "<stream>");
        assert_eq!(err.written, 5);
        assert!(matches!(err.error, Error::Engine { .. }));
    }

    #[test]
    fn test_labels() {
        let source = Source::from(Stream::new(["echo", "hi there"]));
        assert_eq!(source.to_string(), format!("echo {}", quote("hi there")));
        assert!(source.invocation().is_some());
        assert_eq!(Source::empty().to_string(), "<stream>");
        assert!(Source::empty().invocation().is_none());
    }
}
