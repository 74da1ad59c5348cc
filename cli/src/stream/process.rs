//! # Process Streams (`stream::process`)
//!
//! File: cli/src/stream/process.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! A [`Stream`] is one external process presented as a single bidirectional
//! byte stream: writing feeds its standard input, reading drains its standard
//! output, and shutting down the write side closes its standard input.
//!
//! ## Lifecycle
//!
//! - **Deferred start.** Building a `Stream` never spawns anything and never
//!   fails. The process starts on the first read, write or shutdown, so a
//!   stream can be wired into a pipeline before any process exists. A failed
//!   start is remembered and returned by every later call.
//! - **Await once.** The first end-of-output (or read error) moves the stream
//!   into its await phase exactly once: the diagnostic channel is drained,
//!   the process is waited on, and an unsuccessful exit becomes an
//!   `Error::Exit` carrying the exit code and the drained text. Reads after
//!   that report end-of-stream.
//! - **Cancellation.** With a [`CancelSignal`] attached, every read races the
//!   signal. A fired signal turns the read into an immediate end-of-stream
//!   and skips the await phase; the process itself is left alone unless the
//!   stream was built with `kill_on_drop(true)` and is then dropped.
//!
//! ## Wiring
//!
//! Each standard channel is either piped (the default) or inherited from the
//! current process. Writes to a stream whose input is inherited are silently
//! discarded; reads from a stream whose output is inherited go straight to the
//! await phase, which is how `Namespace::run` waits for a visible command.
//!
//! Standard error, when piped, is drained by a background task from the
//! moment the process starts so a chatty process cannot fill the pipe and
//! stall its own output.
//!
use super::cancel::CancelSignal;
use crate::common::quote;
use crate::core::error::Error;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// The identity of a process invocation: its argument vector plus the
/// environment overrides layered over the ambient environment.
///
/// Renders as `KEY=value ... argv`, with overrides sorted by name and
/// everything shell-quoted, which is exactly what trace lines print.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    argv: Vec<String>,
    env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Environment overrides, sorted by name.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, quote::quote(value))?;
        }
        f.write_str(&quote::join(&self.argv))
    }
}

/// How one standard channel of the child is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wiring {
    Piped,
    Inherited,
}

impl Wiring {
    fn stdio(self) -> Stdio {
        match self {
            Wiring::Piped => Stdio::piped(),
            Wiring::Inherited => Stdio::inherit(),
        }
    }
}

/// One-shot start guard.
enum Start {
    Pending,
    Started,
    Failed(Error),
}

type ExitFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;

/// One-shot await guard, separate from [`Start`].
enum Finish {
    Pending,
    Awaiting {
        exit: ExitFuture,
        read_error: Option<io::Error>,
    },
    Done,
}

/// An external process wrapped as an `AsyncRead + AsyncWrite` byte stream.
///
/// See the module documentation for the start, await and cancellation rules.
pub struct Stream {
    invocation: Invocation,
    stdin_wiring: Wiring,
    stdout_wiring: Wiring,
    stderr_wiring: Wiring,
    kill_on_drop: bool,
    cancelled: Option<Pin<Box<dyn Future<Output = ()> + Send>>>,

    start: Start,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    finish: Finish,
}

impl Stream {
    /// Describes a process to run. `argv[0]` is looked up on `PATH`; nothing
    /// is spawned until the stream is first used.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            invocation: Invocation::new(argv),
            stdin_wiring: Wiring::Piped,
            stdout_wiring: Wiring::Piped,
            stderr_wiring: Wiring::Piped,
            kill_on_drop: false,
            cancelled: None,
            start: Start::Pending,
            child: None,
            stdin: None,
            stdout: None,
            stderr: None,
            finish: Finish::Pending,
        }
    }

    /// Adds environment overrides on top of the ambient environment. Later
    /// values win over earlier ones for the same name.
    pub fn with_env<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.invocation
            .env
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Races every read against `signal`.
    pub fn with_cancel(mut self, signal: &CancelSignal) -> Self {
        self.cancelled = Some(Box::pin(signal.cancelled()));
        self
    }

    /// Kills the process if the stream is dropped before it exits.
    pub fn kill_on_drop(mut self, kill: bool) -> Self {
        self.kill_on_drop = kill;
        self
    }

    pub fn inherit_stdin(mut self) -> Self {
        self.stdin_wiring = Wiring::Inherited;
        self
    }

    pub fn inherit_stdout(mut self) -> Self {
        self.stdout_wiring = Wiring::Inherited;
        self
    }

    pub fn inherit_stderr(mut self) -> Self {
        self.stderr_wiring = Wiring::Inherited;
        self
    }

    /// Connects all three standard channels to the current process's own.
    pub fn inherit_stdio(self) -> Self {
        self.inherit_stdin().inherit_stdout().inherit_stderr()
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    fn ensure_started(&mut self) -> io::Result<()> {
        match self.start {
            Start::Started => return Ok(()),
            Start::Failed(ref err) => return Err(err.clone().into_io()),
            Start::Pending => {}
        }
        match self.spawn() {
            Ok(()) => {
                self.start = Start::Started;
                Ok(())
            }
            Err(err) => {
                warn!(cause = ?std::error::Error::source(&err), "{}", err);
                self.start = Start::Failed(err.clone());
                Err(err.into_io())
            }
        }
    }

    fn spawn(&mut self) -> Result<(), Error> {
        let Some((program, args)) = self.invocation.argv.split_first() else {
            return Err(Error::start(
                &self.invocation,
                io::Error::new(io::ErrorKind::InvalidInput, "no command given"),
            ));
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .envs(&self.invocation.env)
            .stdin(self.stdin_wiring.stdio())
            .stdout(self.stdout_wiring.stdio())
            .stderr(self.stderr_wiring.stdio())
            .kill_on_drop(self.kill_on_drop);

        let mut child = command
            .spawn()
            .map_err(|err| Error::start(&self.invocation, err))?;
        debug!(pid = ?child.id(), "Started `{}`", self.invocation);

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut log = Vec::new();
                if let Err(err) = stderr.read_to_end(&mut log).await {
                    warn!("Failed to drain diagnostic output: {}", err);
                }
                log
            })
        });
        self.child = Some(child);
        Ok(())
    }

    fn poll_cancelled(&mut self, cx: &mut Context<'_>) -> bool {
        let Some(cancelled) = self.cancelled.as_mut() else {
            return false;
        };
        if cancelled.as_mut().poll(cx).is_pending() {
            return false;
        }
        self.cancelled = None;
        true
    }

    fn begin_finish(&mut self, read_error: Option<io::Error>) {
        self.stdout = None;
        let exit = wait_for_exit(self.invocation.clone(), self.child.take(), self.stderr.take());
        self.finish = Finish::Awaiting {
            exit: Box::pin(exit),
            read_error,
        };
    }

    fn poll_finish(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let Finish::Awaiting { exit, read_error } = &mut self.finish else {
            return Poll::Ready(Ok(()));
        };
        let result = ready!(exit.as_mut().poll(cx));
        let read_error = read_error.take();
        self.finish = Finish::Done;
        match (result, read_error) {
            (Err(err), _) => Poll::Ready(Err(err.into_io())),
            (Ok(()), Some(err)) => Poll::Ready(Err(err)),
            (Ok(()), None) => Poll::Ready(Ok(())),
        }
    }
}

async fn wait_for_exit(
    invocation: Invocation,
    child: Option<Child>,
    stderr: Option<JoinHandle<Vec<u8>>>,
) -> Result<(), Error> {
    let log = match stderr {
        Some(drain) => drain.await.unwrap_or_else(|err| {
            warn!("Diagnostic drain for `{}` failed: {}", invocation, err);
            Vec::new()
        }),
        None => Vec::new(),
    };
    let Some(mut child) = child else {
        return Ok(());
    };
    let status = child
        .wait()
        .await
        .map_err(|err| Error::engine(invocation.to_string(), err))?;
    debug!("`{}` finished: {}", invocation, status);
    if status.success() {
        return Ok(());
    }
    Err(Error::Exit {
        code: status.code(),
        signal: exit_signal(&status),
        log: String::from_utf8_lossy(&log)
            .trim_end_matches('\n')
            .to_string(),
        invocation,
    })
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.ensure_started()?;
        if matches!(this.finish, Finish::Done) {
            return Poll::Ready(Ok(()));
        }
        if this.poll_cancelled(cx) {
            debug!("Read of `{}` cancelled", this.invocation);
            this.stdout = None;
            this.finish = Finish::Done;
            return Poll::Ready(Ok(()));
        }
        if matches!(this.finish, Finish::Pending) {
            let read_error = match this.stdout.as_mut() {
                Some(_) if buf.remaining() == 0 => return Poll::Ready(Ok(())),
                Some(stdout) => {
                    let before = buf.filled().len();
                    match ready!(Pin::new(stdout).poll_read(cx, buf)) {
                        Ok(()) if buf.filled().len() > before => return Poll::Ready(Ok(())),
                        Ok(()) => None,
                        Err(err) => Some(err),
                    }
                }
                None => None,
            };
            trace!("Output of `{}` ended", this.invocation);
            this.begin_finish(read_error);
        }
        this.poll_finish(cx)
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.ensure_started()?;
        match this.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_write(cx, buf),
            // Input is not ours to feed: accept and drop.
            None => Poll::Ready(Ok(buf.len())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.ensure_started()?;
        if let Some(stdin) = this.stdin.as_mut() {
            ready!(Pin::new(stdin).poll_shutdown(cx))?;
            trace!("Closed input of `{}`", this.invocation);
        }
        this.stdin = None;
        Poll::Ready(Ok(()))
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.invocation.fmt(f)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = match self.start {
            Start::Pending => "pending",
            Start::Started => "started",
            Start::Failed(_) => "failed",
        };
        let finish = match self.finish {
            Finish::Pending => "pending",
            Finish::Awaiting { .. } => "awaiting",
            Finish::Done => "done",
        };
        f.debug_struct("Stream")
            .field("invocation", &self.invocation)
            .field("start", &start)
            .field("finish", &finish)
            .finish()
    }
}
