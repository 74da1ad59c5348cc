//! # Trace Line Integration Test
//!
//! File: cli/tests/trace.rs
//! Author: Christi Mahu
//!
//! The trace sink is process-wide, so everything touching it lives in one
//! test in its own test crate.
//!

use pipewright::common::quote::quote;
use pipewright::common::trace::{self, TraceSink};
use pipewright::{get_pipe, Namespace, Source, Stage};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedLines(Arc<Mutex<Vec<u8>>>);

impl SharedLines {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedLines {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_trace_lines() {
    let lines = SharedLines::default();
    let previous = trace::set_sink(TraceSink::Writer(Box::new(lines.clone())));

    let ns = Namespace::new().with_env([("A", "1")]);
    ns.get(["echo", "hi there"]).await.unwrap();
    get_pipe(
        Source::bytes("x"),
        vec![Stage::from(ns.stream(["cat"])), Stage::from(ns.stream(["wc", "-c"]))],
    )
    .await
    .unwrap();

    trace::set_sink(TraceSink::Discard);
    ns.get(["true"]).await.unwrap();
    trace::set_sink(previous);

    assert_eq!(
        lines.text(),
        format!(
            "+ A=1 echo {}\n+ <stream> | A=1 cat | A=1 wc -c\n",
            quote("hi there")
        )
    );
}
