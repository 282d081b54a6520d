//! Line-oriented writers for stdout results and stderr markers.
//!
//! Each line is written in full under a mutex, so concurrent emitters never
//! interleave partial lines. Writes retry on `WouldBlock`, which keeps output
//! intact even if the controller left the descriptor in non-blocking mode.

use std::io::{self, ErrorKind, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Back-off between retries when the descriptor is not ready.
const RETRY_DELAY: Duration = Duration::from_millis(1);

/// A writer that emits whole lines and flushes after each one.
pub struct LineWriter<W> {
    inner: Mutex<W>,
}

impl<W: Write> LineWriter<W> {
    pub const fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Write `line` plus a newline, then flush.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        write_all_blocking(&mut *inner, &buf)?;
        flush_blocking(&mut *inner)
    }

    /// Serialize `value` as compact JSON on one line.
    pub fn emit<T: Serialize>(&self, value: &T) -> io::Result<()> {
        let line = serde_json::to_string(value)?;
        self.write_line(&line)
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_all_blocking<W: Write + ?Sized>(writer: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match writer.write(buf) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::sleep(RETRY_DELAY),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn flush_blocking<W: Write + ?Sized>(writer: &mut W) -> io::Result<()> {
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::sleep(RETRY_DELAY),
            Err(e) => return Err(e),
        }
    }
}
