//! Response capture.
//!
//! [`Capture`] sits between a handler's output and the real response writer.
//! Every byte goes to both, so once the handler is done the access log can
//! render exactly what was sent.

use std::io::{self, Write};

/// A [`Write`] decorator that mirrors everything written through it into an
/// in-memory buffer.
///
/// Bytes are mirrored first, then forwarded. The return value is always the
/// underlying writer's, so its errors and short writes reach the caller
/// untouched. Only the bytes the inner writer accepted stay mirrored.
///
/// The mirror grows with the response. Pass a limit to [`Capture::with_limit`]
/// to stop mirroring after a number of bytes; forwarding is never limited.
#[derive(Debug)]
pub struct Capture<W> {
    inner: W,
    captured: Vec<u8>,
    limit: Option<usize>,
}

impl<W: Write> Capture<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, captured: Vec::new(), limit: None }
    }

    /// Mirror at most `limit` bytes (`None` = unbounded).
    pub fn with_limit(inner: W, limit: Option<usize>) -> Self {
        Self { inner, captured: Vec::new(), limit }
    }

    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Splits into the inner writer and the mirrored bytes.
    pub fn into_parts(self) -> (W, Vec<u8>) {
        (self.inner, self.captured)
    }

    fn room(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.captured.len()),
            None => usize::MAX,
        }
    }
}

impl<W: Write> Write for Capture<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mark = self.captured.len();
        let mirrored = buf.len().min(self.room());
        self.captured.extend_from_slice(&buf[..mirrored]);

        match self.inner.write(buf) {
            Ok(n) => {
                self.captured.truncate(mark + n.min(mirrored));
                Ok(n)
            }
            Err(e) => {
                self.captured.truncate(mark);
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
