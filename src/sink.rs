//! Output sinks for rendered log lines.

use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Where rendered access-log lines go.
///
/// A `Sink` is a cheap, cloneable handle around any [`Write`]. Each
/// [`write`](Sink::write) holds the sink lock for the whole line and flushes
/// before releasing it, so lines from concurrent requests never interleave.
///
/// The color flag decides whether the `status` tag is rendered with ANSI
/// color codes. It is a property of the destination, not of the format.
#[derive(Clone)]
pub struct Sink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    color: bool,
}

impl Sink {
    /// A colorless sink over any writer (file, socket, in-memory buffer).
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self { writer: Arc::new(Mutex::new(Box::new(writer))), color: false }
    }

    /// Standard output. Colored when `colored` would colorize stdout: a
    /// terminal, honoring `NO_COLOR`, `CLICOLOR` and `CLICOLOR_FORCE`.
    pub fn stdout() -> Self {
        let color = colored::control::SHOULD_COLORIZE.should_colorize();
        Self::new(io::stdout()).with_color(color)
    }

    /// Standard error. Colored when it is a terminal.
    pub fn stderr() -> Self {
        let color = io::stderr().is_terminal();
        Self::new(io::stderr()).with_color(color)
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn supports_color(&self) -> bool {
        self.color
    }

    /// Writes one complete line and flushes it.
    pub fn write(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(line)?;
        writer.flush()
    }
}

impl Default for Sink {
    fn default() -> Self { Self::stdout() }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("color", &self.color).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    /// Writes one byte per call, which would interleave without the lock.
    struct Trickle(Shared);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            std::thread::yield_now();
            self.0.write(&buf[..1])
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    #[test]
    fn new_sinks_are_colorless() {
        let sink = Sink::new(Vec::new());
        assert!(!sink.supports_color());
        assert!(sink.with_color(true).supports_color());
    }

    #[test]
    fn clones_share_the_writer() {
        let out = Shared::default();
        let sink = Sink::new(out.clone());
        sink.clone().write(b"a\n").unwrap();
        sink.write(b"b\n").unwrap();
        assert_eq!(&*out.0.lock(), b"a\nb\n");
    }

    #[test]
    fn concurrent_lines_do_not_interleave() {
        let out = Shared::default();
        let sink = Sink::new(Trickle(out.clone()));

        std::thread::scope(|s| {
            for id in 0..8u8 {
                let sink = sink.clone();
                s.spawn(move || {
                    let line = format!("{}\n", char::from(b'a' + id).to_string().repeat(32));
                    for _ in 0..10 {
                        sink.write(line.as_bytes()).unwrap();
                    }
                });
            }
        });

        let text = String::from_utf8(out.0.lock().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 80);
        for line in lines {
            assert_eq!(line.len(), 32);
            let first = line.chars().next().unwrap();
            assert!(line.chars().all(|c| c == first), "interleaved line: {line}");
        }
    }
}
