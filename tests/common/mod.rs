#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tagline::{AccessLog, Config, Request, Sink};

/// In-memory sink target shared between the test and the access log.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().clone()).expect("log output is utf-8")
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_owned).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An access log with `format` writing to a fresh in-memory buffer.
pub fn access_log(format: &str) -> (AccessLog, SharedBuf) {
    access_log_with(Config::default().format(format))
}

/// Like [`access_log`], for configs that need more than a format.
pub fn access_log_with(config: Config) -> (AccessLog, SharedBuf) {
    let out = SharedBuf::default();
    let log = AccessLog::new(config.output(Sink::new(out.clone())));
    (log, out)
}

pub fn request(method: &str, uri: &str) -> http::request::Builder {
    http::Request::builder().method(method).uri(uri)
}

pub fn build(builder: http::request::Builder, body: &'static str) -> Request {
    Request::from(builder.body(Bytes::from_static(body.as_bytes())).expect("valid request"))
}

pub fn get(uri: &str) -> Request {
    build(request("GET", uri), "")
}

/// Parses the unit-scaled form produced by `${latency_human}` back to
/// nanoseconds.
pub fn parse_human(s: &str) -> u128 {
    let mut total = 0.0_f64;
    let mut rest = s;
    while !rest.is_empty() {
        let split = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).expect("unit");
        let (number, tail) = rest.split_at(split);
        let number: f64 = number.parse().expect("number");
        let (scale, unit_len) = if tail.starts_with("ns") {
            (1.0, 2)
        } else if tail.starts_with("µs") {
            (1e3, "µs".len())
        } else if tail.starts_with("ms") {
            (1e6, 2)
        } else if tail.starts_with('s') {
            (1e9, 1)
        } else if tail.starts_with('m') {
            (60e9, 1)
        } else if tail.starts_with('h') {
            (3600e9, 1)
        } else {
            panic!("unknown unit in {s}");
        };
        total += number * scale;
        rest = &tail[unit_len..];
    }
    total.round() as u128
}
