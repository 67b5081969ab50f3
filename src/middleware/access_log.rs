//! Access-log middleware.
//!
//! # Per-request flow
//!
//! ```text
//! START              snapshot request + body, record start instant
//!   ↓
//! HANDLER_RUN        downstream handler runs to completion
//!   ↓
//! CAPTURE            response body mirrored through Capture, only when the
//!                    template renders ${response}; the body itself is sent
//!                    as-is
//!   ↓
//!   ├─ path ∈ skip ─→ SKIPPED   (no buffer, no bytes)
//!   ↓
//! RENDERED           pooled buffer ← template walk, one resolver call per tag
//!   ↓
//! FLUSHED            one Sink::write for the whole line
//! ```
//!
//! Logging is best-effort. A line that fails to render or write is dropped
//! with a `debug!` event; the response is returned unchanged either way.

use std::collections::HashSet;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::debug;

use crate::capture::Capture;
use crate::config::Config;
use crate::context::RenderContext;
use crate::handler::Handler;
use crate::pool::BufferPool;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::sink::Sink;
use crate::tag::{Resolver, Tag};
use crate::template::Template;

/// Renders one line per request from a compiled format string.
///
/// Build it once, then either [`wrap`](AccessLog::wrap) a handler or drive
/// it yourself with [`observe`](AccessLog::observe). Safe to share across
/// any number of concurrent requests.
///
/// ```rust,no_run
/// use tagline::{AccessLog, Config, Request, Response, Server};
///
/// # async fn run() -> Result<(), tagline::Error> {
/// let log = AccessLog::new(
///     Config::default()
///         .format("${remote_ip} ${method} ${uri} ${status} ${latency_human}\n")
///         .skip("/healthz"),
/// );
///
/// Server::bind("0.0.0.0:3000").serve(log.wrap(app)).await
/// # }
///
/// async fn app(_req: Request) -> Response {
///     Response::text("hello")
/// }
/// ```
#[derive(Debug)]
pub struct AccessLog {
    template: Template,
    resolver: Resolver,
    output: Sink,
    skip: HashSet<String>,
    capture_limit: Option<usize>,
    capture_response: bool,
    pool: BufferPool,
}

impl AccessLog {
    /// Compiles the format string and takes ownership of the sink.
    pub fn new(config: Config) -> Self {
        let resolver = Resolver::new(&config.custom_time_format, config.output.supports_color());
        let template = Template::compile(&config.format);
        Self {
            capture_response: template.references(&Tag::Response),
            template,
            resolver,
            output: config.output,
            skip: config.skip,
            capture_limit: config.capture_limit,
            pool: BufferPool::new(),
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Wraps `handler` so every request it serves is logged.
    pub fn wrap(self, handler: impl Handler) -> impl Handler {
        let log = Arc::new(self);
        let inner = handler.into_boxed_handler();

        move |req: Request| {
            let log = Arc::clone(&log);
            let inner = Arc::clone(&inner);
            async move { log.observe(req, |req| inner.call(req)).await }
        }
    }

    /// Runs `next` on `req` and logs the exchange.
    ///
    /// The body snapshot shares `req`'s buffer, so `next` sees the full body.
    /// When the template renders `${response}`, the response body is mirrored
    /// through a [`Capture`]. The body buffer `next` produced is returned
    /// untouched either way.
    pub async fn observe<F, Fut, R>(&self, req: Request, next: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = R>,
        R: IntoResponse,
    {
        let mut ctx = RenderContext::start(&req);
        let response = next(req).await.into_response();

        let captured = if self.capture_response {
            self.mirror(response.body())
        } else {
            Vec::new()
        };

        ctx.finish(&response, captured);
        self.log(&ctx);
        response
    }

    fn mirror(&self, body: &[u8]) -> Vec<u8> {
        let mut mirror = Capture::with_limit(io::sink(), self.capture_limit);
        // io::Sink accepts every byte.
        let _ = mirror.write_all(body);
        mirror.into_parts().1
    }

    /// Renders and writes the line for a finished exchange, unless its path
    /// is in the skip set. Never fails; problems drop the line.
    pub fn log(&self, ctx: &RenderContext) {
        if self.skip.contains(ctx.request().path()) {
            return;
        }

        let mut line = self.pool.acquire();
        if let Err(e) = self.render(ctx, &mut line) {
            debug!(error = %e, "access log line dropped: render failed");
            return;
        }
        if let Err(e) = self.output.write(&line) {
            debug!(error = %e, "access log line dropped: sink write failed");
        }
    }

    /// Renders the line for `ctx` into `out`, ignoring the skip set.
    pub fn render(&self, ctx: &RenderContext, out: &mut Vec<u8>) -> io::Result<()> {
        self.template.execute(out, |out, tag| self.resolver.resolve(tag, ctx, out))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    fn access_log(format: &str) -> (AccessLog, Shared) {
        let out = Shared::default();
        let log = AccessLog::new(Config::default().format(format).output(Sink::new(out.clone())));
        (log, out)
    }

    fn request(method: &str, path: &str, body: &'static str) -> Request {
        Request::from(
            http::Request::builder()
                .method(method)
                .uri(path)
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn renders_status_and_method() {
        let (log, out) = access_log("{\"status\":${status},\"method\":\"${method}\"}\n");
        let res = log
            .observe(request("GET", "/x", ""), |_| async {
                Response::builder().status(StatusCode::CREATED).text("made")
            })
            .await;

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(&res.body()[..], b"made");
        assert_eq!(out.text(), "{\"status\":201,\"method\":\"GET\"}\n");
    }

    #[tokio::test]
    async fn handler_sees_full_body_and_response_is_captured() {
        let (log, out) = access_log("${body}|${response}|${bytes_in}|${bytes_out}\n");
        log.observe(request("POST", "/echo", "ping"), |req| async move {
            Response::text(format!("got {}", String::from_utf8_lossy(req.body())))
        })
        .await;
        assert_eq!(out.text(), "ping|got ping|4|8\n");
    }

    #[tokio::test]
    async fn capture_limit_truncates_only_the_log() {
        let out = Shared::default();
        let log = AccessLog::new(
            Config::default()
                .format("${response} ${bytes_out}")
                .output(Sink::new(out.clone()))
                .capture_limit(Some(3)),
        );
        let res = log.observe(request("GET", "/", ""), |_| async { "abcdef" }).await;
        assert_eq!(&res.body()[..], b"abcdef");
        assert_eq!(out.text(), "abc 6");
    }

    #[tokio::test]
    async fn response_body_is_sent_without_copying() {
        let body = Bytes::from(vec![b'x'; 1 << 20]);
        let ptr = body.as_ptr();

        let (log, out) = access_log("${method} ${bytes_out}\n");
        assert!(!log.capture_response);
        let res = log
            .observe(request("GET", "/big", ""), move |_| async move { Response::json(body) })
            .await;
        assert_eq!(res.body().as_ptr(), ptr);
        assert_eq!(out.text(), "GET 1048576\n");

        let body = Bytes::from(vec![b'y'; 16]);
        let ptr = body.as_ptr();
        let (log, out) = access_log("${response}");
        assert!(log.capture_response);
        let res = log
            .observe(request("GET", "/small", ""), move |_| async move { Response::json(body) })
            .await;
        assert_eq!(res.body().as_ptr(), ptr);
        assert_eq!(out.text(), "y".repeat(16));
    }

    #[tokio::test]
    async fn skipped_paths_write_nothing() {
        let out = Shared::default();
        let log = AccessLog::new(
            Config::default()
                .format("${path}\n")
                .output(Sink::new(out.clone()))
                .skip("/healthz"),
        );
        log.observe(request("GET", "/healthz", ""), |_| async { "ok" }).await;
        assert_eq!(out.text(), "");
        assert_eq!(log.pool.idle(), 0, "no buffer is acquired for skipped paths");

        log.observe(request("GET", "/healthz/deep", ""), |_| async { "ok" }).await;
        assert_eq!(out.text(), "/healthz/deep\n");
    }

    #[tokio::test]
    async fn errors_promote_level() {
        let (log, out) = access_log("${level} ${error} ${app_id}\n");
        log.observe(request("GET", "/", ""), |_| async { "ok" }).await;
        log.observe(request("GET", "/", ""), |_| async {
            Response::status(StatusCode::BAD_GATEWAY)
                .with_error("upstream timeout")
                .with_app_id("orders")
        })
        .await;
        assert_eq!(out.text(), "info null \nerror \"upstream timeout\" orders\n");
    }

    #[tokio::test]
    async fn unknown_tags_do_not_abort_the_line() {
        let (log, out) = access_log("a${not_a_real_tag}b ${method}\n");
        log.observe(request("PUT", "/", ""), |_| async { "ok" }).await;
        assert_eq!(out.text(), "ab PUT\n");
    }

    #[tokio::test]
    async fn sink_failures_do_not_affect_the_response() {
        let log = AccessLog::new(Config::default().output(Sink::new(Broken)));
        let res = log.observe(request("GET", "/", ""), |_| async { "still fine" }).await;
        assert_eq!(&res.body()[..], b"still fine");
        assert_eq!(log.pool.idle(), 1, "buffer returned after a failed write");
    }

    #[tokio::test]
    async fn colored_sink_wraps_status() {
        let out = Shared::default();
        let log = AccessLog::new(
            Config::default()
                .format("${status}")
                .output(Sink::new(out.clone()).with_color(true)),
        );
        log.observe(request("GET", "/", ""), |_| async { StatusCode::CREATED }).await;
        assert_eq!(out.text(), "\x1b[32m201\x1b[0m");
    }

    #[tokio::test]
    async fn literal_formats_are_reproduced() {
        let (log, out) = access_log("static line, no tags {}$\n");
        log.observe(request("GET", "/", ""), |_| async { "ok" }).await;
        assert_eq!(out.text(), "static line, no tags {}$\n");
    }

    #[test]
    fn render_ignores_the_skip_set() {
        let log = AccessLog::new(
            Config::default().format("${path}").output(Sink::new(Shared::default())).skip("/"),
        );
        let ctx = RenderContext::start(&request("GET", "/", ""));
        let mut line = Vec::new();
        log.render(&ctx, &mut line).unwrap();
        assert_eq!(line, b"/");
    }

    #[tokio::test]
    async fn wrap_produces_a_handler() {
        let (log, out) = access_log("${method} ${path} ${status}\n");
        let handler = log.wrap(|req: Request| async move {
            if req.path() == "/missing" { StatusCode::NOT_FOUND.into_response() } else { Response::text("ok") }
        });
        let handler = handler.into_boxed_handler();

        handler.call(request("GET", "/", "")).await;
        let res = handler.call(request("DELETE", "/missing", "")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(out.text(), "GET / 200\nDELETE /missing 404\n");
    }
}
