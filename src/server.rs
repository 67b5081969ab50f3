//! HTTP server and graceful shutdown.
//!
//! The server is the host the access log runs inside: it reads each request
//! body to completion, hands the request to one [`Handler`] (usually an
//! [`AccessLog::wrap`](crate::AccessLog::wrap)ped application) and sends the
//! response back.
//!
//! # Connections
//!
//! Each accepted TCP connection gets its own tokio task, driven by
//! hyper-util's auto builder. The builder sniffs the connection preface and
//! speaks HTTP/1.1 or HTTP/2 (prior knowledge) accordingly, so one listener
//! serves both. HTTP/2 requests carry an absolute-form URI; the `uri` tag
//! still renders only path and query.
//!
//! # Request bodies
//!
//! The body is collected into one `Bytes` before the handler runs. The
//! access log needs the whole body for `${body}`, `${bytes_in}` and
//! `${form:…}`, and snapshotting a `Bytes` is a reference-count bump, not a
//! copy. Size limits are the reverse proxy's job.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** (what Kubernetes and systemd send) or **Ctrl-C** the
//! server:
//! 1. Immediately stops `listener.accept()`; no new connections are made.
//! 2. Lets every in-flight connection task run to completion, so requests
//!    that were already accepted still get their access-log line.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Give the process a grace period longer than your slowest request.

use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tagline::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them to `handler`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the address cannot be bound. Accept and connection
    /// errors after that are logged and do not stop the server.
    pub async fn serve(self, handler: impl Handler) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        serve_listener(listener, handler.into_boxed_handler(), shutdown_signal()).await
    }
}

/// Accept loop. Split from [`Server::serve`] so the listener and the
/// shutdown trigger can be supplied from outside.
///
/// Connection tasks live in a `JoinSet` rather than being detached with
/// `tokio::spawn`, which is what makes the final drain possible: after the
/// loop breaks, `join_next` waits for each remaining connection.
pub(crate) async fn serve_listener(
    listener: TcpListener,
    handler: BoxedHandler,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), Error> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "tagline listening");

    let mut tasks = tokio::task::JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Check shutdown first so a SIGTERM stops accepting immediately.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let handler = Arc::clone(&handler);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let handler = Arc::clone(&handler);
                        async move { dispatch(handler, req, remote_addr).await }
                    });

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("tagline stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads the body, runs the handler, converts the response.
///
/// A body that cannot be read answers `400 Bad Request` without reaching the
/// handler. Every other outcome is the handler's response.
async fn dispatch<B>(
    handler: BoxedHandler,
    req: hyper::Request<B>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let response = handler.call(Request::from_parts(parts, body, Some(remote_addr))).await;
    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C (Ctrl-C only on non-Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;
    use crate::{AccessLog, Config, Sink};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
    }

    async fn echo(req: Request) -> Response {
        Response::builder()
            .status(StatusCode::CREATED)
            .text(format!("{} {}", req.method(), String::from_utf8_lossy(req.body())))
    }

    #[tokio::test]
    async fn dispatch_passes_body_and_peer() {
        let peer: SocketAddr = "192.0.2.1:4000".parse().unwrap();
        let handler = (|req: Request| async move {
            Response::text(format!("{}|{}", req.client_ip(), String::from_utf8_lossy(req.body())))
        })
        .into_boxed_handler();

        let req = hyper::Request::post("/x").body(Full::new(Bytes::from_static(b"hi"))).unwrap();
        let res = dispatch(handler, req, peer).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"192.0.2.1|hi");
    }

    #[tokio::test]
    async fn serves_and_logs_over_tcp() {
        let out = Shared::default();
        let log = AccessLog::new(
            Config::default()
                .format("${remote_ip} ${method} ${path} ${status} ${bytes_in}\n")
                .output(Sink::new(out.clone())),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(
            listener,
            log.wrap(echo).into_boxed_handler(),
            async { let _ = stopped.await; },
        ));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"POST /items HTTP/1.1\r\nhost: localhost\r\ncontent-length: 3\r\nconnection: close\r\n\r\nabc")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8(raw).unwrap();
        assert!(raw.starts_with("HTTP/1.1 201"), "{raw}");
        assert!(raw.ends_with("POST abc"), "{raw}");

        let _ = stop.send(());
        server.await.unwrap().unwrap();

        let line = String::from_utf8(out.0.lock().clone()).unwrap();
        assert_eq!(line, "127.0.0.1 POST /items 201 3\n");
    }
}
