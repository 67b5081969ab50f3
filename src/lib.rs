//! # tagline
//!
//! Access logging for HTTP services, driven by a format string.
//!
//! You write the line you want with `${tag}` placeholders. tagline compiles it
//! once, then for every request fills in the placeholders from the request,
//! the response and a timer, and writes the result to a sink in one call.
//!
//! ```text
//! ${remote_ip} - ${method} ${uri} ${status} ${latency_human}\n
//!        ↓
//! 203.0.113.9 - GET /users/42?full=1 200 1.204ms
//! ```
//!
//! ## What a line can contain
//!
//! - request metadata: `method`, `uri`, `path`, `query`, `host`, `protocol`,
//!   `remote_ip`, `user_agent`, `referer`, `id`
//! - single values: `header:NAME`, `query:NAME`, `form:NAME`, `cookie:NAME`
//! - outcome: `status` (ANSI-colored on terminals), `level`, `error`, `app_id`
//! - timing and size: `latency`, `latency_human`, `bytes_in`, `bytes_out`,
//!   and five clock formats (`time_unix`, `time_rfc3339_nano`, …)
//! - payloads: `body` and `response`, with passwords and line breaks removed
//!
//! Unknown tags render as nothing. A typo in a format string degrades the
//! line; it never breaks a request.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use tagline::{AccessLog, Config, Request, Response, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let log = AccessLog::new(Config::default().skip("/healthz"));
//!
//!     Server::bind("0.0.0.0:3000").serve(log.wrap(app)).await.unwrap();
//! }
//!
//! async fn app(req: Request) -> Response {
//!     match req.path() {
//!         "/healthz" => Response::text("ok"),
//!         "/orders" if req.body().is_empty() => Response::builder()
//!             .status(StatusCode::BAD_REQUEST)
//!             .error("empty order")
//!             .no_body(),
//!         _ => Response::json(br#"{"id":1}"#.to_vec()),
//!     }
//! }
//! ```
//!
//! ## The contract
//!
//! Logging is best-effort. It never changes a response, and a line that
//! cannot be rendered or written is dropped. Rotation, sampling and
//! asynchronous delivery belong to whatever owns the sink.

mod capture;
mod config;
mod context;
mod error;
mod handler;
mod pool;
mod redact;
mod request;
mod response;
mod server;
mod sink;
mod tag;
mod template;

pub mod middleware;

pub use capture::Capture;
pub use config::{Config, DEFAULT_FORMAT};
pub use context::{ErrorValue, RenderContext};
pub use error::Error;
pub use handler::Handler;
pub use middleware::AccessLog;
pub use pool::{BufferPool, PooledBuffer};
pub use redact::{redact, redact_bytes};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
pub use sink::Sink;
pub use tag::{DEFAULT_CUSTOM_TIME_FORMAT, Resolver, Tag, human_duration};
pub use template::{Segment, Template};
