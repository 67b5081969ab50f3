//! Per-request state the resolver reads from.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

use crate::request::Request;
use crate::response::Response;

/// An error attached to a response for the access log.
///
/// Rendered by the `error` tag as JSON. Anything serializable can be an
/// error value; plain messages become JSON strings.
///
/// ```rust
/// use tagline::ErrorValue;
///
/// let e = ErrorValue::from("db down");
/// assert_eq!(serde_json::to_string(&e).unwrap(), r#""db down""#);
///
/// let e = ErrorValue::new(&serde_json::json!({"code": 42}));
/// assert_eq!(serde_json::to_string(&e).unwrap(), r#"{"code":42}"#);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorValue(serde_json::Value);

impl ErrorValue {
    /// Wraps any serializable value. Values that fail to serialize become
    /// JSON `null`.
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Self {
        Self(serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
    }

    /// Uses the error's `Display` output as the message.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::from(err.to_string())
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<&str> for ErrorValue {
    fn from(msg: &str) -> Self { Self(msg.into()) }
}

impl From<String> for ErrorValue {
    fn from(msg: String) -> Self { Self(msg.into()) }
}

impl From<serde_json::Value> for ErrorValue {
    fn from(value: serde_json::Value) -> Self { Self(value) }
}

/// Everything known about one request/response cycle when its line is
/// rendered.
///
/// Built by [`RenderContext::start`] before the handler runs (body snapshot,
/// start instant) and completed by [`RenderContext::finish`] once the
/// response and its captured bytes are known.
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub(crate) request: Request,
    pub(crate) start: Instant,
    pub(crate) stop: Instant,
    pub(crate) status: StatusCode,
    pub(crate) response: Bytes,
    pub(crate) bytes_out: usize,
    pub(crate) error: Option<ErrorValue>,
    pub(crate) app_id: Option<String>,
}

impl RenderContext {
    /// Snapshots the request. `Bytes` clones share the buffer, so the
    /// handler still receives the complete body.
    pub fn start(request: &Request) -> Self {
        let now = Instant::now();
        Self {
            request: request.clone(),
            start: now,
            stop: now,
            status: StatusCode::OK,
            response: Bytes::new(),
            bytes_out: 0,
            error: None,
            app_id: None,
        }
    }

    /// Records the outcome: stop instant, status, error, app id, and the
    /// captured response bytes.
    pub fn finish(&mut self, response: &Response, captured: impl Into<Bytes>) {
        self.stop = Instant::now();
        self.status = response.status;
        self.bytes_out = response.body.len();
        self.response = captured.into();
        self.error = response.error.clone();
        self.app_id = response.app_id.clone();
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn status(&self) -> StatusCode { self.status }
    pub fn error(&self) -> Option<&ErrorValue> { self.error.as_ref() }
    pub fn app_id(&self) -> Option<&str> { self.app_id.as_deref() }

    /// `"error"` when an error is attached, `"info"` otherwise.
    pub fn level(&self) -> &'static str {
        if self.error.is_some() { "error" } else { "info" }
    }

    pub fn latency(&self) -> Duration {
        self.stop.saturating_duration_since(self.start)
    }
}
