//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Besides status, headers and body, a response carries two values that are
//! never sent to the client: an [`ErrorValue`] and an application id. They
//! exist for the access log (`${error}`, `${level}`, `${app_id}`).

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

use crate::context::ErrorValue;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use http::StatusCode;
/// use tagline::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder
///
/// ```rust
/// use http::StatusCode;
/// use tagline::Response;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .app_id("billing")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder()
///     .status(StatusCode::BAD_GATEWAY)
///     .error("upstream timed out")
///     .no_body();
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) error: Option<ErrorValue>,
    pub(crate) app_id: Option<String>,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            error: None,
            app_id: None,
        }
    }

    /// Attaches an error for the access log. Promotes `${level}` to `error`.
    pub fn with_error(mut self, error: impl Into<ErrorValue>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn error(&self) -> Option<&ErrorValue> { self.error.as_ref() }
    pub fn app_id(&self) -> Option<&str> { self.app_id.as_deref() }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`]. Defaults to `200 OK`.
///
/// Headers with an invalid name or value are skipped.
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
    error: Option<ErrorValue>,
    app_id: Option<String>,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn error(mut self, error: impl Into<ErrorValue>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish("application/json", body.into())
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", Bytes::from(body.into()))
    }

    pub fn bytes(self, content_type: &'static str, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    pub fn no_body(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: Bytes::new(),
            error: self.error,
            app_id: self.app_id,
        }
    }

    fn finish(mut self, content_type: &'static str, body: Bytes) -> Response {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        let mut res = self.no_body();
        res.body = body;
        res
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`]. Implement it on your own types to
/// return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
