//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};

/// An incoming HTTP request with its body fully read.
///
/// Build one from an [`http::Request`] (the server does this for you):
///
/// ```rust
/// use bytes::Bytes;
/// use tagline::Request;
///
/// let req = Request::from(
///     http::Request::get("/users?id=7").body(Bytes::new()).unwrap(),
/// );
/// assert_eq!(req.path(), "/users");
/// assert_eq!(req.query_value("id").as_deref(), Some("7"));
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn from_parts(
        parts: http::request::Parts,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            remote_addr,
        }
    }

    /// Sets the peer address the request arrived from.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> &str { self.uri.query().unwrap_or("") }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. Returns the first value, and `None`
    /// for values that are not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// First value of a query-string parameter, percent-decoded.
    pub fn query_value(&self, key: &str) -> Option<String> {
        first_pair(self.query().as_bytes(), key)
    }

    /// First value of a form field.
    ///
    /// `application/x-www-form-urlencoded` bodies of `POST`, `PUT` and
    /// `PATCH` requests are searched first, then the query string.
    pub fn form_value(&self, key: &str) -> Option<String> {
        let has_form_body = matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
            && self.header("content-type")
                .and_then(|ct| ct.split(';').next())
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"));

        has_form_body
            .then(|| first_pair(&self.body, key))
            .flatten()
            .or_else(|| self.query_value(key))
    }

    /// Value of a cookie from the `Cookie` header(s).
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"'))
    }

    /// Client IP: first `X-Forwarded-For` entry, then `X-Real-Ip`, then the
    /// peer address. Empty when none is known.
    pub fn client_ip(&self) -> String {
        let forwarded = self.header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        let real = self.header("x-real-ip").map(str::trim).filter(|ip| !ip.is_empty());

        match forwarded.or(real) {
            Some(ip) => ip.to_owned(),
            None => self.remote_addr.map(|a| a.ip().to_string()).unwrap_or_default(),
        }
    }

    /// The `Host` header, or the URI authority for HTTP/2 requests.
    pub fn host(&self) -> &str {
        self.header("host")
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
            .unwrap_or("")
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body, None)
    }
}

fn first_pair(input: &[u8], key: &str) -> Option<String> {
    url::form_urlencoded::parse(input)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
