//! Middleware layer.
//!
//! Middleware wraps a [`Handler`](crate::Handler) and sees every request and
//! response that passes through it. This is the place for cross-cutting
//! concerns that must not leak into route handlers.
//!
//! Built-in middleware:
//! - [`AccessLog`]: one rendered line per request, driven by a
//!   `${tag}` format string

mod access_log;

pub use access_log::AccessLog;
