//! Unified error type.

/// The error type returned by tagline's fallible operations.
///
/// Per-request problems never surface here. A handler failure is an HTTP
/// [`Response`](crate::Response); a log line that cannot be rendered or
/// written is dropped. This type covers infrastructure failures (binding to a
/// port, accepting a connection) and configuration that cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {key}: {message}")]
    Config { key: &'static str, message: String },
}
