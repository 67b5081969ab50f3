//! Access-log configuration.
//!
//! Built once at startup and moved into [`AccessLog::new`](crate::AccessLog::new).
//! There is no process-wide default instance; [`Config::default`] returns a
//! fresh value every time.
//!
//! ## From the environment
//!
//! ```bash
//! export ACCESS_LOG_FORMAT='${method} ${path} ${status} ${latency_human}\n'
//! export ACCESS_LOG_TIME_FORMAT='%d/%b/%Y:%H:%M:%S %z'
//! export ACCESS_LOG_SKIP='/healthz,/readyz'
//! export ACCESS_LOG_CAPTURE_LIMIT=65536
//! ```
//!
//! All variables are optional. Output always goes to stdout.

use std::collections::HashSet;
use std::env;

use crate::error::Error;
use crate::sink::Sink;
use crate::tag::DEFAULT_CUSTOM_TIME_FORMAT;

/// The default line: one JSON object per request.
pub const DEFAULT_FORMAT: &str = concat!(
    r#"{"time":"${time_rfc3339_nano}","id":"${id}","level":"${level}","remote_ip":"${remote_ip}","#,
    r#""host":"${host}","method":"${method}","uri":"${uri}","user_agent":"${user_agent}","#,
    r#""status":${status},"error":${error},"latency":${latency},"latency_human":"${latency_human}","#,
    r#""bytes_in":${bytes_in},"bytes_out":${bytes_out}}"#,
    "\n",
);

/// Access-log settings.
///
/// ```rust
/// use tagline::{Config, Sink};
///
/// let config = Config::default()
///     .format("${method} ${uri} ${status}\n")
///     .output(Sink::stderr())
///     .skip("/healthz")
///     .skip("/readyz")
///     .capture_limit(Some(64 * 1024));
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Format string with `${tag}` placeholders.
    pub format: String,
    /// strftime layout for `${time_custom}`.
    pub custom_time_format: String,
    pub output: Sink,
    /// Request paths that are never logged (exact match).
    pub skip: HashSet<String>,
    /// Maximum number of response bytes mirrored for `${response}`.
    /// `None` mirrors everything.
    pub capture_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_owned(),
            custom_time_format: DEFAULT_CUSTOM_TIME_FORMAT.to_owned(),
            output: Sink::stdout(),
            skip: HashSet::new(),
            capture_limit: None,
        }
    }
}

impl Config {
    /// Loads settings from `ACCESS_LOG_*` variables, defaulting the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `ACCESS_LOG_CAPTURE_LIMIT` is not a
    /// non-negative integer.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(format) = var("ACCESS_LOG_FORMAT").filter(|f| !f.is_empty()) {
            config.format = unescape_newlines(&format);
        }
        if let Some(layout) = var("ACCESS_LOG_TIME_FORMAT").filter(|f| !f.is_empty()) {
            config.custom_time_format = layout;
        }
        if let Some(paths) = var("ACCESS_LOG_SKIP") {
            for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                config = config.skip(path);
            }
        }
        if let Some(limit) = var("ACCESS_LOG_CAPTURE_LIMIT") {
            let limit = limit.trim().parse::<usize>().map_err(|e| Error::Config {
                key: "ACCESS_LOG_CAPTURE_LIMIT",
                message: format!("{limit:?}: {e}"),
            })?;
            config.capture_limit = Some(limit);
        }

        Ok(config)
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn custom_time_format(mut self, layout: impl Into<String>) -> Self {
        self.custom_time_format = layout.into();
        self
    }

    pub fn output(mut self, output: Sink) -> Self {
        self.output = output;
        self
    }

    /// Adds a path to the skip set.
    pub fn skip(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !path.starts_with('/') {
            tracing::warn!(path = %path, "skip path does not start with '/' and will never match");
        }
        self.skip.insert(path);
        self
    }

    pub fn capture_limit(mut self, limit: Option<usize>) -> Self {
        self.capture_limit = limit;
        self
    }
}

// Shells make a literal newline awkward; accept `\n` in the variable.
fn unescape_newlines(format: &str) -> String {
    format.replace("\\n", "\n")
}
