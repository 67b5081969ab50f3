//! Tags and their resolution.
//!
//! A tag is the name inside a `${…}` placeholder. Names are parsed once, when
//! the template is compiled, into a [`Tag`]; resolving a tag for a request is
//! then a `match` over the enum.
//!
//! | Tag | Value |
//! |---|---|
//! | `time_unix`, `time_unix_nano` | current time, Unix seconds / nanoseconds |
//! | `time_rfc3339`, `time_rfc3339_nano` | current local time, RFC 3339; the nano form always has nine fractional digits |
//! | `time_custom` | current local time, configured strftime layout |
//! | `id` | `X-Request-Id` request header |
//! | `remote_ip` | client IP (proxy headers first, then peer) |
//! | `uri`, `path`, `query` | path and query (never scheme or host), path (`/` if empty), raw query |
//! | `host`, `method`, `protocol`, `referer`, `user_agent` | request metadata |
//! | `status` | response status, ANSI-colored on color sinks |
//! | `level`, `error`, `app_id` | log level, error as JSON, application id |
//! | `latency`, `latency_human` | handler time in ns / unit-scaled |
//! | `bytes_in`, `bytes_out` | request / response body length |
//! | `body`, `response` | redacted request body / captured response |
//! | `header:NAME`, `query:NAME`, `form:NAME`, `cookie:NAME` | single values |
//!
//! Anything else is [`Tag::Unknown`] and renders as nothing.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, SecondsFormat};
use colored::Color;

use crate::context::RenderContext;
use crate::redact::redact_bytes;

/// A parsed placeholder name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    TimeUnix,
    TimeUnixNano,
    TimeRfc3339,
    TimeRfc3339Nano,
    TimeCustom,
    Id,
    RemoteIp,
    Uri,
    Host,
    Method,
    Path,
    Query,
    Protocol,
    Referer,
    UserAgent,
    Status,
    Level,
    Error,
    AppId,
    Latency,
    LatencyHuman,
    BytesIn,
    BytesOut,
    Body,
    Response,
    Header(String),
    QueryParam(String),
    Form(String),
    Cookie(String),
    Unknown(String),
}

impl Tag {
    /// Parses a placeholder name. Exact names win over prefixes, so `query`
    /// is the raw query string and `query:page` a single parameter.
    pub fn parse(name: &str) -> Self {
        match name {
            "time_unix"         => Self::TimeUnix,
            "time_unix_nano"    => Self::TimeUnixNano,
            "time_rfc3339"      => Self::TimeRfc3339,
            "time_rfc3339_nano" => Self::TimeRfc3339Nano,
            "time_custom"       => Self::TimeCustom,
            "id"                => Self::Id,
            "remote_ip"         => Self::RemoteIp,
            "uri"               => Self::Uri,
            "host"              => Self::Host,
            "method"            => Self::Method,
            "path"              => Self::Path,
            "query"             => Self::Query,
            "protocol"          => Self::Protocol,
            "referer"           => Self::Referer,
            "user_agent"        => Self::UserAgent,
            "status"            => Self::Status,
            "level"             => Self::Level,
            "error"             => Self::Error,
            "app_id"            => Self::AppId,
            "latency"           => Self::Latency,
            "latency_human"     => Self::LatencyHuman,
            "bytes_in"          => Self::BytesIn,
            "bytes_out"         => Self::BytesOut,
            "body"              => Self::Body,
            "response"          => Self::Response,
            _ => Self::parse_prefixed(name),
        }
    }

    fn parse_prefixed(name: &str) -> Self {
        let param = |prefix: &str| name.strip_prefix(prefix).map(str::to_owned);

        if let Some(p) = param("header:") {
            Self::Header(p)
        } else if let Some(p) = param("query:") {
            Self::QueryParam(p)
        } else if let Some(p) = param("form:") {
            Self::Form(p)
        } else if let Some(p) = param("cookie:") {
            Self::Cookie(p)
        } else {
            Self::Unknown(name.to_owned())
        }
    }

    /// The placeholder name this tag was parsed from.
    pub fn name(&self) -> String {
        let fixed = match self {
            Self::TimeUnix        => "time_unix",
            Self::TimeUnixNano    => "time_unix_nano",
            Self::TimeRfc3339     => "time_rfc3339",
            Self::TimeRfc3339Nano => "time_rfc3339_nano",
            Self::TimeCustom      => "time_custom",
            Self::Id              => "id",
            Self::RemoteIp        => "remote_ip",
            Self::Uri             => "uri",
            Self::Host            => "host",
            Self::Method          => "method",
            Self::Path            => "path",
            Self::Query           => "query",
            Self::Protocol        => "protocol",
            Self::Referer         => "referer",
            Self::UserAgent       => "user_agent",
            Self::Status          => "status",
            Self::Level           => "level",
            Self::Error           => "error",
            Self::AppId           => "app_id",
            Self::Latency         => "latency",
            Self::LatencyHuman    => "latency_human",
            Self::BytesIn         => "bytes_in",
            Self::BytesOut        => "bytes_out",
            Self::Body            => "body",
            Self::Response        => "response",
            Self::Header(p)     => return format!("header:{p}"),
            Self::QueryParam(p) => return format!("query:{p}"),
            Self::Form(p)       => return format!("form:{p}"),
            Self::Cookie(p)     => return format!("cookie:{p}"),
            Self::Unknown(n)    => return n.clone(),
        };
        fixed.to_owned()
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self { Self::parse(name) }
}

/// Default layout for `time_custom`.
pub const DEFAULT_CUSTOM_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Turns tags into bytes for one request.
///
/// Holds the settings that are fixed per sink/configuration: the
/// `time_custom` layout and whether `status` is colored.
#[derive(Clone, Debug)]
pub struct Resolver {
    custom_time_format: String,
    color: bool,
}

impl Resolver {
    /// An invalid strftime layout is replaced with
    /// [`DEFAULT_CUSTOM_TIME_FORMAT`].
    pub fn new(custom_time_format: &str, color: bool) -> Self {
        let custom_time_format = if is_valid_layout(custom_time_format) {
            custom_time_format.to_owned()
        } else {
            tracing::warn!(layout = custom_time_format, "invalid custom time format, using default");
            DEFAULT_CUSTOM_TIME_FORMAT.to_owned()
        };
        Self { custom_time_format, color }
    }

    pub fn custom_time_format(&self) -> &str {
        &self.custom_time_format
    }

    /// Resolves a tag by name. Unknown names yield an empty vector.
    pub fn resolve_name(&self, name: &str, ctx: &RenderContext) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.resolve(&Tag::parse(name), ctx, &mut out);
        out
    }

    /// Appends the value of `tag` to `out`.
    pub fn resolve(&self, tag: &Tag, ctx: &RenderContext, out: &mut Vec<u8>) -> io::Result<()> {
        let req = &ctx.request;

        match tag {
            Tag::TimeUnix        => write!(out, "{}", unix_now().as_secs()),
            Tag::TimeUnixNano    => write!(out, "{}", unix_now().as_nanos()),
            Tag::TimeRfc3339     => put(out, Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            Tag::TimeRfc3339Nano => put(out, Local::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Tag::TimeCustom      => write!(out, "{}", format_custom(Local::now(), &self.custom_time_format)),
            Tag::Id              => put(out, req.header("x-request-id").unwrap_or("")),
            Tag::RemoteIp        => put(out, req.client_ip()),
            Tag::Uri             => put(out, req.uri().path_and_query().map_or("/", |pq| pq.as_str())),
            Tag::Host            => put(out, req.host()),
            Tag::Method          => put(out, req.method().as_str()),
            Tag::Path            => put(out, if req.path().is_empty() { "/" } else { req.path() }),
            Tag::Query           => put(out, req.query()),
            Tag::Protocol        => write!(out, "{:?}", req.version()),
            Tag::Referer         => put(out, req.header("referer").unwrap_or("")),
            Tag::UserAgent       => put(out, req.header("user-agent").unwrap_or("")),
            Tag::Status          => self.write_status(out, ctx.status.as_u16()),
            Tag::Level           => put(out, ctx.level()),
            Tag::Error           => serde_json::to_writer(&mut *out, &ctx.error).map_err(io::Error::from),
            Tag::AppId           => put(out, ctx.app_id().unwrap_or("")),
            Tag::Latency         => write!(out, "{}", ctx.latency().as_nanos()),
            Tag::LatencyHuman    => put(out, human_duration(ctx.latency())),
            Tag::BytesIn         => write!(out, "{}", req.body().len()),
            Tag::BytesOut        => write!(out, "{}", ctx.bytes_out),
            Tag::Body            => out.write_all(&redact_bytes(req.body())),
            Tag::Response        => out.write_all(&redact_bytes(&ctx.response)),
            Tag::Header(name)    => put(out, req.header(name).unwrap_or("")),
            Tag::QueryParam(key) => put(out, req.query_value(key).unwrap_or_default()),
            Tag::Form(key)       => put(out, req.form_value(key).unwrap_or_default()),
            Tag::Cookie(name)    => put(out, req.cookie(name).unwrap_or("")),
            Tag::Unknown(_)      => Ok(()),
        }
    }

    fn write_status(&self, out: &mut Vec<u8>, code: u16) -> io::Result<()> {
        if !self.color {
            return write!(out, "{code}");
        }
        let color = match code {
            500.. => Color::Red,
            400.. => Color::Yellow,
            300.. => Color::Cyan,
            _     => Color::Green,
        };
        write!(out, "\x1b[{}m{code}\x1b[0m", color.to_fg_str())
    }
}

fn put(out: &mut Vec<u8>, s: impl AsRef<str>) -> io::Result<()> {
    out.extend_from_slice(s.as_ref().as_bytes());
    Ok(())
}

fn unix_now() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

fn is_valid_layout(layout: &str) -> bool {
    !StrftimeItems::new(layout).any(|item| matches!(item, Item::Error))
}

fn format_custom(now: DateTime<Local>, layout: &str) -> String {
    let mut s = String::new();
    // Layouts are validated up front; a failure here renders nothing.
    if write!(s, "{}", now.format(layout)).is_err() {
        s.clear();
    }
    s
}

/// Formats a duration with the largest unit that keeps the integer part
/// non-zero: `120ns`, `850µs`, `52.3ms`, `1.5s`, `2m3.25s`, `1h0m0s`.
///
/// The output is exact, trailing fractional zeros trimmed.
pub fn human_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    match nanos {
        0 => "0s".to_owned(),
        1..=999 => format!("{nanos}ns"),
        1_000..=999_999 => scaled(nanos, 1_000, 3, "µs"),
        1_000_000..=999_999_999 => scaled(nanos, 1_000_000, 6, "ms"),
        _ => {
            let secs = nanos / 1_000_000_000;
            let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
            let mut out = String::new();
            if h > 0 {
                let _ = write!(out, "{h}h");
            }
            if h > 0 || m > 0 {
                let _ = write!(out, "{m}m");
            }
            out + &scaled(s * 1_000_000_000 + nanos % 1_000_000_000, 1_000_000_000, 9, "s")
        }
    }
}

fn scaled(value: u128, unit: u128, digits: usize, suffix: &str) -> String {
    let (whole, frac) = (value / unit, value % unit);
    if frac == 0 {
        return format!("{whole}{suffix}");
    }
    let frac = format!("{frac:0digits$}");
    format!("{whole}.{}{suffix}", frac.trim_end_matches('0'))
}
