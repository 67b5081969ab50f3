//! Redaction of request and response bodies before they reach a log line.
//!
//! Two things are removed:
//!
//! - line breaks together with the indentation that follows them, so a
//!   pretty-printed body collapses onto the single log line
//! - any `"password…": value` pair, value and trailing comma included
//!
//! This is a textual filter over JSON-looking input, not a JSON parser. It
//! does not recurse, does not understand escaping in keys, and leaves the
//! surrounding structure alone: dropping the last field of an object leaves
//! the comma that preceded it.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::bytes::Regex;

// Key: quoted, starts with `password` (case-sensitive).
// Value: a quoted string with escapes, or a bare scalar up to `,` `}` `]`.
static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\r?\n[ \t]*|"password[^"]*"\s*:\s*(?:"(?:[^"\\]|\\.)*"|[^,}\]\s]*)\s*(?:,\s*)?"#,
    )
    .unwrap()
});

/// Redacts raw body bytes. Returns the input unchanged (borrowed) when
/// nothing matched.
pub fn redact_bytes(raw: &[u8]) -> Cow<'_, [u8]> {
    NOISE.replace_all(raw, &b""[..])
}

/// Redacts a string.
///
/// ```rust
/// use tagline::redact;
///
/// assert_eq!(redact(r#"{"password":"secret123","x":1}"#), r#"{"x":1}"#);
/// assert_eq!(redact("{\n  \"a\": 1\n}"), r#"{"a": 1}"#);
/// ```
pub fn redact(text: &str) -> String {
    String::from_utf8_lossy(&redact_bytes(text.as_bytes())).into_owned()
}
