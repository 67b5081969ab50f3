//! Format-string compiler.
//!
//! A format string is plain text with `${tag}` placeholders. It is compiled
//! once, at configuration time, into a flat list of [`Segment`]s. Rendering a
//! request is then a single walk over that list: literals are copied, tags
//! are handed to a resolver.
//!
//! Parsing is permissive. There is no malformed format string:
//!
//! - `${` without a closing `}` is literal text through the end of the string
//! - `${}` is a tag with an empty name, which resolves to nothing
//! - a name that is not a known tag is kept as [`Tag::Unknown`]

use std::io;

use crate::tag::Tag;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// One piece of a compiled format string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Tag(Tag),
}

/// A compiled format string. Immutable and freely shareable across threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles `format` into segments. Never fails.
    ///
    /// ```rust
    /// use tagline::{Segment, Tag, Template};
    ///
    /// let t = Template::compile("${method} ${path}");
    /// assert_eq!(t.segments(), &[
    ///     Segment::Tag(Tag::Method),
    ///     Segment::Literal(" ".into()),
    ///     Segment::Tag(Tag::Path),
    /// ]);
    /// ```
    pub fn compile(format: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = format;

        while let Some(open) = rest.find(OPEN) {
            let after_open = &rest[open + OPEN.len()..];
            let Some(close) = after_open.find(CLOSE) else {
                break;
            };

            literal.push_str(&rest[..open]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Tag(Tag::parse(&after_open[..close])));
            rest = &after_open[close + CLOSE.len_utf8()..];
        }

        // Unterminated placeholders fall through here as plain text.
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether `tag` appears anywhere in the template.
    pub fn references(&self, tag: &Tag) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Tag(t) if t == tag))
    }

    /// Walks the template, appending literals to `out` and delegating every
    /// tag to `resolve`. The first resolver error stops the walk and is
    /// returned; `out` then holds a partial line the caller must discard.
    pub fn execute<F>(&self, out: &mut Vec<u8>, mut resolve: F) -> io::Result<()>
    where
        F: FnMut(&mut Vec<u8>, &Tag) -> io::Result<()>,
    {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.extend_from_slice(text.as_bytes()),
                Segment::Tag(tag) => resolve(out, tag)?,
            }
        }
        Ok(())
    }
}
