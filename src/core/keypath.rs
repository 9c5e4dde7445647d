//! Purpose: Parse bracket-path keys such as `a[b][]` into a name plus segments.
//! Exports: `KeyPath`, `Segment`.
//! Role: Grammar stage for the assembler; rejects malformed keys before any merge.
//! Invariants: `name` is non-empty and never contains `[` or `]`.
//! Invariants: Every bracket group closes before the next opens; nothing trails the last `]`.

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    /// `[]`: extend a list.
    Append,
    /// `[name]`: address a map field.
    Field(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPath {
    pub name: String,
    pub segments: Vec<Segment>,
}

impl KeyPath {
    pub fn parse(key: &str) -> Result<Self, Error> {
        let name_end = key.find(['[', ']']).unwrap_or(key.len());
        let name = &key[..name_end];
        if name.is_empty() {
            return Err(malformed(key, "key must start with a name"));
        }

        let mut segments = Vec::new();
        let mut rest = &key[name_end..];
        while !rest.is_empty() {
            let Some(inner) = rest.strip_prefix('[') else {
                return Err(malformed(key, "expected `[` after name or `]`"));
            };
            let Some(close) = inner.find(['[', ']']) else {
                return Err(malformed(key, "unclosed `[`"));
            };
            if inner.as_bytes()[close] == b'[' {
                return Err(malformed(key, "nested `[` inside a segment"));
            }
            let segment = &inner[..close];
            segments.push(if segment.is_empty() {
                Segment::Append
            } else {
                Segment::Field(segment.to_string())
            });
            rest = &inner[close + 1..];
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }
}

fn malformed(key: &str, message: &str) -> Error {
    Error::new(ErrorKind::MalformedKey)
        .with_message(message)
        .with_key(key)
        .with_hint("Keys look like `name`, `name[field]`, or `name[]`, e.g. `items[][price]`.")
}
