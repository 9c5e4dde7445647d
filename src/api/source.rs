//! Purpose: Normalize the three request origins (query, multipart, body) into pairs.
//! Exports: `ParamOrigin`, `ParamSource`, `MultipartField`, `FieldKind`, `classify`,
//! `content_type_essence`, `MULTIPART_MEDIA_TYPE`, `DEFAULT_MAX_BODY_BYTES`.
//! Role: Transport-agnostic ingestion seam used by the HTTP server and CLI.
//! Invariants: GET always reads the raw query; other methods read the body.
//! Invariants: Multipart text fields precede file fields, each in arrival order.
//! Invariants: Size limits are enforced by the transport before reaching this module.

use bytes::Bytes;

use crate::core::assemble::assemble;
use crate::core::error::{Error, ErrorKind};
use crate::core::node::Object;
use crate::core::pair::{Pair, parse_form_string};

pub const MULTIPART_MEDIA_TYPE: &str = "multipart/form-data";

/// Body ceiling applied by transports before params are decoded (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamOrigin {
    Query,
    Multipart,
    Body,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Text,
    File,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MultipartField {
    pub name: String,
    pub kind: FieldKind,
    pub data: Bytes,
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
            data: Bytes::from(value.into()),
        }
    }

    pub fn file(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::File,
            data: data.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum ParamSource<'a> {
    Query(&'a str),
    Body(&'a [u8]),
    Multipart(Vec<MultipartField>),
}

impl ParamSource<'_> {
    pub fn origin(&self) -> ParamOrigin {
        match self {
            ParamSource::Query(_) => ParamOrigin::Query,
            ParamSource::Body(_) => ParamOrigin::Body,
            ParamSource::Multipart(_) => ParamOrigin::Multipart,
        }
    }

    pub fn into_pairs(self) -> Result<Vec<Pair>, Error> {
        match self {
            ParamSource::Query(query) => parse_form_string(query),
            ParamSource::Body(body) => {
                let text = std::str::from_utf8(body).map_err(|err| {
                    Error::new(ErrorKind::MalformedEncoding)
                        .with_message("form body is not valid UTF-8")
                        .with_source(err)
                })?;
                parse_form_string(text)
            }
            ParamSource::Multipart(fields) => Ok(multipart_pairs(fields)),
        }
    }

    pub fn decode(self) -> Result<Object, Error> {
        let origin = self.origin();
        let pairs = self.into_pairs()?;
        tracing::debug!(?origin, pairs = pairs.len(), "decoding request params");
        assemble(&pairs)
    }
}

fn multipart_pairs(fields: Vec<MultipartField>) -> Vec<Pair> {
    let (text, files): (Vec<_>, Vec<_>) = fields
        .into_iter()
        .partition(|field| field.kind == FieldKind::Text);
    text.into_iter()
        .chain(files)
        .map(|field| Pair {
            value: String::from_utf8_lossy(&field.data).into_owned(),
            key: field.name,
        })
        .collect()
}

/// Strip parameters such as `; charset=utf-8` from a content type.
pub fn content_type_essence(content_type: &str) -> &str {
    content_type
        .split_once(';')
        .map_or(content_type, |(essence, _)| essence)
        .trim()
}

pub fn classify(method: &str, content_type: Option<&str>) -> ParamOrigin {
    if method == "GET" {
        return ParamOrigin::Query;
    }
    match content_type.map(content_type_essence) {
        Some(essence) if essence.eq_ignore_ascii_case(MULTIPART_MEDIA_TYPE) => {
            ParamOrigin::Multipart
        }
        _ => ParamOrigin::Body,
    }
}
