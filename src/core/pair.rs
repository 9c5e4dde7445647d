//! Purpose: Split form-encoded text into an ordered sequence of decoded key/value pairs.
//! Exports: `Pair`, `parse_form_string`, `decode_component`.
//! Role: Leaf stage feeding the assembler; knows nothing about bracket paths.
//! Invariants: Output order is left-to-right textual order; duplicates are kept.
//! Invariants: Empty `&` segments are skipped; `=v` still yields an empty-key pair.
//! Invariants: Invalid escapes and non-UTF-8 results fail the whole string.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for Pair {
    fn from((key, value): (K, V)) -> Self {
        Pair::new(key, value)
    }
}

pub fn parse_form_string(input: &str) -> Result<Vec<Pair>, Error> {
    let mut pairs = Vec::with_capacity(input.matches('&').count() + 1);
    for segment in input.split('&') {
        if segment.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = segment.split_once('=').unwrap_or((segment, ""));
        pairs.push(Pair {
            key: decode_component(raw_key)?,
            value: decode_component(raw_value)?,
        });
    }
    tracing::trace!(count = pairs.len(), "extracted form pairs");
    Ok(pairs)
}

/// Decode one key or value: `+` becomes a space, then `%XX` escapes are resolved.
pub fn decode_component(raw: &str) -> Result<String, Error> {
    validate_escapes(raw)?;
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    if !spaced.contains('%') {
        return Ok(spaced.into_owned());
    }
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|err| {
            Error::new(ErrorKind::MalformedEncoding)
                .with_message("percent-decoded text is not valid UTF-8")
                .with_key(raw)
                .with_source(err)
        })
}

// percent-encoding passes malformed escapes through verbatim; reject them up front.
fn validate_escapes(raw: &str) -> Result<(), Error> {
    let bytes = raw.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let valid = bytes
                .get(idx + 1..idx + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                let end = (idx + 3).min(bytes.len());
                let escape = String::from_utf8_lossy(&bytes[idx..end]);
                return Err(Error::new(ErrorKind::MalformedEncoding)
                    .with_message(format!("invalid percent escape `{escape}`"))
                    .with_key(raw)
                    .with_hint("Escapes must be `%` followed by two hex digits; encode a literal `%` as `%25`."));
            }
            idx += 3;
        } else {
            idx += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Pair, decode_component, parse_form_string};
    use crate::core::error::ErrorKind;

    fn pairs(input: &str) -> Vec<(String, String)> {
        parse_form_string(input)
            .expect("parse")
            .into_iter()
            .map(|pair| (pair.key, pair.value))
            .collect()
    }

    fn owned(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_input_yields_no_pairs() {
        assert!(parse_form_string("").expect("parse").is_empty());
    }

    #[test]
    fn keeps_textual_order_and_duplicates() {
        assert_eq!(
            pairs("b=2&a=1&b=3"),
            owned(&[("b", "2"), ("a", "1"), ("b", "3")])
        );
    }

    #[test]
    fn bare_key_gets_empty_value() {
        assert_eq!(pairs("flag&x=1"), owned(&[("flag", ""), ("x", "1")]));
    }

    #[test]
    fn only_first_equals_splits() {
        assert_eq!(pairs("expr=a=b"), owned(&[("expr", "a=b")]));
    }

    #[test]
    fn empty_segments_are_skipped() {
        assert_eq!(
            pairs("&a=1&&b=2&"),
            owned(&[("a", "1"), ("b", "2")])
        );
    }

    #[test]
    fn empty_key_is_kept_for_the_assembler_to_reject() {
        assert_eq!(pairs("=v"), owned(&[("", "v")]));
    }

    #[test]
    fn brackets_survive_encoding() {
        assert_eq!(
            pairs("a%5Bb%5D%5B%5D=1&a[c]=2"),
            owned(&[("a[b][]", "1"), ("a[c]", "2")])
        );
    }

    #[test]
    fn plus_is_space_but_encoded_plus_is_literal() {
        assert_eq!(
            pairs("full+name=Ada+Lovelace&op=1%2B1"),
            owned(&[("full name", "Ada Lovelace"), ("op", "1+1")])
        );
    }

    #[test]
    fn multibyte_escapes_decode_as_utf8() {
        assert_eq!(decode_component("caf%C3%A9").expect("decode"), "café");
    }

    #[test]
    fn truncated_escape_is_malformed() {
        let err = parse_form_string("a=100%").expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::MalformedEncoding);
        assert_eq!(err.key(), Some("100%"));
    }

    #[test]
    fn non_hex_escape_is_malformed() {
        let err = parse_form_string("a%zz=1").expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::MalformedEncoding);
        assert!(err.message().unwrap_or_default().contains("%zz"));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = decode_component("%FF%FE").expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::MalformedEncoding);
    }

    #[test]
    fn pair_from_tuple() {
        assert_eq!(Pair::from(("a", "1")), Pair::new("a", "1"));
    }
}
