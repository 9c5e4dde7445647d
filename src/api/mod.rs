//! Purpose: Define the stable public Rust API boundary for formnest.
//! Exports: Core decode types and operations needed by the CLI, server, and embedders.
//! Role: Public, additive-only surface; hides module layout behind re-exports.
//! Invariants: Decoding never coerces scalar strings into other JSON types.
//! Invariants: Every decode failure is reported as an `Error` with a stable `ErrorKind`.

mod source;

pub use crate::core::assemble::{Assembler, assemble};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::keypath::{KeyPath, Segment};
pub use crate::core::node::{Node, NodeKind, Object, object_to_json};
pub use crate::core::pair::{Pair, decode_component, parse_form_string};
pub use source::{
    DEFAULT_MAX_BODY_BYTES, FieldKind, MULTIPART_MEDIA_TYPE, MultipartField, ParamOrigin,
    ParamSource, classify, content_type_essence,
};

/// Extract pairs from form-encoded text and assemble them in one step.
pub fn decode_form_string(input: &str) -> Result<Object, Error> {
    let pairs = parse_form_string(input)?;
    assemble(&pairs)
}
