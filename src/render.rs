//! Purpose: Render decoded parameter trees as JSON text with optional ANSI colorization.
//! Exports: `render_envelope`, `render_node`, `pairs_node`.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: Pretty output without color equals `serde_json::to_string_pretty`.
//! Invariants: Compact output equals `serde_json::to_string`; ANSI only when enabled.
use formnest::api::{Node, Pair};
use serde_json::json;

const INDENT: &str = "  ";

// Conservative 8/16-color palette for broad terminal compatibility.
const COLOR_KEY: &str = "36";
const COLOR_SCALAR: &str = "32";
const COLOR_PUNCT: &str = "39";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Layout {
    Compact,
    Pretty { color: bool },
}

/// Render `{"<label>": <node>}`.
pub fn render_envelope(label: &str, node: &Node, layout: Layout) -> String {
    match layout {
        Layout::Compact => serde_json::to_string(&json!({ label: node }))
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string()),
        Layout::Pretty { color } => {
            let mut out = String::new();
            push_colored("{", COLOR_PUNCT, color, &mut out);
            out.push('\n');
            push_indent(1, &mut out);
            push_colored(&encode_str(label), COLOR_KEY, color, &mut out);
            push_colored(":", COLOR_PUNCT, color, &mut out);
            out.push(' ');
            write_node(node, 1, color, &mut out);
            out.push('\n');
            push_colored("}", COLOR_PUNCT, color, &mut out);
            out
        }
    }
}

/// Render a bare node with no label wrapper.
pub fn render_node(node: &Node, layout: Layout) -> String {
    match layout {
        Layout::Compact => serde_json::to_string(node)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string()),
        Layout::Pretty { color } => {
            let mut out = String::new();
            write_node(node, 0, color, &mut out);
            out
        }
    }
}

/// Pairs rendered as a list of `[key, value]` lists.
pub fn pairs_node(pairs: &[Pair]) -> Node {
    Node::List(
        pairs
            .iter()
            .map(|pair| {
                Node::List(vec![
                    Node::from(pair.key.as_str()),
                    Node::from(pair.value.as_str()),
                ])
            })
            .collect(),
    )
}

fn write_node(node: &Node, indent: usize, color: bool, out: &mut String) {
    match node {
        Node::Scalar(text) => push_colored(&encode_str(text), COLOR_SCALAR, color, out),
        Node::List(items) => {
            if items.is_empty() {
                push_colored("[]", COLOR_PUNCT, color, out);
                return;
            }
            push_colored("[", COLOR_PUNCT, color, out);
            out.push('\n');
            for (idx, item) in items.iter().enumerate() {
                push_indent(indent + 1, out);
                write_node(item, indent + 1, color, out);
                if idx + 1 < items.len() {
                    push_colored(",", COLOR_PUNCT, color, out);
                }
                out.push('\n');
            }
            push_indent(indent, out);
            push_colored("]", COLOR_PUNCT, color, out);
        }
        Node::Object(map) => {
            if map.is_empty() {
                push_colored("{}", COLOR_PUNCT, color, out);
                return;
            }
            push_colored("{", COLOR_PUNCT, color, out);
            out.push('\n');
            for (idx, (key, value)) in map.iter().enumerate() {
                push_indent(indent + 1, out);
                push_colored(&encode_str(key), COLOR_KEY, color, out);
                push_colored(":", COLOR_PUNCT, color, out);
                out.push(' ');
                write_node(value, indent + 1, color, out);
                if idx + 1 < map.len() {
                    push_colored(",", COLOR_PUNCT, color, out);
                }
                out.push('\n');
            }
            push_indent(indent, out);
            push_colored("}", COLOR_PUNCT, color, out);
        }
    }
}

fn encode_str(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

fn push_colored(text: &str, color: &str, enabled: bool, out: &mut String) {
    if !enabled {
        out.push_str(text);
        return;
    }
    out.push_str("\u{1b}[");
    out.push_str(color);
    out.push('m');
    out.push_str(text);
    out.push_str("\u{1b}[0m");
}
