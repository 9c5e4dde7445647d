//! Purpose: Fold an ordered pair sequence into a nested parameter tree.
//! Exports: `Assembler`, `assemble`.
//! Role: Core decode stage; interprets bracket paths and reconciles repeated keys.
//! Invariants: Pairs are applied strictly in order; the root is always an object.
//! Invariants: A path keeps the shape (scalar/list/object) first established for it.
//! Invariants: `x[][k]` extends the last list object unless it already holds `k`.
//! Notes: Any conflict or malformed key aborts the whole call; no partial results.

use crate::core::error::{Error, ErrorKind};
use crate::core::keypath::{KeyPath, Segment};
use crate::core::node::{Node, NodeKind, Object};
use crate::core::pair::Pair;

#[derive(Debug, Default)]
pub struct Assembler {
    root: Object,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one pair into the tree. After an error the tree is incomplete and should be dropped.
    pub fn push(&mut self, pair: &Pair) -> Result<(), Error> {
        let path = KeyPath::parse(&pair.key)?;
        let merge = Merge {
            key: &pair.key,
            value: &pair.value,
        };
        merge.apply(&mut self.root, &path.name, &path.segments)
    }

    pub fn finish(self) -> Object {
        self.root
    }
}

pub fn assemble<'a, I>(pairs: I) -> Result<Object, Error>
where
    I: IntoIterator<Item = &'a Pair>,
{
    let mut assembler = Assembler::new();
    let mut count = 0usize;
    for pair in pairs {
        if let Err(err) = assembler.push(pair) {
            tracing::debug!(key = %pair.key, kind = ?err.kind(), "params assembly failed");
            return Err(err);
        }
        count += 1;
    }
    let root = assembler.finish();
    tracing::trace!(pairs = count, params = root.len(), "assembled params");
    Ok(root)
}

struct Merge<'a> {
    key: &'a str,
    value: &'a str,
}

impl Merge<'_> {
    fn apply(&self, container: &mut Object, name: &str, segments: &[Segment]) -> Result<(), Error> {
        let Some((next, rest)) = segments.split_first() else {
            return match container.get_mut(name) {
                None => {
                    container.insert(name.to_string(), Node::Scalar(self.value.to_string()));
                    Ok(())
                }
                Some(Node::Scalar(existing)) => {
                    *existing = self.value.to_string();
                    Ok(())
                }
                Some(other) => Err(self.conflict(name, other.kind(), NodeKind::Scalar)),
            };
        };

        match next {
            Segment::Field(field) => {
                let child = self.object_slot(container, name)?;
                self.apply(child, field, rest)
            }
            Segment::Append => {
                let list = self.list_slot(container, name)?;
                match rest.split_first() {
                    None => {
                        list.push(Node::Scalar(self.value.to_string()));
                        Ok(())
                    }
                    Some((Segment::Field(field), tail)) => {
                        let extend_last = matches!(
                            list.last(),
                            Some(Node::Object(last)) if !last.contains_key(field)
                        );
                        if !extend_last {
                            list.push(Node::Object(Object::new()));
                        }
                        match list.last_mut() {
                            Some(Node::Object(target)) => self.apply(target, field, tail),
                            _ => Err(Error::new(ErrorKind::Internal)
                                .with_message("list element object missing after append")
                                .with_key(self.key)),
                        }
                    }
                    Some((Segment::Append, _)) => Err(Error::new(ErrorKind::MalformedKey)
                        .with_message("`[]` cannot directly follow another `[]`")
                        .with_key(self.key)
                        .with_hint("Name the field inside each list element, e.g. `rows[][cells][]`.")),
                }
            }
        }
    }

    fn object_slot<'c>(&self, container: &'c mut Object, name: &str) -> Result<&'c mut Object, Error> {
        let slot = container
            .entry(name.to_string())
            .or_insert_with(|| Node::Object(Object::new()));
        match slot {
            Node::Object(map) => Ok(map),
            other => Err(self.conflict(name, other.kind(), NodeKind::Object)),
        }
    }

    fn list_slot<'c>(&self, container: &'c mut Object, name: &str) -> Result<&'c mut Vec<Node>, Error> {
        let slot = container
            .entry(name.to_string())
            .or_insert_with(|| Node::List(Vec::new()));
        match slot {
            Node::List(items) => Ok(items),
            other => Err(self.conflict(name, other.kind(), NodeKind::List)),
        }
    }

    fn conflict(&self, name: &str, found: NodeKind, wanted: NodeKind) -> Error {
        Error::new(ErrorKind::Conflict)
            .with_message(format!(
                "`{name}` is already a {found} but this key needs a {wanted}"
            ))
            .with_key(self.key)
            .with_hint("Send each parameter path with one shape, e.g. not both `a=1` and `a[]=2`.")
    }
}

#[cfg(test)]
mod tests {
    use super::{Assembler, assemble};
    use crate::core::error::ErrorKind;
    use crate::core::node::{Node, Object};
    use crate::core::pair::Pair;
    use serde_json::{Value, json};

    fn run(items: &[(&str, &str)]) -> Result<Value, ErrorKind> {
        let pairs: Vec<Pair> = items.iter().map(|&pair| Pair::from(pair)).collect();
        assemble(&pairs)
            .map(|root| Node::Object(root).to_json())
            .map_err(|err| err.kind())
    }

    #[test]
    fn empty_sequence_yields_empty_object() {
        assert_eq!(run(&[]), Ok(json!({})));
    }

    #[test]
    fn plain_key_sets_scalar() {
        assert_eq!(run(&[("a", "1")]), Ok(json!({"a": "1"})));
    }

    #[test]
    fn repeated_scalar_overwrites() {
        assert_eq!(run(&[("a", "1"), ("a", "2")]), Ok(json!({"a": "2"})));
    }

    #[test]
    fn append_marker_builds_list_in_order() {
        assert_eq!(
            run(&[("a[]", "1"), ("a[]", "2")]),
            Ok(json!({"a": ["1", "2"]}))
        );
    }

    #[test]
    fn named_segments_build_object() {
        assert_eq!(
            run(&[("a[b]", "1"), ("a[c]", "2")]),
            Ok(json!({"a": {"b": "1", "c": "2"}}))
        );
    }

    #[test]
    fn nested_list_under_object() {
        assert_eq!(
            run(&[("a[b][]", "1"), ("a[b][]", "2")]),
            Ok(json!({"a": {"b": ["1", "2"]}}))
        );
    }

    #[test]
    fn distinct_fields_extend_last_list_object() {
        assert_eq!(
            run(&[("a[][x]", "1"), ("a[][y]", "2")]),
            Ok(json!({"a": [{"x": "1", "y": "2"}]}))
        );
    }

    #[test]
    fn repeated_field_starts_new_list_object() {
        assert_eq!(
            run(&[("a[][x]", "1"), ("a[][x]", "2")]),
            Ok(json!({"a": [{"x": "1"}, {"x": "2"}]}))
        );
    }

    #[test]
    fn list_objects_match_on_first_field_only() {
        let result = run(&[
            ("items[][price][amount]", "10"),
            ("items[][price][currency]", "usd"),
            ("items[][quantity]", "2"),
            ("items[][price][amount]", "20"),
            ("items[][quantity]", "1"),
        ]);
        assert_eq!(
            result,
            Ok(json!({"items": [
                {"price": {"amount": "10"}},
                {"price": {"currency": "usd"}, "quantity": "2"},
                {"price": {"amount": "20"}, "quantity": "1"}
            ]}))
        );
    }

    #[test]
    fn scalar_then_list_element_object_gets_new_object() {
        assert_eq!(
            run(&[("a[]", "raw"), ("a[][x]", "1")]),
            Ok(json!({"a": ["raw", {"x": "1"}]}))
        );
    }

    #[test]
    fn scalar_then_list_conflicts() {
        assert_eq!(run(&[("a", "1"), ("a[]", "2")]), Err(ErrorKind::Conflict));
    }

    #[test]
    fn list_then_scalar_conflicts() {
        assert_eq!(run(&[("a[]", "1"), ("a", "2")]), Err(ErrorKind::Conflict));
    }

    #[test]
    fn object_then_list_conflicts() {
        assert_eq!(run(&[("a[b]", "1"), ("a[]", "2")]), Err(ErrorKind::Conflict));
    }

    #[test]
    fn list_then_object_conflicts() {
        assert_eq!(run(&[("a[]", "1"), ("a[b]", "2")]), Err(ErrorKind::Conflict));
    }

    #[test]
    fn nested_conflict_inside_list_object() {
        assert_eq!(
            run(&[("a[][x][y]", "1"), ("a[][z]", "2"), ("a[][x]", "3")]),
            Ok(json!({"a": [{"x": {"y": "1"}, "z": "2"}, {"x": "3"}]}))
        );
        assert_eq!(
            run(&[("a[b][c]", "1"), ("a[b]", "2")]),
            Err(ErrorKind::Conflict)
        );
    }

    #[test]
    fn malformed_key_aborts() {
        assert_eq!(run(&[("a", "1"), ("b[", "2")]), Err(ErrorKind::MalformedKey));
        assert_eq!(run(&[("", "1")]), Err(ErrorKind::MalformedKey));
    }

    #[test]
    fn double_append_marker_is_malformed() {
        assert_eq!(run(&[("a[][]", "1")]), Err(ErrorKind::MalformedKey));
    }

    #[test]
    fn conflict_error_names_key_and_kinds() {
        let pairs = vec![Pair::new("a[b]", "1"), Pair::new("a[b][]", "2")];
        let err = assemble(&pairs).expect_err("conflict");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.key(), Some("a[b][]"));
        let message = err.message().expect("message");
        assert!(message.contains("`b`"), "{message}");
        assert!(message.contains("scalar"), "{message}");
        assert!(message.contains("list"), "{message}");
    }

    #[test]
    fn incremental_push_matches_batch() {
        let pairs = vec![
            Pair::new("user[name]", "ada"),
            Pair::new("user[tags][]", "math"),
            Pair::new("user[tags][]", "engines"),
        ];
        let mut assembler = Assembler::new();
        for pair in &pairs {
            assembler.push(pair).expect("push");
        }
        assert_eq!(assembler.finish(), assemble(&pairs).expect("assemble"));
    }

    #[test]
    fn root_keys_keep_first_seen_order() {
        let pairs = vec![
            Pair::new("z", "1"),
            Pair::new("a", "2"),
            Pair::new("m[]", "3"),
            Pair::new("z", "4"),
        ];
        let root: Object = assemble(&pairs).expect("assemble");
        let keys: Vec<&str> = root.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
