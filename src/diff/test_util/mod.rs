use serde_json::Value;

use crate::path::{Pointer, Segment};

use super::{Patch, PatchOp};

pub(crate) const SERVICES_SCHEMA: &str = include_str!("schemas/services.schema.json");

/// Applies a patch the RFC 6902 way: ops run left to right, `oldValue`
/// fields are ignored, `-` appends. Test-only; panics on paths that do not
/// resolve.
pub(crate) fn apply(doc: &Value, patch: &Patch) -> Value {
    let mut doc = doc.clone();
    for op in patch {
        apply_op(&mut doc, op);
    }
    doc
}

fn apply_op(doc: &mut Value, op: &PatchOp) {
    match op {
        PatchOp::Add { path, value } => insert(doc, path, value.clone()),
        PatchOp::Remove { path, .. } => {
            remove(doc, path);
        }
        PatchOp::Replace { path, value, .. } => {
            *locate(doc, path) = value.clone();
        }
        PatchOp::Move { from, path } => {
            let value = remove(doc, from);
            insert(doc, path, value);
        }
    }
}

fn locate<'a>(doc: &'a mut Value, path: &Pointer) -> &'a mut Value {
    let mut current = doc;
    for segment in path {
        current = step(current, segment);
    }
    current
}

fn step<'a>(value: &'a mut Value, segment: &Segment) -> &'a mut Value {
    match segment {
        Segment::Key(key) => value
            .get_mut(key.as_str())
            .expect("path resolves to an object member"),
        Segment::Index(index) => match value {
            // Numeric tokens address object members when the node is an
            // object rather than an array.
            Value::Object(map) => map
                .get_mut(&index.to_string())
                .expect("path resolves to a numeric object member"),
            other => other
                .get_mut(*index)
                .expect("path resolves to an array element"),
        },
        Segment::Append => panic!("`-` cannot be traversed, only added to"),
    }
}

fn insert(doc: &mut Value, path: &Pointer, value: Value) {
    if path.is_root() {
        *doc = value;
        return;
    }
    let parent = path.parent().unwrap();
    match (locate(doc, &parent), path.last().unwrap()) {
        (Value::Object(map), Segment::Key(key)) => {
            map.insert(key.clone(), value);
        }
        (Value::Object(map), Segment::Index(index)) => {
            map.insert(index.to_string(), value);
        }
        (Value::Array(items), Segment::Index(index)) => items.insert(*index, value),
        (Value::Array(items), Segment::Append) => items.push(value),
        _ => panic!("add target must be an object member or array position"),
    }
}

fn remove(doc: &mut Value, path: &Pointer) -> Value {
    let parent = path.parent().expect("cannot remove the root");
    match (locate(doc, &parent), path.last().unwrap()) {
        (Value::Object(map), Segment::Key(key)) => map
            .remove(key.as_str())
            .expect("removed member exists"),
        (Value::Object(map), Segment::Index(index)) => map
            .remove(&index.to_string())
            .expect("removed numeric member exists"),
        (Value::Array(items), Segment::Index(index)) => items.remove(*index),
        _ => panic!("remove target must be an object member or array element"),
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::json;

    use super::*;

    fn path(raw: &str) -> Pointer {
        raw.try_into().unwrap()
    }

    #[test]
    fn test_apply_add_remove_replace() {
        let doc = json!({"a": [1, 2], "b": 1});
        let patch = Patch::new(vec![
            PatchOp::replace(path("/b"), json!(2), json!(1)),
            PatchOp::remove(path("/a/0"), json!(1)),
            PatchOp::add(path("/a/-"), json!(3)),
            PatchOp::add(path("/c"), json!(true)),
        ]);

        let result = apply(&doc, &patch);

        check!(result == json!({"a": [2, 3], "b": 2, "c": true}));
    }

    #[test]
    fn test_apply_move() {
        let doc = json!({"a": [1, 2, 3]});
        let patch = Patch::new(vec![PatchOp::move_op(path("/a/2"), path("/a/0"))]);

        check!(apply(&doc, &patch) == json!({"a": [3, 1, 2]}));
    }

    #[test]
    fn test_apply_positional_insert() {
        let doc = json!(["b"]);
        let patch = Patch::new(vec![PatchOp::add(path("/0"), json!("a"))]);

        check!(apply(&doc, &patch) == json!(["a", "b"]));
    }
}
