use std::collections::BTreeMap;

use serde_json::Value;

use crate::diff::{Patch, PatchOp, create_patch};
use crate::format::{Formatter, LineRecord, Rendered, full_change};
use crate::path::{PathError, Pointer, Segment, lookup};
use crate::plan::{ArrayStrategy, Plan};

#[derive(Debug, thiserror::Error)]
pub enum StructuredError {
    #[error("Invalid pointer '{pointer}': {source}")]
    InvalidPointer {
        pointer: String,
        #[source]
        source: PathError,
    },

    #[error("Target '{pointer}' does not name an array")]
    InvalidTarget { pointer: String },
}

/// One side of the split: the documents under comparison, the operations
/// routed to them, and the pre-rendered unified line list.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChildBlock {
    pub original: Value,
    pub new: Value,
    pub patches: Patch,
    pub unified_lines: Vec<LineRecord>,
    pub added: u32,
    pub removed: u32,
}

/// A patch split around one keyed array: everything outside the array in
/// `parent_diff`, one block per element keyed by its primary key value.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StructuredDiff {
    pub parent_diff: ChildBlock,
    pub child_diffs: BTreeMap<String, ChildBlock>,
}

/// Splits a patch around the array at `target_path`. When `patches` is not
/// supplied, the patch is computed first with the same plan.
pub fn structured_diff(
    src: &Value,
    dst: &Value,
    plan: &Plan,
    target_path: &str,
    patches: Option<Patch>,
) -> Result<StructuredDiff, StructuredError> {
    structured_diff_with(src, dst, plan, target_path, patches, &Formatter::new())
}

/// Same as [`structured_diff`], reusing the caller's [`Formatter`] so the
/// rendering caches survive across calls.
pub fn structured_diff_with(
    src: &Value,
    dst: &Value,
    plan: &Plan,
    target_path: &str,
    patches: Option<Patch>,
    formatter: &Formatter,
) -> Result<StructuredDiff, StructuredError> {
    let target =
        Pointer::try_from(target_path).map_err(|source| StructuredError::InvalidPointer {
            pointer: target_path.to_string(),
            source,
        })?;

    let src_items = lookup(src, &target).and_then(Value::as_array);
    let dst_items = lookup(dst, &target).and_then(Value::as_array);
    if src_items.is_none() && dst_items.is_none() {
        return Err(StructuredError::InvalidTarget {
            pointer: target_path.to_string(),
        });
    }

    let patches = patches.unwrap_or_else(|| create_patch(src, dst, plan));

    let entry = plan.get(&target);
    let keyed = entry.filter(|e| {
        e.strategy == ArrayStrategy::PrimaryKey && e.primary_key.is_some()
    });

    let Some(entry) = keyed else {
        // No keyed plan: everything renders as the parent diff.
        let parent = build_parent(src, dst, &target, patches.into_inner(), "", formatter);
        return Ok(StructuredDiff {
            parent_diff: parent,
            child_diffs: BTreeMap::new(),
        });
    };
    let plan_fp = entry.fingerprint();
    let key_field = entry.primary_key.as_deref().unwrap_or_default();

    let empty = Vec::new();
    let src_items = src_items.unwrap_or(&empty);
    let dst_items = dst_items.unwrap_or(&empty);

    let mut parent_patches = Vec::new();
    let mut child_patches: BTreeMap<String, Vec<PatchOp>> = BTreeMap::new();
    for op in &patches {
        match route(op, &target, src_items, key_field) {
            Route::Parent => parent_patches.push(op.clone()),
            Route::Child(key, rel) => child_patches
                .entry(key)
                .or_default()
                .push(op.with_path(rel)),
        }
    }

    let mut child_diffs = BTreeMap::new();
    for key in child_keys(src_items, dst_items, key_field) {
        let original = element_by_key(src_items, key_field, &key);
        let new = element_by_key(dst_items, key_field, &key);
        let ops = child_patches.remove(&key).unwrap_or_default();
        let block = build_child(original, new, ops, &plan_fp, formatter);
        child_diffs.insert(key, block);
    }
    // Ops whose child never materialized (malformed paths) fold back into
    // the parent.
    for (_, ops) in child_patches {
        parent_patches.extend(ops);
    }

    let parent_diff = build_parent(src, dst, &target, parent_patches, &plan_fp, formatter);

    Ok(StructuredDiff {
        parent_diff,
        child_diffs,
    })
}

enum Route {
    Parent,
    Child(String, Pointer),
}

/// Assigns one operation to the parent diff or to a child keyed by the
/// primary key value. An op at `target/i/...` belongs to the source element
/// at `i`; a leaf `add` (positional or `-`) belongs to the inserted value.
/// Malformed append ops fall back to the parent.
fn route(op: &PatchOp, target: &Pointer, src_items: &[Value], key_field: &str) -> Route {
    if matches!(op, PatchOp::Move { .. }) {
        return Route::Parent;
    }
    let Some(rel) = op.path().strip_prefix(target) else {
        return Route::Parent;
    };
    let Some(first) = rel.segments().first() else {
        // The op targets the array itself.
        return Route::Parent;
    };

    match first {
        Segment::Index(i) => {
            if rel.segments().len() > 1 {
                match source_key(src_items, *i, key_field) {
                    Some(key) => {
                        let rel_child = Pointer {
                            segments: rel.segments()[1..].to_vec(),
                        };
                        Route::Child(key, rel_child)
                    }
                    None => Route::Parent,
                }
            } else {
                let key = match op {
                    PatchOp::Add { value, .. } => scalar_key(value.get(key_field)),
                    _ => source_key(src_items, *i, key_field),
                };
                match key {
                    Some(key) => Route::Child(key, Pointer::root()),
                    None => Route::Parent,
                }
            }
        }
        Segment::Append => match op {
            PatchOp::Add { value, .. } if rel.segments().len() == 1 => {
                match scalar_key(value.get(key_field)) {
                    Some(key) => Route::Child(key, Pointer::root()),
                    None => Route::Parent,
                }
            }
            _ => Route::Parent,
        },
        Segment::Key(_) => Route::Parent,
    }
}

/// All primary key values observed on either side: source order first, then
/// keys only the target has.
fn child_keys(src_items: &[Value], dst_items: &[Value], key_field: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for item in src_items.iter().chain(dst_items) {
        if let Some(key) = scalar_key(item.get(key_field))
            && !keys.contains(&key)
        {
            keys.push(key);
        }
    }
    keys
}

fn source_key(items: &[Value], index: usize, key_field: &str) -> Option<String> {
    scalar_key(items.get(index)?.get(key_field))
}

fn scalar_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn element_by_key<'a>(items: &'a [Value], key_field: &str, key: &str) -> Option<&'a Value> {
    items
        .iter()
        .find(|item| scalar_key(item.get(key_field)).as_deref() == Some(key))
}

fn build_child(
    original: Option<&Value>,
    new: Option<&Value>,
    ops: Vec<PatchOp>,
    plan_fp: &str,
    formatter: &Formatter,
) -> ChildBlock {
    match (original, new) {
        (Some(original), Some(new)) => {
            let diff = formatter.unified(original, new, &ops, plan_fp);
            ChildBlock {
                original: original.clone(),
                new: new.clone(),
                patches: Patch::new(ops),
                unified_lines: diff.lines.clone(),
                added: diff.added,
                removed: diff.removed,
            }
        }
        (Some(original), None) => {
            // Wholly removed child: every line removed, nothing added.
            let diff = full_change(&formatter.rendered(original), &empty_rendered());
            ChildBlock {
                original: original.clone(),
                new: Value::Null,
                patches: Patch::new(ops),
                added: diff.added,
                removed: diff.removed,
                unified_lines: diff.lines,
            }
        }
        (None, Some(new)) => {
            let diff = full_change(&empty_rendered(), &formatter.rendered(new));
            ChildBlock {
                original: Value::Null,
                new: new.clone(),
                patches: Patch::new(ops),
                added: diff.added,
                removed: diff.removed,
                unified_lines: diff.lines,
            }
        }
        (None, None) => ChildBlock {
            original: Value::Null,
            new: Value::Null,
            patches: Patch::new(ops),
            unified_lines: Vec::new(),
            added: 0,
            removed: 0,
        },
    }
}

/// Renders the object containing the target array, with the array key
/// removed, on both sides. Parent op paths under that container are
/// rewritten relative to it; others stay absolute and rely on the ancestor
/// fallback of the range lookup.
fn build_parent(
    src: &Value,
    dst: &Value,
    target: &Pointer,
    ops: Vec<PatchOp>,
    plan_fp: &str,
    formatter: &Formatter,
) -> ChildBlock {
    let container = target.parent().unwrap_or_default();
    let array_key = match target.last() {
        Some(Segment::Key(key)) => Some(key.clone()),
        _ => None,
    };

    let strip = |doc: &Value| -> Value {
        let Some(found) = lookup(doc, &container) else {
            return Value::Null;
        };
        let mut copy = found.clone();
        if let (Value::Object(map), Some(key)) = (&mut copy, &array_key) {
            // shift_remove keeps the remaining members in document order.
            map.shift_remove(key.as_str());
        } else if target.is_root() {
            // A root-level target array leaves nothing outside it.
            return Value::Null;
        }
        copy
    };

    let stripped_src = strip(src);
    let stripped_dst = strip(dst);

    let rewritten: Vec<PatchOp> = ops
        .into_iter()
        .map(|op| match op.path().strip_prefix(&container) {
            Some(rel) => op.with_path(rel),
            None => op,
        })
        .collect();

    let diff = formatter.unified(&stripped_src, &stripped_dst, &rewritten, plan_fp);
    ChildBlock {
        original: stripped_src,
        new: stripped_dst,
        patches: Patch::new(rewritten),
        unified_lines: diff.lines.clone(),
        added: diff.added,
        removed: diff.removed,
    }
}

fn empty_rendered() -> Rendered {
    Rendered {
        lines: Vec::new(),
        map: crate::format::PathMap::default(),
    }
}
