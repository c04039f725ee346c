use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::path::Pointer;
use crate::plan::ArrayPlan;

use super::{DiffEngine, Patch, PatchOp};

/// Primary-key keyed array diff. Elements match by key, not position.
///
/// A pure permutation (same key set, every element equal under the plan)
/// emits no operations at all. In every other case the patch lands exactly
/// on the target: `Move` is never emitted, so common keys that fall out of
/// the destination's relative order are demoted to a remove+add pair whose
/// add carries the destination value. The longest run of common keys
/// already in destination order keeps its slots.
///
/// Emission order keeps the patch applicable left to right: child
/// modifications first (source indices still valid), then removals
/// (dropped keys and demoted movers) descending by source index, then
/// additions (new keys and demoted movers) ascending by destination index.
/// Additions below the post-removal length insert positionally; additions
/// at the tail append via `-`.
pub(super) fn diff(
    engine: &mut DiffEngine,
    left: &[Value],
    right: &[Value],
    plan: &ArrayPlan,
    path: &Pointer,
    depth: usize,
    out: &mut Patch,
) {
    let Some(key) = plan.primary_key.as_deref() else {
        return super::lcs::diff(engine, left, right, Some(plan), path, depth, out);
    };

    let left_index = KeyIndex::build(left, key);
    let right_index = KeyIndex::build(right, key);

    // Common keys in source order, with both positions.
    let common: Vec<(usize, usize)> = left_index
        .order
        .iter()
        .filter_map(|(k, i)| right_index.by_key.get(k).map(|&j| (*i, j)))
        .collect();
    let removed: Vec<usize> = left_index
        .order
        .iter()
        .filter(|(k, _)| !right_index.by_key.contains_key(k))
        .map(|(_, i)| *i)
        .collect();
    let added: Vec<usize> = right_index
        .order
        .iter()
        .filter(|(k, _)| !left_index.by_key.contains_key(k))
        .map(|(_, j)| *j)
        .collect();

    // A pure permutation is deliberately silent.
    if removed.is_empty()
        && added.is_empty()
        && common
            .iter()
            .all(|&(i, j)| engine.planned_equal(&left[i], &right[j], plan))
    {
        return;
    }

    // Common keys whose destination positions form the longest increasing
    // run stay in place; the rest are movers and get demoted below.
    let dst_positions: Vec<usize> = common.iter().map(|&(_, j)| j).collect();
    let stable: HashSet<usize> = longest_increasing_run(&dst_positions)
        .into_iter()
        .collect();

    // Child modifications for elements that keep their slot, source order.
    // Demoted movers need none: their add carries the destination value.
    for (ci, &(i, j)) in common.iter().enumerate() {
        if stable.contains(&ci) && !engine.planned_equal(&left[i], &right[j], plan) {
            engine.diff_values(
                Some(&left[i]),
                Some(&right[j]),
                &path.push_index(i),
                depth + 1,
                out,
            );
        }
    }

    // Removals, later indices first so earlier ones stay valid.
    let mut removal_indices = removed;
    removal_indices.extend(
        common
            .iter()
            .enumerate()
            .filter(|(ci, _)| !stable.contains(ci))
            .map(|(_, &(i, _))| i),
    );
    removal_indices.sort_unstable();
    for &i in removal_indices.iter().rev() {
        out.push(PatchOp::remove(path.push_index(i), left[i].clone()));
    }

    // Additions, ascending by destination index. Every destination slot
    // below the insertion point is already settled, so a positional insert
    // lands exactly; the tail appends.
    let mut insertion_indices = added;
    insertion_indices.extend(
        common
            .iter()
            .enumerate()
            .filter(|(ci, _)| !stable.contains(ci))
            .map(|(_, &(_, j))| j),
    );
    insertion_indices.sort_unstable();
    let mut current_len = left.len() - removal_indices.len();
    for &j in &insertion_indices {
        let pointer = if j >= current_len {
            path.push_append()
        } else {
            path.push_index(j)
        };
        out.push(PatchOp::add(pointer, right[j].clone()));
        current_len += 1;
    }
}

/// Indices into `seq` of one longest strictly increasing subsequence
/// (patience algorithm with predecessor links).
fn longest_increasing_run(seq: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut run = Vec::new();
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        run.push(i);
        cursor = prev[i];
    }
    run.reverse();
    run
}

struct KeyIndex {
    /// (key, index) pairs in array order, one entry per distinct key.
    order: Vec<(String, usize)>,
    by_key: HashMap<String, usize>,
}

impl KeyIndex {
    /// Elements lacking the key, or whose key is not a scalar, are left out
    /// of the index and never produce operations. Duplicate keys: the last
    /// occurrence wins.
    fn build(items: &[Value], key: &str) -> Self {
        let mut by_key = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            if let Some(k) = key_of(item, key) {
                by_key.insert(k, i);
            }
        }
        let mut order: Vec<(String, usize)> = by_key
            .iter()
            .map(|(k, i)| (k.clone(), *i))
            .collect();
        order.sort_by_key(|(_, i)| *i);
        KeyIndex { order, by_key }
    }
}

fn key_of(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
