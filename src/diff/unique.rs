use serde_json::Value;

use crate::eq::deep_equal;
use crate::path::Pointer;

use super::{Patch, PatchOp};

/// Set-flavored diff for arrays of primitives. Mismatches over the common
/// prefix become replaces, a longer source drops its tail from the end, a
/// longer target appends. Far fewer ops than an edit script when the inputs
/// are genuinely sets; not positionally minimal.
pub(super) fn diff(left: &[Value], right: &[Value], path: &Pointer, out: &mut Patch) {
    let common = left.len().min(right.len());

    for i in 0..common {
        if !deep_equal(&left[i], &right[i]) {
            out.push(PatchOp::replace(
                path.push_index(i),
                right[i].clone(),
                left[i].clone(),
            ));
        }
    }

    for i in (common..left.len()).rev() {
        out.push(PatchOp::remove(path.push_index(i), left[i].clone()));
    }

    for value in &right[common..] {
        out.push(PatchOp::add(path.push_append(), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::{Value, json};

    use super::*;

    fn run(left: &Value, right: &Value) -> Patch {
        let mut out = Patch::default();
        diff(
            left.as_array().unwrap(),
            right.as_array().unwrap(),
            &Pointer::root(),
            &mut out,
        );
        out
    }

    #[test]
    fn test_disjoint_sets_become_replaces() {
        let left = json!(["a", "b", "c", "d"]);
        let right = json!(["x", "y", "z", "w"]);

        let patch = run(&left, &right);

        check!(patch.len() == 4);
        check!(patch.iter().all(|op| matches!(op, PatchOp::Replace { .. })));
    }

    #[test]
    fn test_shrinking_removes_tail_descending() {
        let left = json!(["a", "b", "c"]);
        let right = json!(["a"]);

        let patch = run(&left, &right);

        let paths: Vec<String> = patch.iter().map(|op| op.path().to_string()).collect();
        check!(paths == vec!["/2", "/1"]);
    }

    #[test]
    fn test_growing_appends() {
        let left = json!(["a"]);
        let right = json!(["a", "b", "c"]);

        let patch = run(&left, &right);

        let expected = Patch::new(vec![
            PatchOp::add("/-".try_into().unwrap(), json!("b")),
            PatchOp::add("/-".try_into().unwrap(), json!("c")),
        ]);
        check!(patch == expected);
    }

    #[test]
    fn test_shrink_with_overlap_round_trips() {
        let left = json!(["a", "b", "c"]);
        let right = json!(["c"]);

        let patch = run(&left, &right);

        // replace /0 <- "c", then drop the tail from the end
        check!(patch.len() == 3);
        check!(patch[0] == PatchOp::replace("/0".try_into().unwrap(), json!("c"), json!("a")));
    }

    #[test]
    fn test_empty_sides() {
        check!(run(&json!([]), &json!([])).is_empty());

        let cleared = run(&json!(["a"]), &json!([]));
        check!(cleared.len() == 1);
        check!(matches!(&cleared[0], PatchOp::Remove { .. }));
    }
}
