use serde_json::{Map, Value};

use crate::eq::{EqMemo, deep_equal, equal_planned, equal_with_hint};
use crate::path::Pointer;
use crate::plan::{ArrayPlan, ArrayStrategy, Plan};

use super::{DiffOptions, Patch, PatchOp};

/// Recursive comparator. One engine serves one `diff` call; the equality
/// memo it carries is only valid while the two documents stay borrowed.
pub(crate) struct DiffEngine<'p> {
    plan: &'p Plan,
    options: DiffOptions,
    memo: EqMemo,
}

impl<'p> DiffEngine<'p> {
    pub(crate) fn new(plan: &'p Plan, options: DiffOptions) -> Self {
        DiffEngine {
            plan,
            options,
            memo: EqMemo::default(),
        }
    }

    pub(crate) fn diff(&mut self, src: &Value, dst: &Value) -> Patch {
        let mut out = Patch::default();
        self.diff_values(Some(src), Some(dst), &Pointer::root(), 0, &mut out);
        out
    }

    /// `None` stands for "not present", so one code path covers member
    /// addition and removal alongside value changes.
    pub(super) fn diff_values(
        &mut self,
        left: Option<&Value>,
        right: Option<&Value>,
        path: &Pointer,
        depth: usize,
        out: &mut Patch,
    ) {
        match (left, right) {
            (None, None) => {}
            (None, Some(right)) => out.push(PatchOp::add(path.clone(), right.clone())),
            (Some(left), None) => out.push(PatchOp::remove(path.clone(), left.clone())),
            (Some(left), Some(right)) => self.diff_present(left, right, path, depth, out),
        }
    }

    fn diff_present(
        &mut self,
        left: &Value,
        right: &Value,
        path: &Pointer,
        depth: usize,
        out: &mut Patch,
    ) {
        if std::ptr::eq(left, right) {
            return;
        }

        if depth >= self.options.depth_limit {
            // Degrade to a whole-subtree replace instead of recursing further.
            if !deep_equal(left, right) {
                out.push(PatchOp::replace(path.clone(), right.clone(), left.clone()));
            }
            return;
        }

        match (left, right) {
            (Value::Object(left_map), Value::Object(right_map)) => {
                self.diff_object(left_map, right_map, path, depth, out)
            }
            (Value::Array(left_array), Value::Array(right_array)) => {
                self.diff_array(left_array, right_array, path, depth, out)
            }
            (left, right) if deep_equal(left, right) => {} // equal scalars, no diff
            (left, right) => {
                out.push(PatchOp::replace(path.clone(), right.clone(), left.clone()))
            }
        }
    }

    /// Walks the union of keys: source keys in insertion order first, then
    /// keys only the target has. Keys are escaped per RFC 6901.
    fn diff_object(
        &mut self,
        left_map: &Map<String, Value>,
        right_map: &Map<String, Value>,
        path: &Pointer,
        depth: usize,
        out: &mut Patch,
    ) {
        for (key, left_value) in left_map {
            let child_path = path.push_key(key);
            self.diff_values(
                Some(left_value),
                right_map.get(key),
                &child_path,
                depth + 1,
                out,
            );
        }

        for (key, right_value) in right_map {
            if !left_map.contains_key(key) {
                let child_path = path.push_key(key);
                self.diff_values(None, Some(right_value), &child_path, depth + 1, out);
            }
        }
    }

    /// Dispatches on the plan entry for this location. Without a plan the
    /// array falls back to the positional Myers diff.
    fn diff_array(
        &mut self,
        left: &[Value],
        right: &[Value],
        path: &Pointer,
        depth: usize,
        out: &mut Patch,
    ) {
        let plan = self.plan;
        match plan.get(path) {
            Some(entry)
                if entry.strategy == ArrayStrategy::PrimaryKey
                    && entry.primary_key.is_some() =>
            {
                super::keyed::diff(self, left, right, entry, path, depth, out)
            }
            Some(entry) if entry.strategy == ArrayStrategy::Unique => {
                super::unique::diff(left, right, path, out)
            }
            entry => super::lcs::diff(self, left, right, entry, path, depth, out),
        }
    }

    /// Element comparison for array alignment: plan-aware when the location
    /// is planned, plain memoized structural equality otherwise.
    pub(super) fn elements_equal(
        &mut self,
        a: &Value,
        b: &Value,
        plan: Option<&ArrayPlan>,
    ) -> bool {
        match plan {
            Some(entry) => equal_planned(a, b, entry, &mut self.memo),
            None => equal_with_hint(a, b, &[], &mut self.memo),
        }
    }

    pub(super) fn planned_equal(&mut self, a: &Value, b: &Value, plan: &ArrayPlan) -> bool {
        equal_planned(a, b, plan, &mut self.memo)
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::json;

    use crate::diff::DiffOptions;
    use crate::plan::Plan;

    use super::*;

    fn diff(left: &Value, right: &Value) -> Patch {
        let plan = Plan::default();
        DiffEngine::new(&plan, DiffOptions::default()).diff(left, right)
    }

    fn path(raw: &str) -> Pointer {
        raw.try_into().unwrap()
    }

    #[test]
    fn test_equal_values_produce_no_ops() {
        let left = json!({"foo": [1, 2, {"bar": null}]});
        let right = left.clone();

        check!(diff(&left, &right).is_empty());
    }

    #[test]
    fn test_scalar_change_is_a_replace() {
        let left = json!({"foo": 43});
        let right = json!({"foo": 42});

        let patch = diff(&left, &right);

        let expected = Patch::new(vec![PatchOp::replace(path("/foo"), json!(42), json!(43))]);
        check!(patch == expected);
    }

    #[test]
    fn test_type_mismatch_is_a_replace() {
        let left = json!({"foo": "bar"});
        let right = json!({"foo": {"baz": 42}});

        let patch = diff(&left, &right);

        let expected = Patch::new(vec![PatchOp::replace(
            path("/foo"),
            json!({"baz": 42}),
            json!("bar"),
        )]);
        check!(patch == expected);
    }

    #[test]
    fn test_array_vs_object_is_a_replace() {
        let left = json!({"foo": []});
        let right = json!({"foo": {}});

        let patch = diff(&left, &right);

        check!(patch.len() == 1);
        check!(matches!(&patch[0], PatchOp::Replace { .. }));
    }

    #[test]
    fn test_missing_key_is_removed_with_old_value() {
        let left = json!({"foo": 43, "bar": 1});
        let right = json!({"foo": 43});

        let patch = diff(&left, &right);

        let expected = Patch::new(vec![PatchOp::remove(path("/bar"), json!(1))]);
        check!(patch == expected);
    }

    #[test]
    fn test_new_key_is_added() {
        let left = json!({"foo": 43});
        let right = json!({"foo": 43, "bar": 1});

        let patch = diff(&left, &right);

        let expected = Patch::new(vec![PatchOp::add(path("/bar"), json!(1))]);
        check!(patch == expected);
    }

    #[test]
    fn test_object_keys_are_escaped() {
        let left = json!({"a/b": 1, "m~n": 2});
        let right = json!({"a/b": 2, "m~n": 2});

        let patch = diff(&left, &right);

        check!(patch[0].path().to_string() == "/a~1b");
    }

    #[test]
    fn test_key_order_does_not_matter_for_identity() {
        let left = json!({"a": 1, "b": 2});
        let right = json!({"b": 2, "a": 1});

        check!(diff(&left, &right).is_empty());
    }

    #[test]
    fn test_depth_limit_degrades_to_replace() {
        let mut left = json!(1);
        let mut right = json!(2);
        for _ in 0..20 {
            left = json!({"n": left});
            right = json!({"n": right});
        }

        let plan = Plan::default();
        let patch =
            DiffEngine::new(&plan, DiffOptions { depth_limit: 5 }).diff(&left, &right);

        check!(patch.len() == 1);
        // The single op sits at the depth limit, not at the leaf.
        check!(patch[0].path().segments().len() == 5);
    }

    #[test]
    fn test_root_scalar_replace() {
        let patch = diff(&json!("foo"), &json!("bar"));

        let expected = Patch::new(vec![PatchOp::replace(
            Pointer::root(),
            json!("bar"),
            json!("foo"),
        )]);
        check!(patch == expected);
    }
}
