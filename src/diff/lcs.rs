use serde_json::Value;

use crate::path::Pointer;
use crate::plan::ArrayPlan;

use super::{DiffEngine, Patch, PatchOp};

/// Positional array diff over a Myers O((N+M)·D) edit script. Common
/// elements recurse into the engine for element-level refinement; an
/// adjacent remove+add pair coalesces into a replace.
///
/// Ops are emitted against target indices: once the prefix of the array
/// matches the destination, the live index of the element under the cursor
/// is the number of settled elements, regardless of where it started.
pub(super) fn diff(
    engine: &mut DiffEngine,
    left: &[Value],
    right: &[Value],
    plan: Option<&ArrayPlan>,
    path: &Pointer,
    depth: usize,
    out: &mut Patch,
) {
    let script = myers_script(engine, left, right, plan);

    let mut settled = 0usize; // prefix length already matching the target
    let mut current_len = left.len();
    let mut idx = 0;
    while idx < script.len() {
        match script[idx] {
            Edit::Common(i, j) => {
                engine.diff_values(
                    Some(&left[i]),
                    Some(&right[j]),
                    &path.push_index(settled),
                    depth + 1,
                    out,
                );
                settled += 1;
                idx += 1;
            }
            Edit::Remove(i) => {
                if let Some(Edit::Add(j)) = script.get(idx + 1) {
                    out.push(PatchOp::replace(
                        path.push_index(settled),
                        right[*j].clone(),
                        left[i].clone(),
                    ));
                    settled += 1;
                    idx += 2;
                } else {
                    out.push(PatchOp::remove(path.push_index(settled), left[i].clone()));
                    current_len -= 1;
                    idx += 1;
                }
            }
            Edit::Add(j) => {
                let pointer = if settled == current_len {
                    path.push_append()
                } else {
                    path.push_index(settled)
                };
                out.push(PatchOp::add(pointer, right[j].clone()));
                current_len += 1;
                settled += 1;
                idx += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Edit {
    /// Aligned pair (source index, target index).
    Common(usize, usize),
    Remove(usize),
    Add(usize),
}

/// Greedy forward Myers search with a per-round snapshot of the furthest-x
/// array, backtracked into an edit script. Element equality threads the
/// plan so keyed short-circuits apply during alignment too.
fn myers_script(
    engine: &mut DiffEngine,
    left: &[Value],
    right: &[Value],
    plan: Option<&ArrayPlan>,
) -> Vec<Edit> {
    let n = left.len();
    let m = right.len();
    if n == 0 {
        return (0..m).map(Edit::Add).collect();
    }
    if m == 0 {
        return (0..n).map(Edit::Remove).collect();
    }

    let max = n + m;
    let offset = max as isize;
    let mut v = vec![0isize; 2 * max + 1];
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut final_d = 0isize;

    'search: for d in 0..=(max as isize) {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1] // step down: insertion
            } else {
                v[idx - 1] + 1 // step right: deletion
            };
            let mut y = x - k;
            while (x as usize) < n
                && (y as usize) < m
                && engine.elements_equal(&left[x as usize], &right[y as usize], plan)
            {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x as usize >= n && y as usize >= m {
                final_d = d;
                break 'search;
            }
            k += 2;
        }
    }

    backtrack(&trace, n, m, offset, final_d)
}

fn backtrack(trace: &[Vec<isize>], n: usize, m: usize, offset: isize, final_d: isize) -> Vec<Edit> {
    let mut script_rev = Vec::new();
    let mut x = n as isize;
    let mut y = m as isize;

    let mut d = final_d;
    while d > 0 {
        let v = &trace[d as usize];
        let k = x - y;
        let idx = (k + offset) as usize;
        let down = k == -d || (k != d && v[idx - 1] < v[idx + 1]);
        let prev_k = if down { k + 1 } else { k - 1 };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            script_rev.push(Edit::Common(x as usize, y as usize));
        }
        if down {
            y -= 1;
            script_rev.push(Edit::Add(y as usize));
        } else {
            x -= 1;
            script_rev.push(Edit::Remove(x as usize));
        }
        d -= 1;
    }

    while x > 0 && y > 0 {
        x -= 1;
        y -= 1;
        script_rev.push(Edit::Common(x as usize, y as usize));
    }

    script_rev.reverse();
    script_rev
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::{Value, json};

    use crate::diff::DiffOptions;
    use crate::plan::Plan;

    use super::*;

    fn run(left: &Value, right: &Value) -> Patch {
        let plan = Plan::default();
        let mut engine = DiffEngine::new(&plan, DiffOptions::default());
        let mut out = Patch::default();
        diff(
            &mut engine,
            left.as_array().unwrap(),
            right.as_array().unwrap(),
            None,
            &Pointer::root(),
            0,
            &mut out,
        );
        out
    }

    #[test]
    fn test_equal_arrays_are_silent() {
        let left = json!([1, 2, 3]);
        check!(run(&left, &left.clone()).is_empty());
    }

    #[test]
    fn test_middle_removal_and_tail_append() {
        let left = json!(["a", "b", "c"]);
        let right = json!(["a", "c", "d"]);

        let patch = run(&left, &right);

        let expected = Patch::new(vec![
            PatchOp::remove("/1".try_into().unwrap(), json!("b")),
            PatchOp::add("/-".try_into().unwrap(), json!("d")),
        ]);
        check!(patch == expected);
    }

    #[test]
    fn test_adjacent_remove_add_coalesce_to_replace() {
        let left = json!(["x"]);
        let right = json!(["y"]);

        let patch = run(&left, &right);

        let expected = Patch::new(vec![PatchOp::replace(
            "/0".try_into().unwrap(),
            json!("y"),
            json!("x"),
        )]);
        check!(patch == expected);
    }

    #[test]
    fn test_common_elements_recurse() {
        let left = json!([{"id": 1, "v": 1}, {"id": 2, "v": 2}]);
        let right = json!([{"id": 1, "v": 9}, {"id": 2, "v": 2}]);

        let patch = run(&left, &right);

        // The element is not equal, so it is not "common"; the whole element
        // is replaced via the coalescing pass.
        check!(patch.len() == 1);
        check!(patch[0].path().to_string() == "/0");
    }

    #[test]
    fn test_front_insertion() {
        let left = json!(["b", "c"]);
        let right = json!(["a", "b", "c"]);

        let patch = run(&left, &right);

        let expected = Patch::new(vec![PatchOp::add("/0".try_into().unwrap(), json!("a"))]);
        check!(patch == expected);
    }

    #[test]
    fn test_empty_to_full_appends() {
        let left = json!([]);
        let right = json!([1, 2]);

        let patch = run(&left, &right);

        check!(patch.len() == 2);
        check!(patch.iter().all(|op| op.path().to_string() == "/-"));
    }

    #[test]
    fn test_full_to_empty_removes_in_place() {
        let left = json!([1, 2]);
        let right = json!([]);

        let patch = run(&left, &right);

        // Both removals target index 0: after the first lands, the second
        // element has shifted down.
        check!(patch.len() == 2);
        check!(patch.iter().all(|op| op.path().to_string() == "/0"));
    }
}
