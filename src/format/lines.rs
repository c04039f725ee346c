use serde_json::Value;

use crate::diff::PatchOp;

use super::render::{Rendered, resolve_for_side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Added,
    Removed,
    Unchanged,
}

/// One line of the side-by-side rendering. `key` is stable across renders so
/// UI consumers can track rows.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LineRecord {
    pub kind: LineKind,
    pub content: String,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FormattedDiff {
    pub lines: Vec<LineRecord>,
    pub added: u32,
    pub removed: u32,
}

/// Marks the affected lines on both renderings from the patch paths, then
/// merges the two line lists with a two-cursor walk: matched unchanged pairs
/// emit one row, otherwise contiguous removed source lines drain before
/// contiguous added target lines.
pub(crate) fn unified(
    src: &Value,
    dst: &Value,
    src_rendered: &Rendered,
    dst_rendered: &Rendered,
    patches: &[PatchOp],
) -> FormattedDiff {
    let mut removed_marks = vec![false; src_rendered.lines.len()];
    let mut added_marks = vec![false; dst_rendered.lines.len()];

    for op in patches {
        if let PatchOp::Remove { path, .. } | PatchOp::Replace { path, .. } = op {
            let resolved = resolve_for_side(path, src, false);
            mark(&mut removed_marks, src_rendered.map.range(&resolved));
        }
        if let PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } = op {
            let resolved = resolve_for_side(path, dst, true);
            mark(&mut added_marks, dst_rendered.map.range(&resolved));
        }
    }

    let mut lines = Vec::new();
    let mut added = 0u32;
    let mut removed = 0u32;
    let (mut i, mut j) = (0usize, 0usize);
    let n = src_rendered.lines.len();
    let m = dst_rendered.lines.len();

    while i < n || j < m {
        if i < n && removed_marks[i] {
            lines.push(LineRecord {
                kind: LineKind::Removed,
                content: src_rendered.lines[i].clone(),
                old_line: Some(i as u32 + 1),
                new_line: None,
                key: format!("removed-{}", i + 1),
            });
            removed += 1;
            i += 1;
        } else if j < m && added_marks[j] {
            lines.push(LineRecord {
                kind: LineKind::Added,
                content: dst_rendered.lines[j].clone(),
                old_line: None,
                new_line: Some(j as u32 + 1),
                key: format!("added-{}", j + 1),
            });
            added += 1;
            j += 1;
        } else if i < n && j < m {
            lines.push(LineRecord {
                kind: LineKind::Unchanged,
                content: src_rendered.lines[i].clone(),
                old_line: Some(i as u32 + 1),
                new_line: Some(j as u32 + 1),
                key: format!("unchanged-{}-{}", i + 1, j + 1),
            });
            i += 1;
            j += 1;
        } else if i < n {
            // Source lines with no counterpart left on the target side.
            lines.push(LineRecord {
                kind: LineKind::Removed,
                content: src_rendered.lines[i].clone(),
                old_line: Some(i as u32 + 1),
                new_line: None,
                key: format!("removed-{}", i + 1),
            });
            removed += 1;
            i += 1;
        } else {
            lines.push(LineRecord {
                kind: LineKind::Added,
                content: dst_rendered.lines[j].clone(),
                old_line: None,
                new_line: Some(j as u32 + 1),
                key: format!("added-{}", j + 1),
            });
            added += 1;
            j += 1;
        }
    }

    FormattedDiff {
        lines,
        added,
        removed,
    }
}

/// Builds a diff where every source line is removed and every target line is
/// added; used for wholly inserted or deleted children.
pub(crate) fn full_change(src_rendered: &Rendered, dst_rendered: &Rendered) -> FormattedDiff {
    let mut lines = Vec::new();
    for (i, content) in src_rendered.lines.iter().enumerate() {
        lines.push(LineRecord {
            kind: LineKind::Removed,
            content: content.clone(),
            old_line: Some(i as u32 + 1),
            new_line: None,
            key: format!("removed-{}", i + 1),
        });
    }
    for (j, content) in dst_rendered.lines.iter().enumerate() {
        lines.push(LineRecord {
            kind: LineKind::Added,
            content: content.clone(),
            old_line: None,
            new_line: Some(j as u32 + 1),
            key: format!("added-{}", j + 1),
        });
    }
    FormattedDiff {
        removed: src_rendered.lines.len() as u32,
        added: dst_rendered.lines.len() as u32,
        lines,
    }
}

fn mark(marks: &mut [bool], range: Option<(u32, u32)>) {
    let Some((start, end)) = range else {
        return;
    };
    for flag in marks
        .iter_mut()
        .take(end as usize)
        .skip(start as usize - 1)
    {
        *flag = true;
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::json;

    use crate::path::Pointer;

    use super::super::render::render;
    use super::*;

    fn pointer(raw: &str) -> Pointer {
        raw.try_into().unwrap()
    }

    #[test]
    fn test_replace_marks_both_sides() {
        let src = json!({"cpu": 1.0});
        let dst = json!({"cpu": 2.0});
        let patches = vec![PatchOp::replace(pointer("/cpu"), json!(2.0), json!(1.0))];

        let diff = unified(&src, &dst, &render(&src), &render(&dst), &patches);

        check!(diff.added == 1);
        check!(diff.removed == 1);
        // "{", removed cpu line, added cpu line, "}"
        check!(diff.lines.len() == 4);
        check!(diff.lines[1].kind == LineKind::Removed);
        check!(diff.lines[2].kind == LineKind::Added);
    }

    #[test]
    fn test_counts_match_kinds() {
        let src = json!({"a": [1, 2], "b": 1});
        let dst = json!({"a": [1], "b": 2});
        let patches = vec![
            PatchOp::remove(pointer("/a/1"), json!(2)),
            PatchOp::replace(pointer("/b"), json!(2), json!(1)),
        ];

        let diff = unified(&src, &dst, &render(&src), &render(&dst), &patches);

        let added = diff
            .lines
            .iter()
            .filter(|l| l.kind == LineKind::Added)
            .count() as u32;
        let removed = diff
            .lines
            .iter()
            .filter(|l| l.kind == LineKind::Removed)
            .count() as u32;
        check!(diff.added == added);
        check!(diff.removed == removed);
    }

    #[test]
    fn test_no_patches_yields_only_context() {
        let doc = json!({"a": 1});
        let rendered = render(&doc);

        let diff = unified(&doc, &doc, &rendered, &rendered, &[]);

        check!(diff.added == 0);
        check!(diff.removed == 0);
        check!(diff.lines.iter().all(|l| l.kind == LineKind::Unchanged));
    }

    #[test]
    fn test_append_marks_last_target_element() {
        let src = json!({"a": [1]});
        let dst = json!({"a": [1, 2]});
        let patches = vec![PatchOp::add(pointer("/a/-"), json!(2))];

        let diff = unified(&src, &dst, &render(&src), &render(&dst), &patches);

        check!(diff.removed == 0);
        // only the appended element's line is added
        check!(diff.added == 1);
        let added_line = diff.lines.iter().find(|l| l.kind == LineKind::Added).unwrap();
        check!(added_line.content.contains('2'));
    }

    #[test]
    fn test_keys_are_stable() {
        let src = json!({"x": 1});
        let dst = json!({"x": 2});
        let patches = vec![PatchOp::replace(pointer("/x"), json!(2), json!(1))];

        let diff = unified(&src, &dst, &render(&src), &render(&dst), &patches);

        check!(diff.lines[0].key == "unchanged-1-1");
        check!(diff.lines[1].key == "removed-2");
        check!(diff.lines[2].key == "added-2");
    }

    #[test]
    fn test_full_change_shapes() {
        let rendered = render(&json!({"id": "s2", "cpu": 0.5}));

        let gone = full_change(&rendered, &render(&Value::Null));
        check!(gone.removed == rendered.lines.len() as u32);
        check!(gone.added == 1);
        check!(gone.lines.last().unwrap().kind == LineKind::Added);
    }
}
