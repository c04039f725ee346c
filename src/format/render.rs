use std::collections::HashMap;

use serde_json::Value;

use crate::path::{Pointer, Segment};

/// Line ranges of every pointer in a canonical rendering, 1-based inclusive.
/// The root pointer `""` spans the whole document; composites run from their
/// opening bracket to their closing bracket.
#[derive(Debug, Default, Clone)]
pub struct PathMap {
    ranges: HashMap<String, (u32, u32)>,
}

impl PathMap {
    fn insert(&mut self, pointer: String, range: (u32, u32)) {
        self.ranges.insert(pointer, range);
    }

    pub fn get(&self, pointer: &Pointer) -> Option<(u32, u32)> {
        self.ranges.get(&pointer.to_string()).copied()
    }

    /// Exact range when recorded, else the nearest recorded ancestor's.
    pub fn range(&self, pointer: &Pointer) -> Option<(u32, u32)> {
        let mut current = pointer.clone();
        loop {
            if let Some(range) = self.ranges.get(&current.to_string()) {
                return Some(*range);
            }
            current = current.parent()?;
        }
    }
}

/// A canonical pretty-printed document: two-space indent, `\n` separators,
/// plus the PathMap emitted while rendering.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub lines: Vec<String>,
    pub map: PathMap,
}

pub(crate) fn render(value: &Value) -> Rendered {
    let mut renderer = Renderer {
        lines: Vec::new(),
        map: PathMap::default(),
    };
    renderer.write_value(value, &Pointer::root(), 0, None, false);
    Rendered {
        lines: renderer.lines,
        map: renderer.map,
    }
}

struct Renderer {
    lines: Vec<String>,
    map: PathMap,
}

impl Renderer {
    fn write_value(
        &mut self,
        value: &Value,
        pointer: &Pointer,
        indent: usize,
        label: Option<&str>,
        comma: bool,
    ) {
        let start = self.lines.len() as u32 + 1;
        match value {
            Value::Array(items) if !items.is_empty() => {
                self.push_line(indent, label, "[", false);
                for (i, item) in items.iter().enumerate() {
                    self.write_value(
                        item,
                        &pointer.push_index(i),
                        indent + 1,
                        None,
                        i + 1 < items.len(),
                    );
                }
                self.push_line(indent, None, "]", comma);
            }
            Value::Object(map) if !map.is_empty() => {
                self.push_line(indent, label, "{", false);
                for (i, (key, item)) in map.iter().enumerate() {
                    self.write_value(
                        item,
                        &pointer.push_key(key),
                        indent + 1,
                        Some(key),
                        i + 1 < map.len(),
                    );
                }
                self.push_line(indent, None, "}", comma);
            }
            scalar_or_empty => {
                self.push_line(indent, label, &scalar_or_empty.to_string(), comma);
            }
        }
        let end = self.lines.len() as u32;
        self.map.insert(pointer.to_string(), (start, end));
    }

    fn push_line(&mut self, indent: usize, label: Option<&str>, body: &str, comma: bool) {
        let mut line = "  ".repeat(indent);
        if let Some(key) = label {
            line.push_str(&Value::from(key).to_string());
            line.push_str(": ");
        }
        line.push_str(body);
        if comma {
            line.push(',');
        }
        self.lines.push(line);
    }
}

/// Rewrites a trailing `-` append pointer for one side of the diff: the
/// source side falls back to the parent array, the target side points at the
/// last element of the (already appended-to) array.
pub(crate) fn resolve_for_side(path: &Pointer, doc: &Value, new_side: bool) -> Pointer {
    if !matches!(path.last(), Some(Segment::Append)) {
        return path.clone();
    }
    let parent = path.parent().unwrap_or_default();
    if !new_side {
        return parent;
    }
    match crate::path::lookup(doc, &parent) {
        Some(Value::Array(items)) if !items.is_empty() => parent.push_index(items.len() - 1),
        _ => parent,
    }
}
