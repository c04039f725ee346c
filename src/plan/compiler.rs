use std::collections::{BTreeSet, HashSet};

use serde_json::{Map, Value};

use crate::path::Pointer;

use super::{ArrayPlan, ArrayStrategy, Plan, PlanOptions};

/// Field names probed for an inferred primary key, in priority order.
/// The list is closed; forcing any other field goes through
/// `PlanOptions::primary_key_map`.
const CANDIDATE_KEYS: [&str; 3] = ["id", "name", "port"];

/// Walks a JSON Schema once and produces the per-array decision table.
/// Unknown constructs are ignored; unresolved references are recorded as
/// diagnostics and their subtree skipped. Never fails.
pub fn compile_plan(schema: &Value, options: PlanOptions) -> Plan {
    let mut compiler = Compiler {
        root: schema,
        plan: Plan::default(),
        options: normalize_options(options),
        visited: HashSet::new(),
    };
    compiler.walk(schema, &Pointer::root());

    let mut plan = compiler.plan;
    if let Some(base) = &compiler.options.base_path {
        plan.rebase(base);
    }
    plan
}

fn normalize_options(mut options: PlanOptions) -> PlanOptions {
    options.primary_key_map = options
        .primary_key_map
        .into_iter()
        .map(|(pointer, field)| {
            let key = Pointer::try_from(pointer.as_str())
                .map(|p| p.normalized().to_string())
                .unwrap_or(pointer);
            (key, field)
        })
        .collect();
    options
}

struct Compiler<'a> {
    root: &'a Value,
    plan: Plan,
    options: PlanOptions,
    visited: HashSet<usize>,
}

impl<'a> Compiler<'a> {
    fn walk(&mut self, node: &'a Value, pointer: &Pointer) {
        let Some(obj) = node.as_object() else {
            // Malformed schema node; skip it.
            return;
        };

        // Guards self-referential schemas. The node is released on return so
        // the same definition can be reached again via a different document
        // path.
        let id = node as *const Value as usize;
        if !self.visited.insert(id) {
            return;
        }
        self.walk_object(obj, pointer);
        self.visited.remove(&id);
    }

    fn walk_object(&mut self, obj: &'a Map<String, Value>, pointer: &Pointer) {
        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            match self.resolve_ref(reference) {
                Some(target) => self.walk(target, pointer),
                None => self.plan.push_diagnostic(
                    pointer.to_string(),
                    format!("unresolved $ref '{reference}', subtree skipped"),
                ),
            }
            return;
        }

        for combinator in ["anyOf", "oneOf", "allOf"] {
            if let Some(branches) = obj.get(combinator).and_then(Value::as_array) {
                for branch in dedupe_branches(branches) {
                    self.walk(branch, pointer);
                }
            }
        }

        if is_array_node(obj) {
            self.plan_array(obj, pointer);
            // Entering `items` leaves the document pointer unchanged; diff
            // indices are appended at runtime.
            if let Some(items) = obj.get("items") {
                self.walk(items, pointer);
            }
        }

        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (key, child) in props {
                self.walk(child, &pointer.push_key(key));
            }
        }

        if let Some(additional) = obj.get("additionalProperties")
            && additional.is_object()
        {
            self.walk(additional, &pointer.push_key("*"));
        }
    }

    fn plan_array(&mut self, obj: &'a Map<String, Value>, pointer: &Pointer) {
        let item_schema = obj
            .get("items")
            .and_then(|items| self.deref_once(items));

        let mut plan = ArrayPlan::lcs();
        plan.item_schema = item_schema.cloned();

        if let Some(item) = item_schema {
            if is_primitive_type(item) {
                plan.strategy = ArrayStrategy::Unique;
                self.plan.insert_merged(pointer.to_string(), plan);
                return;
            }

            if let Some(forced) = self.options.primary_key_map.get(&pointer.to_string()) {
                plan.strategy = ArrayStrategy::PrimaryKey;
                plan.primary_key = Some(forced.clone());
                // The forced key still benefits from field metadata for the
                // planned-equality short circuits.
                if let Some(found) = self.harvest_fields(item) {
                    plan.required_fields = Some(found.required);
                    plan.hash_fields = Some(found.hash_fields);
                }
                self.plan.insert_merged(pointer.to_string(), plan);
                return;
            }

            if let Some(candidate) = self.find_candidate(item) {
                plan.strategy = ArrayStrategy::PrimaryKey;
                plan.primary_key = Some(candidate.key);
                plan.required_fields = Some(candidate.fields.required);
                plan.hash_fields = Some(candidate.fields.hash_fields);
                self.plan.insert_merged(pointer.to_string(), plan);
                return;
            }
        } else if let Some(forced) = self.options.primary_key_map.get(&pointer.to_string()) {
            plan.strategy = ArrayStrategy::PrimaryKey;
            plan.primary_key = Some(forced.clone());
        }

        self.plan.insert_merged(pointer.to_string(), plan);
    }

    /// Scans the item schema, or each branch of its `anyOf`/`oneOf`, for the
    /// first candidate key. First match wins.
    fn find_candidate(&self, item: &'a Value) -> Option<Candidate> {
        if let Some(candidate) = self.candidate_in(item) {
            return Some(candidate);
        }
        let obj = item.as_object()?;
        for combinator in ["anyOf", "oneOf"] {
            if let Some(branches) = obj.get(combinator).and_then(Value::as_array) {
                for branch in branches {
                    let Some(resolved) = self.deref_once(branch) else {
                        continue;
                    };
                    if let Some(candidate) = self.candidate_in(resolved) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    fn candidate_in(&self, item: &Value) -> Option<Candidate> {
        let obj = item.as_object()?;
        let required = required_list(obj);
        let props = obj.get("properties").and_then(Value::as_object)?;

        for name in CANDIDATE_KEYS {
            if required.iter().any(|f| f == name)
                && props
                    .get(name)
                    .map(|schema| self.deref_shallow(schema))
                    .is_some_and(is_scalar_key_type)
            {
                let fields = self.fields_of(obj, &required);
                return Some(Candidate {
                    key: name.to_string(),
                    fields,
                });
            }
        }
        None
    }

    fn harvest_fields(&self, item: &Value) -> Option<Fields> {
        let obj = item.as_object()?;
        let required = required_list(obj);
        if required.is_empty() {
            return None;
        }
        Some(self.fields_of(obj, &required))
    }

    fn fields_of(&self, obj: &Map<String, Value>, required: &[String]) -> Fields {
        let props = obj.get("properties").and_then(Value::as_object);
        let hash_fields = required
            .iter()
            .filter(|field| {
                props
                    .and_then(|p| p.get(field.as_str()))
                    .map(|schema| self.deref_shallow(schema))
                    .is_some_and(is_scalar_key_type)
            })
            .cloned()
            .collect();
        Fields {
            required: required.iter().cloned().collect(),
            hash_fields,
        }
    }

    /// Follows at most one `$ref` on an item or property schema. Unresolved
    /// targets yield no metadata; the walk reports the diagnostic.
    fn deref_once(&self, node: &'a Value) -> Option<&'a Value> {
        match node.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.resolve_ref(reference),
            None => Some(node),
        }
    }

    fn deref_shallow<'b>(&'b self, node: &'b Value) -> &'b Value
    where
        'a: 'b,
    {
        match node.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.resolve_ref(reference).unwrap_or(node),
            None => node,
        }
    }

    /// Resolves a local `#/...` reference against the schema root.
    fn resolve_ref(&self, reference: &str) -> Option<&'a Value> {
        let rest = reference.strip_prefix('#')?;
        if rest.is_empty() {
            return Some(self.root);
        }
        let pointer = Pointer::try_from(rest).ok()?;
        let mut current = self.root;
        for segment in &pointer {
            current = match segment {
                crate::path::Segment::Key(key) => current.get(key.as_str())?,
                crate::path::Segment::Index(index) => current.get(index)?,
                crate::path::Segment::Append => return None,
            };
        }
        Some(current)
    }
}

struct Candidate {
    key: String,
    fields: Fields,
}

struct Fields {
    required: BTreeSet<String>,
    hash_fields: Vec<String>,
}

fn required_list(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("required")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn is_array_node(obj: &Map<String, Value>) -> bool {
    obj.get("type").and_then(Value::as_str) == Some("array") || obj.contains_key("items")
}

fn declared_type(node: &Value) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

fn is_primitive_type(node: &Value) -> bool {
    matches!(
        declared_type(node),
        Some("string" | "number" | "integer" | "boolean")
    )
}

fn is_scalar_key_type(node: &Value) -> bool {
    matches!(declared_type(node), Some("string" | "number" | "integer"))
}

/// Deduplicates combinator branches by a canonical sorted-key rendering, so
/// repeated branches are visited once.
fn dedupe_branches(branches: &[Value]) -> Vec<&Value> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for branch in branches {
        if seen.insert(canonical_render(branch)) {
            unique.push(branch);
        }
    }
    unique
}

fn canonical_render(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", k, canonical_render(&map[k])))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_render).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
