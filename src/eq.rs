use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::plan::ArrayPlan;

/// Objects estimated below this size are compared directly; hashing the
/// configured fields first only pays off for larger values.
const HASH_HINT_MIN_SIZE: usize = 64;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Incremental 64-bit FNV-1a.
pub(crate) struct Fnv1a {
    state: u64,
}

impl Fnv1a {
    pub(crate) fn new() -> Self {
        Fnv1a { state: FNV_OFFSET }
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.state ^= u64::from(*b);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    pub(crate) fn finish(&self) -> u64 {
        self.state
    }
}

pub(crate) fn fnv1a_str(input: &str) -> u64 {
    let mut h = Fnv1a::new();
    h.write(input.as_bytes());
    h.finish()
}

/// Structural fingerprint of a value, used as a content-addressed cache key.
pub(crate) fn value_fingerprint(value: &Value) -> u64 {
    let mut h = Fnv1a::new();
    hash_value(&mut h, value);
    h.finish()
}

fn hash_value(h: &mut Fnv1a, value: &Value) {
    match value {
        Value::Null => h.write(b"n"),
        Value::Bool(true) => h.write(b"t"),
        Value::Bool(false) => h.write(b"f"),
        Value::Number(n) => {
            h.write(b"#");
            h.write(n.to_string().as_bytes());
        }
        Value::String(s) => {
            h.write(b"s");
            h.write(s.as_bytes());
            h.write(&[0]);
        }
        Value::Array(items) => {
            h.write(b"[");
            for item in items {
                hash_value(h, item);
            }
            h.write(b"]");
        }
        Value::Object(map) => {
            h.write(b"{");
            for (key, item) in map {
                h.write(key.as_bytes());
                h.write(b":");
                hash_value(h, item);
            }
            h.write(b"}");
        }
    }
}

/// Numbers compare through their IEEE-754 value: `1` equals `1.0`,
/// `+0` equals `-0`, and two NaNs compare equal so structurally identical
/// documents never diverge. Integers outside the f64 range compare exactly.
pub(crate) fn number_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

/// Structural deep equality. Arrays are positional; objects must carry the
/// same key set.
pub(crate) fn deep_equal(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => number_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| deep_equal(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| deep_equal(v, w)))
        }
        _ => false,
    }
}

/// True when the rough serialized size of `value` reaches `threshold`.
/// Walks with an accumulator and bails out as soon as the threshold is met.
fn size_at_least(value: &Value, threshold: usize) -> bool {
    let mut acc = 0usize;
    estimate(value, &mut acc, threshold);
    acc >= threshold
}

fn estimate(value: &Value, acc: &mut usize, cap: usize) {
    if *acc >= cap {
        return;
    }
    match value {
        Value::Null => *acc += 4,
        Value::Bool(_) => *acc += 5,
        Value::Number(_) => *acc += 8,
        Value::String(s) => *acc += s.len() + 2,
        Value::Array(items) => {
            *acc += 2;
            for item in items {
                estimate(item, acc, cap);
                *acc += 1;
            }
        }
        Value::Object(map) => {
            *acc += 2;
            for (key, item) in map {
                *acc += key.len() + 4;
                estimate(item, acc, cap);
            }
        }
    }
}

/// FNV-1a over `i ":" field "=" render(value) "|"` per hash field. The index
/// participates so reordering the field list changes the hash. Absent fields
/// contribute an empty rendering.
pub(crate) fn field_hash(obj: &Map<String, Value>, fields: &[String]) -> u64 {
    let mut h = Fnv1a::new();
    for (i, field) in fields.iter().enumerate() {
        h.write(i.to_string().as_bytes());
        h.write(b":");
        h.write(field.as_bytes());
        h.write(b"=");
        if let Some(value) = obj.get(field) {
            h.write(value.to_string().as_bytes());
        }
        h.write(b"|");
    }
    h.finish()
}

/// Per-invocation equality memo. Keys pair the two operand addresses with a
/// hash of the plan fingerprint so diffs driven by different plans never
/// alias. Only valid while the compared documents are borrowed, which holds
/// for the lifetime of one engine call.
#[derive(Default)]
pub(crate) struct EqMemo {
    table: HashMap<(usize, usize, u64), bool>,
}

impl EqMemo {
    fn key(a: &Value, b: &Value, plan_fp: u64) -> (usize, usize, u64) {
        (
            a as *const Value as usize,
            b as *const Value as usize,
            plan_fp,
        )
    }

    fn get(&self, a: &Value, b: &Value, plan_fp: u64) -> Option<bool> {
        self.table.get(&Self::key(a, b, plan_fp)).copied()
    }

    fn insert(&mut self, a: &Value, b: &Value, plan_fp: u64, result: bool) {
        self.table.insert(Self::key(a, b, plan_fp), result);
    }
}

/// Hash-guided equality: for sizeable objects, compare the hash of the given
/// fields first and only fall through to a full structural walk on a match.
pub(crate) fn equal_with_hint(
    a: &Value,
    b: &Value,
    hash_fields: &[String],
    memo: &mut EqMemo,
) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }

    let fp = if hash_fields.is_empty() {
        0
    } else {
        fnv1a_str(&hash_fields.join(","))
    };
    if let Some(hit) = memo.get(a, b, fp) {
        return hit;
    }

    if let (Value::Object(x), Value::Object(y)) = (a, b)
        && !hash_fields.is_empty()
        && size_at_least(a, HASH_HINT_MIN_SIZE)
        && size_at_least(b, HASH_HINT_MIN_SIZE)
        && field_hash(x, hash_fields) != field_hash(y, hash_fields)
    {
        memo.insert(a, b, fp, false);
        return false;
    }

    let result = deep_equal(a, b);
    memo.insert(a, b, fp, result);
    result
}

/// Plan-aware equality. Short-circuit order: hash filter, required fields,
/// primary key, then the full structural walk.
pub(crate) fn equal_planned(a: &Value, b: &Value, plan: &ArrayPlan, memo: &mut EqMemo) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }

    let (Value::Object(x), Value::Object(y)) = (a, b) else {
        return deep_equal(a, b);
    };

    let fp = fnv1a_str(&plan.fingerprint());
    if let Some(hit) = memo.get(a, b, fp) {
        return hit;
    }

    let result = planned_objects_equal(a, b, x, y, plan);
    memo.insert(a, b, fp, result);
    result
}

fn planned_objects_equal(
    a: &Value,
    b: &Value,
    x: &Map<String, Value>,
    y: &Map<String, Value>,
    plan: &ArrayPlan,
) -> bool {
    if let Some(hash_fields) = plan.hash_fields.as_deref()
        && !hash_fields.is_empty()
        && size_at_least(a, HASH_HINT_MIN_SIZE)
        && size_at_least(b, HASH_HINT_MIN_SIZE)
        && field_hash(x, hash_fields) != field_hash(y, hash_fields)
    {
        return false;
    }

    if let Some(required) = &plan.required_fields {
        for field in required {
            if !optional_equal(x.get(field), y.get(field)) {
                return false;
            }
        }
    }

    if let Some(key) = &plan.primary_key
        && !optional_equal(x.get(key), y.get(key))
    {
        return false;
    }

    deep_equal(a, b)
}

fn optional_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => deep_equal(x, y),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::json;

    use crate::plan::{ArrayPlan, ArrayStrategy};

    use super::*;

    #[test]
    fn test_deep_equal_primitives() {
        check!(deep_equal(&json!(null), &json!(null)));
        check!(deep_equal(&json!(true), &json!(true)));
        check!(!deep_equal(&json!(true), &json!(false)));
        check!(deep_equal(&json!("a"), &json!("a")));
        check!(!deep_equal(&json!("a"), &json!(1)));
    }

    #[test]
    fn test_number_semantics() {
        check!(deep_equal(&json!(1), &json!(1.0)));
        check!(deep_equal(&json!(0.0), &json!(-0.0)));
        check!(!deep_equal(&json!(1), &json!(2)));
        check!(deep_equal(&json!(u64::MAX), &json!(u64::MAX)));
    }

    #[test]
    fn test_deep_equal_ignores_object_key_order() {
        let a = json!({"x": 1, "y": [1, 2]});
        let b = json!({"y": [1, 2], "x": 1});
        check!(deep_equal(&a, &b));
    }

    #[test]
    fn test_deep_equal_detects_extra_keys() {
        check!(!deep_equal(&json!({"x": 1}), &json!({"x": 1, "y": 2})));
    }

    #[test]
    fn test_field_hash_is_order_sensitive() {
        let obj = json!({"id": "a", "name": "b"});
        let map = obj.as_object().unwrap();

        let forward = field_hash(map, &["id".into(), "name".into()]);
        let backward = field_hash(map, &["name".into(), "id".into()]);
        check!(forward != backward);
    }

    #[test]
    fn test_field_hash_tolerates_missing_fields() {
        let obj = json!({"id": "a"});
        let map = obj.as_object().unwrap();

        let with_missing = field_hash(map, &["id".into(), "ghost".into()]);
        let other = json!({"id": "a", "ghost": "x"});
        check!(with_missing != field_hash(other.as_object().unwrap(), &["id".into(), "ghost".into()]));
    }

    fn keyed_plan() -> ArrayPlan {
        ArrayPlan {
            strategy: ArrayStrategy::PrimaryKey,
            primary_key: Some("id".to_string()),
            item_schema: None,
            required_fields: Some(["id".to_string()].into_iter().collect()),
            hash_fields: Some(vec!["id".to_string()]),
        }
    }

    #[test]
    fn test_equal_planned_short_circuits_on_primary_key() {
        let mut memo = EqMemo::default();
        let plan = keyed_plan();

        let a = json!({"id": "a", "payload": "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"});
        let b = json!({"id": "b", "payload": "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"});
        check!(!equal_planned(&a, &b, &plan, &mut memo));

        let c = a.clone();
        check!(equal_planned(&a, &c, &plan, &mut memo));
    }

    #[test]
    fn test_equal_planned_memoizes() {
        let mut memo = EqMemo::default();
        let plan = keyed_plan();

        let a = json!({"id": "a", "cpu": 1});
        let b = json!({"id": "a", "cpu": 1});
        check!(equal_planned(&a, &b, &plan, &mut memo));
        // Second call hits the memo table; same answer either way.
        check!(equal_planned(&a, &b, &plan, &mut memo));
    }

    #[test]
    fn test_equal_with_hint_small_objects_skip_hashing() {
        let mut memo = EqMemo::default();
        let a = json!({"id": "a"});
        let b = json!({"id": "a"});
        check!(equal_with_hint(&a, &b, &["id".to_string()], &mut memo));
    }

    #[test]
    fn test_value_fingerprint_distinguishes_shapes() {
        check!(value_fingerprint(&json!(["ab"])) != value_fingerprint(&json!(["a", "b"])));
        check!(value_fingerprint(&json!({"a": 1})) != value_fingerprint(&json!([{"a": 1}])));
        check!(value_fingerprint(&json!({"a": 1})) == value_fingerprint(&json!({"a": 1})));
    }
}
