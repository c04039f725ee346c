mod compiler;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;

pub use compiler::compile_plan;

use crate::path::Pointer;

/// How the engine diffs the array at a given location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrayStrategy {
    /// Elements are keyed objects; match by primary key, ignore position.
    PrimaryKey,

    /// Positional Myers edit script.
    Lcs,

    /// Primitive elements with set semantics; favors `replace`.
    Unique,
}

impl ArrayStrategy {
    /// Merge precedence when two schema branches claim the same location.
    fn rank(self) -> u8 {
        match self {
            ArrayStrategy::PrimaryKey => 3,
            ArrayStrategy::Unique => 2,
            ArrayStrategy::Lcs => 1,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ArrayStrategy::PrimaryKey => "primary-key",
            ArrayStrategy::Lcs => "lcs",
            ArrayStrategy::Unique => "unique",
        }
    }
}

/// Compiled decision for one array location.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ArrayPlan {
    pub strategy: ArrayStrategy,

    /// Set iff `strategy` is `PrimaryKey`.
    pub primary_key: Option<String>,

    /// The resolved item schema, owned by the plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_schema: Option<Value>,

    /// Required fields of the item schema, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_fields: Option<BTreeSet<String>>,

    /// Required primitive fields in declaration order; feeds the hash-guided
    /// equality filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_fields: Option<Vec<String>>,
}

impl ArrayPlan {
    pub fn lcs() -> Self {
        ArrayPlan {
            strategy: ArrayStrategy::Lcs,
            primary_key: None,
            item_schema: None,
            required_fields: None,
            hash_fields: None,
        }
    }

    /// Short canonical summary used as a cache key component.
    pub fn fingerprint(&self) -> String {
        format!(
            "{},{},{}",
            self.primary_key.as_deref().unwrap_or(""),
            self.hash_fields
                .as_deref()
                .map(|fields| fields.join("+"))
                .unwrap_or_default(),
            self.strategy.as_str(),
        )
    }

    /// Folds the loser of a merge into this plan: hash and required fields
    /// union, everything else keeps the winner's choice.
    fn absorb(&mut self, other: ArrayPlan) {
        match (&mut self.required_fields, other.required_fields) {
            (Some(mine), Some(theirs)) => mine.extend(theirs),
            (mine @ None, Some(theirs)) => *mine = Some(theirs),
            _ => {}
        }
        match (&mut self.hash_fields, other.hash_fields) {
            (Some(mine), Some(theirs)) => {
                for field in theirs {
                    if !mine.contains(&field) {
                        mine.push(field);
                    }
                }
            }
            (mine @ None, Some(theirs)) => *mine = Some(theirs),
            _ => {}
        }
        if self.item_schema.is_none() {
            self.item_schema = other.item_schema;
        }
    }
}

/// Options for [`compile_plan`].
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Forces a primary key for specific array pointers (normalized form).
    pub primary_key_map: HashMap<String, String>,

    /// When set, only entries under this pointer survive, re-keyed with the
    /// prefix stripped.
    pub base_path: Option<Pointer>,
}

/// Non-fatal problem recorded during plan compilation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlanDiagnostic {
    pub pointer: String,
    pub message: String,
}

/// Mapping from normalized document pointers to array plans. Immutable once
/// compiled; safe to share across threads and reuse for many diffs.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct Plan {
    entries: BTreeMap<String, ArrayPlan>,
    diagnostics: Vec<PlanDiagnostic>,
}

impl Plan {
    /// Looks up the plan for an array at `pointer`. Indices are normalized
    /// away; a miss retries with the last segment replaced by the `*`
    /// wildcard that `additionalProperties` entries register under.
    pub fn get(&self, pointer: &Pointer) -> Option<&ArrayPlan> {
        let normalized = pointer.normalized();
        if let Some(plan) = self.entries.get(&normalized.to_string()) {
            return Some(plan);
        }
        let parent = normalized.parent()?;
        self.entries.get(&parent.push_key("*").to_string())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ArrayPlan)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn diagnostics(&self) -> &[PlanDiagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, pointer: String, message: String) {
        self.diagnostics.push(PlanDiagnostic { pointer, message });
    }

    /// Inserts a plan, keeping the better one when the location was already
    /// claimed by another schema branch. Rank order is
    /// PrimaryKey > Unique > Lcs; ties break by key presence, then by the
    /// larger hash-field set. The loser's field metadata is always unioned
    /// into the winner.
    pub(crate) fn insert_merged(&mut self, key: String, plan: ArrayPlan) {
        match self.entries.remove(&key) {
            None => {
                self.entries.insert(key, plan);
            }
            Some(existing) => {
                let merged = if wins_over(&plan, &existing) {
                    let mut winner = plan;
                    winner.absorb(existing);
                    winner
                } else {
                    let mut winner = existing;
                    winner.absorb(plan);
                    winner
                };
                self.entries.insert(key, merged);
            }
        }
    }

    /// Applies the `base_path` option: discard entries outside the base and
    /// strip the prefix from the rest.
    pub(crate) fn rebase(&mut self, base: &Pointer) {
        let prefix = base.normalized().to_string();
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .filter_map(|(key, plan)| {
                if key == prefix {
                    Some((String::new(), plan))
                } else if key.starts_with(&prefix) && key[prefix.len()..].starts_with('/') {
                    Some((key[prefix.len()..].to_string(), plan))
                } else {
                    None
                }
            })
            .collect();
    }
}

fn wins_over(challenger: &ArrayPlan, incumbent: &ArrayPlan) -> bool {
    let by_rank = challenger
        .strategy
        .rank()
        .cmp(&incumbent.strategy.rank());
    if by_rank != std::cmp::Ordering::Equal {
        return by_rank.is_gt();
    }
    let key_presence =
        |p: &ArrayPlan| u8::from(p.primary_key.is_some());
    if key_presence(challenger) != key_presence(incumbent) {
        return key_presence(challenger) > key_presence(incumbent);
    }
    let hash_len = |p: &ArrayPlan| p.hash_fields.as_deref().map_or(0, <[String]>::len);
    hash_len(challenger) > hash_len(incumbent)
}
