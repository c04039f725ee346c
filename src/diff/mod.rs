mod engine;
mod keyed;
mod lcs;
mod patch_operations;
#[cfg(test)]
pub(crate) mod test_util;
mod unique;

use std::ops::Deref;

pub use patch_operations::PatchOp;

pub(crate) use engine::DiffEngine;

use crate::plan::Plan;

/// An ordered sequence of patch operations. Applying the operations left to
/// right against the source document yields the target.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOp>);

impl Patch {
    pub fn new(operations: Vec<PatchOp>) -> Self {
        Patch(operations)
    }

    pub fn new_with_op(op: PatchOp) -> Self {
        Patch(vec![op])
    }

    pub fn push(&mut self, op: PatchOp) {
        self.0.push(op);
    }

    pub fn into_inner(self) -> Vec<PatchOp> {
        self.0
    }
}

impl Deref for Patch {
    type Target = Vec<PatchOp>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::Add for Patch {
    type Output = Patch;

    fn add(self, rhs: Self) -> Self::Output {
        let mut operations = self.0;
        operations.extend(rhs.0);
        Patch(operations)
    }
}

impl IntoIterator for Patch {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOp;
    type IntoIter = std::slice::Iter<'a, PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<PatchOp> for Patch {
    fn from_iter<T: IntoIterator<Item = PatchOp>>(iter: T) -> Self {
        Patch(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Maximum recursion depth; past it the engine degrades to a single
    /// `replace` of the whole subtree.
    pub depth_limit: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        DiffOptions { depth_limit: 512 }
    }
}

/// Diffs `src` against `dst`, picking a per-array strategy from `plan`.
/// Total on any two values; never fails.
pub fn create_patch(src: &serde_json::Value, dst: &serde_json::Value, plan: &Plan) -> Patch {
    create_patch_with(src, dst, plan, DiffOptions::default())
}

pub fn create_patch_with(
    src: &serde_json::Value,
    dst: &serde_json::Value,
    plan: &Plan,
    options: DiffOptions,
) -> Patch {
    DiffEngine::new(plan, options).diff(src, dst)
}
