use serde_json::Value;

use crate::path::Pointer;

/// One patch operation. The wire shape follows RFC 6902 with one extension:
/// `remove` and `replace` carry the replaced value as `oldValue` for
/// downstream consumers. `oldValue` is always emitted by the diff engine and
/// optional when re-consuming an external patch; appliers ignore it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add {
        path: Pointer,
        value: Value,
    },
    Remove {
        path: Pointer,
        #[serde(
            rename = "oldValue",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        old_value: Option<Value>,
    },
    Replace {
        path: Pointer,
        value: Value,
        #[serde(
            rename = "oldValue",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        old_value: Option<Value>,
    },
    Move {
        from: Pointer,
        path: Pointer,
    },
}

impl PatchOp {
    pub fn add(path: Pointer, value: Value) -> Self {
        PatchOp::Add { path, value }
    }

    pub fn remove(path: Pointer, old_value: Value) -> Self {
        PatchOp::Remove {
            path,
            old_value: Some(old_value),
        }
    }

    pub fn replace(path: Pointer, value: Value, old_value: Value) -> Self {
        PatchOp::Replace {
            path,
            value,
            old_value: Some(old_value),
        }
    }

    pub fn move_op(from: Pointer, path: Pointer) -> Self {
        PatchOp::Move { from, path }
    }

    /// The target location of the operation.
    pub fn path(&self) -> &Pointer {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path, .. }
            | PatchOp::Replace { path, .. }
            | PatchOp::Move { path, .. } => path,
        }
    }

    pub(crate) fn with_path(&self, path: Pointer) -> Self {
        let mut op = self.clone();
        match &mut op {
            PatchOp::Add { path: p, .. }
            | PatchOp::Remove { path: p, .. }
            | PatchOp::Replace { path: p, .. }
            | PatchOp::Move { path: p, .. } => *p = path,
        }
        op
    }
}
