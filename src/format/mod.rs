mod lines;
mod render;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde_json::Value;

pub use lines::{FormattedDiff, LineKind, LineRecord};
pub use render::{PathMap, Rendered};

pub(crate) use lines::full_change;
pub(crate) use render::render;

use crate::diff::PatchOp;
use crate::eq::{Fnv1a, value_fingerprint};

const RENDER_CACHE_CAP: NonZeroUsize = NonZeroUsize::new(256).unwrap();
const DIFF_CACHE_CAP: NonZeroUsize = NonZeroUsize::new(1000).unwrap();

/// Rendering front end with the two shared LRU caches: pretty renderings
/// (with their PathMaps) keyed by a structural fingerprint, and formatted
/// diffs keyed by the `(src, dst, patches, plan)` fingerprint. Both caches
/// sit behind their own lock; entries are immutable once inserted, so a
/// `Formatter` can be shared across threads and reused across calls.
pub struct Formatter {
    renderings: Mutex<LruCache<u64, Arc<Rendered>>>,
    diffs: Mutex<LruCache<u64, Arc<FormattedDiff>>>,
}

impl Formatter {
    pub fn new() -> Self {
        Formatter {
            renderings: Mutex::new(LruCache::new(RENDER_CACHE_CAP)),
            diffs: Mutex::new(LruCache::new(DIFF_CACHE_CAP)),
        }
    }

    pub(crate) fn rendered(&self, value: &Value) -> Arc<Rendered> {
        let key = value_fingerprint(value);
        if let Ok(mut cache) = self.renderings.lock()
            && let Some(hit) = cache.get(&key)
        {
            return Arc::clone(hit);
        }
        let built = Arc::new(render(value));
        if let Ok(mut cache) = self.renderings.lock() {
            cache.put(key, Arc::clone(&built));
        }
        built
    }

    pub(crate) fn unified(
        &self,
        src: &Value,
        dst: &Value,
        patches: &[PatchOp],
        plan_fingerprint: &str,
    ) -> Arc<FormattedDiff> {
        let key = diff_key(src, dst, patches, plan_fingerprint);
        if let Ok(mut cache) = self.diffs.lock()
            && let Some(hit) = cache.get(&key)
        {
            return Arc::clone(hit);
        }

        let src_rendered = self.rendered(src);
        let dst_rendered = self.rendered(dst);
        let built = Arc::new(lines::unified(
            src,
            dst,
            &src_rendered,
            &dst_rendered,
            patches,
        ));
        if let Ok(mut cache) = self.diffs.lock() {
            cache.put(key, Arc::clone(&built));
        }
        built
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::new()
    }
}

fn diff_key(src: &Value, dst: &Value, patches: &[PatchOp], plan_fingerprint: &str) -> u64 {
    let mut h = Fnv1a::new();
    h.write(&value_fingerprint(src).to_le_bytes());
    h.write(&value_fingerprint(dst).to_le_bytes());
    for op in patches {
        match op {
            PatchOp::Add { path, value } => {
                h.write(b"a");
                h.write(path.to_string().as_bytes());
                h.write(&value_fingerprint(value).to_le_bytes());
            }
            PatchOp::Remove { path, .. } => {
                h.write(b"r");
                h.write(path.to_string().as_bytes());
            }
            PatchOp::Replace { path, value, .. } => {
                h.write(b"x");
                h.write(path.to_string().as_bytes());
                h.write(&value_fingerprint(value).to_le_bytes());
            }
            PatchOp::Move { from, path } => {
                h.write(b"m");
                h.write(from.to_string().as_bytes());
                h.write(path.to_string().as_bytes());
            }
        }
    }
    h.write(plan_fingerprint.as_bytes());
    h.finish()
}
