use std::collections::BTreeMap;

use respin_core::ExclusionSet;
use tracing::info;

/// Dirty markers for every build root, each with the exclusion set recorded
/// when the root was invalidated.
///
/// Callers own and pass this around explicitly; several independent roots
/// can be tracked side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationContext {
    dirty: BTreeMap<String, ExclusionSet>,
}

impl InvalidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_markers(markers: BTreeMap<String, ExclusionSet>) -> Self {
        Self { dirty: markers }
    }

    pub fn markers(&self) -> &BTreeMap<String, ExclusionSet> {
        &self.dirty
    }

    pub fn is_dirty(&self, root: &str) -> bool {
        self.dirty.contains_key(root)
    }

    /// Exclusions recorded for `root`, or `None` when the root is clean.
    pub fn exclusions(&self, root: &str) -> Option<&ExclusionSet> {
        self.dirty.get(root)
    }

    pub fn dirty_roots(&self) -> impl Iterator<Item = &str> {
        self.dirty.keys().map(String::as_str)
    }

    pub fn clear(&mut self, root: &str) -> bool {
        let cleared = self.dirty.remove(root).is_some();
        if cleared {
            info!(root, "cleared dirty marker");
        }
        cleared
    }
}

/// Marks `root` dirty so its next rebuild pass recomputes the plan, skipping
/// every package in `excluded`.
///
/// Invalidating a root that is already dirty keeps the earlier exclusions
/// and adds the new ones.
pub fn invalidate(ctx: &mut InvalidationContext, root: &str, excluded: &ExclusionSet) {
    let recorded = ctx.dirty.entry(root.to_string()).or_default();
    recorded.extend(excluded);
    info!(
        root,
        excluded = %recorded.iter().collect::<Vec<_>>().join(","),
        "marked build root dirty"
    );
}
