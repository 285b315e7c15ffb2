use std::collections::BTreeMap;

use super::{GameplayTag, TagContainer, TagSource};

/// Reference-counted tag map for an owner.
///
/// Each grant of `A.B.C` counts toward `A.B.C`, `A.B` and `A`, so hierarchical
/// queries are a single map lookup. Explicit counts are kept separately so the
/// owner's literal tags can be listed and replicated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagCountContainer {
    counts: BTreeMap<GameplayTag, i32>,
    explicit: BTreeMap<GameplayTag, i32>,
}

impl TagCountContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count including descendants.
    pub fn count(&self, tag: &GameplayTag) -> i32 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    pub fn explicit_count(&self, tag: &GameplayTag) -> i32 {
        self.explicit.get(tag).copied().unwrap_or(0)
    }

    /// Adjusts the count of `tag` (and all its parents) by `delta`.
    ///
    /// Returns the tags whose presence flipped (0 → positive or positive → 0),
    /// which is what tag-driven listeners care about. Counts never go below 0.
    pub fn update(&mut self, tag: &GameplayTag, delta: i32) -> Vec<GameplayTag> {
        let mut flipped = Vec::new();
        if delta == 0 || !tag.is_valid() {
            return flipped;
        }

        let explicit = self.explicit.entry(tag.clone()).or_insert(0);
        let applied = if *explicit + delta < 0 { -*explicit } else { delta };
        *explicit += applied;
        if *explicit == 0 {
            self.explicit.remove(tag);
        }
        if applied == 0 {
            return flipped;
        }

        for key in std::iter::once(tag.clone()).chain(tag.parents()) {
            let count = self.counts.entry(key.clone()).or_insert(0);
            let before = *count;
            *count = (*count + applied).max(0);
            let after = *count;
            if after == 0 {
                self.counts.remove(&key);
            }
            if (before > 0) != (after > 0) {
                flipped.push(key);
            }
        }
        flipped
    }

    /// Applies `delta` to every tag in `tags`, returning all flipped tags.
    pub fn update_container(&mut self, tags: &TagContainer, delta: i32) -> Vec<GameplayTag> {
        let mut flipped = Vec::new();
        for tag in tags {
            flipped.extend(self.update(tag, delta));
        }
        flipped
    }

    /// The explicitly held tags (count > 0).
    pub fn explicit_tags(&self) -> TagContainer {
        self.explicit.keys().cloned().collect()
    }

    pub fn explicit_counts(&self) -> impl Iterator<Item = (&GameplayTag, i32)> {
        self.explicit.iter().map(|(tag, count)| (tag, *count))
    }

    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty()
    }
}

impl TagSource for TagCountContainer {
    fn has_matching_tag(&self, tag: &GameplayTag) -> bool {
        self.count(tag) > 0
    }
}
