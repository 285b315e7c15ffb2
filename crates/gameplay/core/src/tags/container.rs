use std::collections::BTreeSet;

use super::GameplayTag;

/// Anything that can answer "does the owner match this tag".
///
/// Implemented by plain [`TagContainer`]s and by the owner's
/// [`TagCountContainer`](super::TagCountContainer), so requirement checks work
/// against either without copying.
pub trait TagSource {
    /// True when any held tag equals `tag` or is a descendant of it.
    fn has_matching_tag(&self, tag: &GameplayTag) -> bool;

    fn has_all_matching(&self, tags: &TagContainer) -> bool {
        tags.iter().all(|t| self.has_matching_tag(t))
    }

    fn has_any_matching(&self, tags: &TagContainer) -> bool {
        tags.iter().any(|t| self.has_matching_tag(t))
    }
}

/// An ordered set of explicit tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct TagContainer {
    tags: BTreeSet<GameplayTag>,
}

impl TagContainer {
    pub const fn new() -> Self {
        Self {
            tags: BTreeSet::new(),
        }
    }

    /// Builder form used heavily by tests and content: `TagContainer::from_names(["A.B"])`.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(GameplayTag::new).collect()
    }

    pub fn insert(&mut self, tag: GameplayTag) -> bool {
        self.tags.insert(tag)
    }

    pub fn remove(&mut self, tag: &GameplayTag) -> bool {
        self.tags.remove(tag)
    }

    pub fn extend_from(&mut self, other: &TagContainer) {
        self.tags.extend(other.tags.iter().cloned());
    }

    /// Exact membership, no hierarchy.
    pub fn contains_exact(&self, tag: &GameplayTag) -> bool {
        self.tags.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameplayTag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl TagSource for TagContainer {
    fn has_matching_tag(&self, tag: &GameplayTag) -> bool {
        self.tags.iter().any(|held| held.matches(tag))
    }
}

impl FromIterator<GameplayTag> for TagContainer {
    fn from_iter<T: IntoIterator<Item = GameplayTag>>(iter: T) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TagContainer {
    type Item = &'a GameplayTag;
    type IntoIter = std::collections::btree_set::Iter<'a, GameplayTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_expands_parents_of_held_tags() {
        let held = TagContainer::from_names(["Status.Burning.Heavy", "Team.Red"]);
        assert!(held.has_matching_tag(&GameplayTag::new("Status.Burning")));
        assert!(held.has_all_matching(&TagContainer::from_names(["Status", "Team"])));
        assert!(!held.has_any_matching(&TagContainer::from_names(["Team.Blue"])));
        assert!(!held.contains_exact(&GameplayTag::new("Status")));
    }

    #[test]
    fn empty_query_is_trivially_all_and_never_any() {
        let held = TagContainer::new();
        assert!(held.has_all_matching(&TagContainer::new()));
        assert!(!held.has_any_matching(&TagContainer::new()));
    }
}
