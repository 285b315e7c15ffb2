use super::{GameplayTag, TagContainer, TagSource};

/// Require/ignore tag lists checked against a [`TagSource`].
///
/// Met when every `require` tag matches and no `ignore` tag matches. Empty
/// requirements are always met.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TagRequirements {
    pub require: TagContainer,
    pub ignore: TagContainer,
}

impl TagRequirements {
    pub const fn new() -> Self {
        Self {
            require: TagContainer::new(),
            ignore: TagContainer::new(),
        }
    }

    pub fn requiring(tags: TagContainer) -> Self {
        Self {
            require: tags,
            ignore: TagContainer::new(),
        }
    }

    pub fn ignoring(tags: TagContainer) -> Self {
        Self {
            require: TagContainer::new(),
            ignore: tags,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.require.is_empty() && self.ignore.is_empty()
    }

    pub fn requirements_met(&self, tags: &(impl TagSource + ?Sized)) -> bool {
        tags.has_all_matching(&self.require) && !tags.has_any_matching(&self.ignore)
    }

    /// Every tag whose presence can flip the outcome.
    pub fn referenced_tags(&self) -> impl Iterator<Item = &GameplayTag> {
        self.require.iter().chain(self.ignore.iter())
    }
}
