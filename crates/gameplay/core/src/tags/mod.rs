//! Hierarchical gameplay tags.
//!
//! Tags are dotted names (`Status.Burning.Heavy`) treated as opaque interned
//! strings. Matching is hierarchical: an owner holding `Status.Burning.Heavy`
//! also matches queries for `Status.Burning` and `Status`.

mod container;
mod count;
mod requirements;

pub use container::{TagContainer, TagSource};
pub use count::TagCountContainer;
pub use requirements::TagRequirements;

use std::fmt;
use std::sync::Arc;

/// A single dotted gameplay tag.
///
/// Cloning is cheap (shared string). Equality and ordering are by name, so
/// tags work as `BTreeMap` keys with deterministic iteration.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct GameplayTag(Arc<str>);

impl GameplayTag {
    pub const SEPARATOR: char = '.';

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref().trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// `A.B.C` → `A.B`; root tags have no parent.
    pub fn direct_parent(&self) -> Option<GameplayTag> {
        self.0
            .rfind(Self::SEPARATOR)
            .map(|idx| GameplayTag(Arc::from(&self.0[..idx])))
    }

    /// All ancestors, nearest first. Does not include `self`.
    pub fn parents(&self) -> impl Iterator<Item = GameplayTag> + '_ {
        let name: &str = &self.0;
        name.char_indices()
            .rev()
            .filter(|(_, c)| *c == Self::SEPARATOR)
            .map(move |(idx, _)| GameplayTag(Arc::from(&name[..idx])))
    }

    /// True when `self` equals `other` or is a descendant of it.
    pub fn matches(&self, other: &GameplayTag) -> bool {
        let (this, that): (&str, &str) = (&self.0, &other.0);
        this == that
            || (this.len() > that.len()
                && this.starts_with(that)
                && this[that.len()..].starts_with(Self::SEPARATOR))
    }
}

impl fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl From<&str> for GameplayTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_chain() {
        let tag = GameplayTag::new("Status.Burning.Heavy");
        assert_eq!(tag.direct_parent(), Some(GameplayTag::new("Status.Burning")));
        let parents: Vec<_> = tag.parents().map(|t| t.to_string()).collect();
        assert_eq!(parents, vec!["Status.Burning", "Status"]);
        assert_eq!(GameplayTag::new("Status").direct_parent(), None);
    }

    #[test]
    fn hierarchical_match() {
        let tag = GameplayTag::new("Status.Burning");
        assert!(tag.matches(&GameplayTag::new("Status")));
        assert!(tag.matches(&GameplayTag::new("Status.Burning")));
        assert!(!tag.matches(&GameplayTag::new("Status.Burn")));
        assert!(!GameplayTag::new("Status").matches(&tag));
    }
}
