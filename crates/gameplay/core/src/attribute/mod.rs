//! Attribute identity and attribute-set storage.
//!
//! An [`AttributeHandle`] names one numeric field on one attribute-set type.
//! The effect system never assumes how a set stores its values; it only reads
//! and writes numbers through the [`AttributeSet`] trait.

mod set;

pub use set::{AttributeBounds, AttributeSet, AttributeSets, ModCallbackData, NumericAttributeSet};

use std::fmt;
use std::sync::Arc;

/// Identifier of an attribute-set type (e.g. `Vitals`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct AttributeSetId(Arc<str>);

impl AttributeSetId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AttributeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeSetId({})", self.0)
    }
}

/// `{attribute-set type, attribute name}`. Immutable map key.
///
/// Written as `Set.Name` in data files and logs.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct AttributeHandle {
    set: AttributeSetId,
    name: Arc<str>,
}

impl AttributeHandle {
    pub fn new(set: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            set: AttributeSetId::new(set),
            name: Arc::from(name.as_ref()),
        }
    }

    /// Parses `Set.Name`. The name is everything after the first dot.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (set, name) = qualified.split_once('.')?;
        let handle = Self::new(set.trim(), name.trim());
        handle.is_valid().then_some(handle)
    }

    pub fn set(&self) -> &AttributeSetId {
        &self.set
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle with an empty set or name is the "null attribute".
    pub fn is_valid(&self) -> bool {
        !self.set.0.is_empty() && !self.name.is_empty()
    }
}

impl fmt::Display for AttributeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.set, self.name)
    }
}

impl fmt::Debug for AttributeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({}.{})", self.set, self.name)
    }
}

impl TryFrom<String> for AttributeHandle {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid attribute `{value}`, expected Set.Name"))
    }
}

impl From<AttributeHandle> for String {
    fn from(handle: AttributeHandle) -> Self {
        handle.to_string()
    }
}
