use std::collections::BTreeMap;
use std::fmt;

use super::{AttributeHandle, AttributeSetId};
use crate::aggregator::ModOp;
use crate::effect::GameplayEffectSpec;

/// Data handed to attribute-set hooks around an instant modifier execution.
#[derive(Debug)]
pub struct ModCallbackData<'a> {
    pub attribute: &'a AttributeHandle,
    pub op: ModOp,
    /// May be rewritten by `pre_gameplay_effect_execute`.
    pub magnitude: f32,
    pub spec: &'a GameplayEffectSpec,
}

/// Reflection-like access to a group of named numeric attributes.
///
/// The effect system addresses values only by name. Implementations may store
/// them however they like.
pub trait AttributeSet: fmt::Debug + Send + Sync {
    fn id(&self) -> &AttributeSetId;

    fn numeric_value(&self, name: &str) -> Option<f32>;

    /// Writes a value; returns false if the set has no such attribute.
    fn set_numeric_value(&mut self, name: &str, value: f32) -> bool;

    fn attribute_names(&self) -> Vec<&str>;

    /// Called before an instant modifier touches one of this set's attributes.
    /// Returning false vetoes the modification.
    fn pre_gameplay_effect_execute(&mut self, _data: &mut ModCallbackData<'_>) -> bool {
        true
    }

    /// Called after the modification has been written. Writes made here (e.g.
    /// clamping) are folded back into the attribute's base value.
    fn post_gameplay_effect_execute(&mut self, _data: &ModCallbackData<'_>) {}
}

/// Inclusive clamp range applied after instant executions.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeBounds {
    pub min: f32,
    pub max: f32,
}

/// Map-backed attribute set used by content files and tests.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumericAttributeSet {
    id: AttributeSetId,
    values: BTreeMap<String, f32>,
    #[cfg_attr(feature = "serde", serde(default))]
    bounds: BTreeMap<String, AttributeBounds>,
}

impl NumericAttributeSet {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: AttributeSetId::new(id),
            values: BTreeMap::new(),
            bounds: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f32) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_bounds(mut self, name: impl Into<String>, min: f32, max: f32) -> Self {
        self.bounds.insert(name.into(), AttributeBounds { min, max });
        self
    }

    pub fn handle(&self, name: &str) -> AttributeHandle {
        AttributeHandle::new(self.id.as_str(), name)
    }
}

impl AttributeSet for NumericAttributeSet {
    fn id(&self) -> &AttributeSetId {
        &self.id
    }

    fn numeric_value(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    fn set_numeric_value(&mut self, name: &str, value: f32) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn attribute_names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    fn post_gameplay_effect_execute(&mut self, data: &ModCallbackData<'_>) {
        let name = data.attribute.name();
        if let (Some(bounds), Some(value)) = (self.bounds.get(name), self.values.get_mut(name)) {
            *value = value.clamp(bounds.min, bounds.max);
        }
    }
}

/// The attribute sets owned by one component, keyed by set type.
#[derive(Debug, Default)]
pub struct AttributeSets {
    sets: BTreeMap<AttributeSetId, Box<dyn AttributeSet>>,
}

impl AttributeSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a set, returning the previous set of the same type if any.
    pub fn insert(&mut self, set: Box<dyn AttributeSet>) -> Option<Box<dyn AttributeSet>> {
        self.sets.insert(set.id().clone(), set)
    }

    pub fn remove(&mut self, id: &AttributeSetId) -> Option<Box<dyn AttributeSet>> {
        self.sets.remove(id)
    }

    pub fn get(&self, id: &AttributeSetId) -> Option<&dyn AttributeSet> {
        self.sets.get(id).map(|set| set.as_ref())
    }

    pub fn get_mut(&mut self, id: &AttributeSetId) -> Option<&mut (dyn AttributeSet + 'static)> {
        self.sets.get_mut(id).map(|set| set.as_mut())
    }

    /// True when a set of the attribute's owning type exists and knows the name.
    pub fn has_set_for(&self, attribute: &AttributeHandle) -> bool {
        self.numeric_value(attribute).is_some()
    }

    pub fn numeric_value(&self, attribute: &AttributeHandle) -> Option<f32> {
        self.sets
            .get(attribute.set())
            .and_then(|set| set.numeric_value(attribute.name()))
    }

    pub fn set_numeric_value(&mut self, attribute: &AttributeHandle, value: f32) -> bool {
        self.sets
            .get_mut(attribute.set())
            .is_some_and(|set| set.set_numeric_value(attribute.name(), value))
    }

    /// Every attribute of every set, in set then name order.
    pub fn handles(&self) -> Vec<AttributeHandle> {
        self.sets
            .values()
            .flat_map(|set| {
                set.attribute_names()
                    .into_iter()
                    .map(|name| AttributeHandle::new(set.id().as_str(), name))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
