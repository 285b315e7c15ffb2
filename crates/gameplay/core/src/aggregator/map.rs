use std::collections::BTreeMap;
use std::fmt;

use super::{Aggregator, DependencyGraph};
use crate::attribute::AttributeHandle;

/// Stable arena index of an aggregator inside one container.
///
/// Aggregators are never removed from their map, so an id stays valid for the
/// container's lifetime even if the attribute set that seeded it goes away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregatorId(u32);

impl AggregatorId {
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AggregatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agg#{}", self.0)
    }
}

/// Attribute → aggregator mapping plus the dependency graph between them.
#[derive(Clone, Debug, Default)]
pub struct AggregatorMap {
    aggregators: Vec<Aggregator>,
    attributes: Vec<AttributeHandle>,
    by_attribute: BTreeMap<AttributeHandle, AggregatorId>,
    graph: DependencyGraph,
}

impl AggregatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, attribute: &AttributeHandle) -> Option<AggregatorId> {
        self.by_attribute.get(attribute).copied()
    }

    /// Returns the existing aggregator or creates one seeded by `base`.
    ///
    /// `base` is only called on creation; `None` means the attribute does not
    /// exist and no aggregator is created.
    pub fn find_or_create(
        &mut self,
        attribute: &AttributeHandle,
        base: impl FnOnce() -> Option<f32>,
    ) -> Option<AggregatorId> {
        if let Some(id) = self.find(attribute) {
            return Some(id);
        }
        let base_value = base()?;
        let id = AggregatorId(self.aggregators.len() as u32);
        self.aggregators.push(Aggregator::new(base_value));
        self.attributes.push(attribute.clone());
        self.by_attribute.insert(attribute.clone(), id);
        tracing::trace!(
            target: "gameplay::aggregator",
            attribute = %attribute,
            id = %id,
            base_value,
            "created aggregator"
        );
        Some(id)
    }

    pub fn get(&self, id: AggregatorId) -> Option<&Aggregator> {
        self.aggregators.get(id.index())
    }

    pub fn get_mut(&mut self, id: AggregatorId) -> Option<&mut Aggregator> {
        self.aggregators.get_mut(id.index())
    }

    pub fn by_attribute(&self, attribute: &AttributeHandle) -> Option<&Aggregator> {
        self.find(attribute).and_then(|id| self.get(id))
    }

    pub fn attribute(&self, id: AggregatorId) -> Option<&AttributeHandle> {
        self.attributes.get(id.index())
    }

    /// `(id, attribute, aggregator)` in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (AggregatorId, &AttributeHandle, &Aggregator)> {
        self.aggregators
            .iter()
            .zip(self.attributes.iter())
            .enumerate()
            .map(|(index, (agg, attr))| (AggregatorId(index as u32), attr, agg))
    }

    pub fn ids(&self) -> impl Iterator<Item = AggregatorId> {
        (0..self.aggregators.len() as u32).map(AggregatorId)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut DependencyGraph {
        &mut self.graph
    }

    pub fn len(&self) -> usize {
        self.aggregators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }
}
