use crate::aggregator::{Aggregator, AggregatorId};
use crate::attribute::AttributeHandle;

/// Which side of an application an attribute is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaptureSource {
    Source,
    Target,
}

/// Declares that a formula reads `attribute` from `source`.
///
/// Snapshot captures freeze the value when captured. Non-snapshot target
/// captures stay linked to the target's live aggregator; source captures are
/// always frozen when the spec is made.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaptureDefinition {
    pub attribute: AttributeHandle,
    pub source: CaptureSource,
    #[cfg_attr(feature = "serde", serde(default))]
    pub snapshot: bool,
}

impl CaptureDefinition {
    pub fn source(attribute: AttributeHandle) -> Self {
        Self {
            attribute,
            source: CaptureSource::Source,
            snapshot: true,
        }
    }

    pub fn target(attribute: AttributeHandle, snapshot: bool) -> Self {
        Self {
            attribute,
            source: CaptureSource::Target,
            snapshot,
        }
    }

    /// True when the capture follows the target's aggregator after capture.
    pub fn is_live(&self) -> bool {
        self.source == CaptureSource::Target && !self.snapshot
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CapturedValue {
    /// Frozen copy of the aggregator at capture time.
    Snapshot(Aggregator),
    /// Live aggregator in the target's container.
    Linked(AggregatorId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CapturedAttribute {
    pub definition: CaptureDefinition,
    /// `None` until the owning side has been captured.
    pub value: Option<CapturedValue>,
}

/// Provider of attribute values for capture: a component's container.
pub trait AttributeCapture {
    /// A copy of the attribute's current aggregator, or a bare aggregator
    /// seeded with the attribute's current value.
    fn snapshot_attribute(&self, attribute: &AttributeHandle) -> Option<Aggregator>;

    /// The attribute's live aggregator, created on demand.
    fn link_attribute(&mut self, attribute: &AttributeHandle) -> Option<AggregatorId>;
}

/// Captured attributes of one spec.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureSet {
    entries: Vec<CapturedAttribute>,
}

impl CaptureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a capture; duplicates are ignored.
    pub fn declare(&mut self, definition: CaptureDefinition) {
        if self.entries.iter().all(|e| e.definition != definition) {
            self.entries.push(CapturedAttribute {
                definition,
                value: None,
            });
        }
    }

    pub fn find(&self, definition: &CaptureDefinition) -> Option<&CapturedAttribute> {
        self.entries.iter().find(|e| &e.definition == definition)
    }

    /// Captures every not-yet-captured definition on `side` from `provider`.
    ///
    /// Returns the definitions that could not be captured (attribute absent).
    pub fn capture(
        &mut self,
        side: CaptureSource,
        provider: &mut dyn AttributeCapture,
    ) -> Vec<CaptureDefinition> {
        let mut missing = Vec::new();
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.definition.source == side && e.value.is_none())
        {
            let value = if entry.definition.is_live() {
                provider
                    .link_attribute(&entry.definition.attribute)
                    .map(CapturedValue::Linked)
            } else {
                provider
                    .snapshot_attribute(&entry.definition.attribute)
                    .map(CapturedValue::Snapshot)
            };
            match value {
                Some(value) => entry.value = Some(value),
                None => missing.push(entry.definition.clone()),
            }
        }
        missing
    }

    /// Replaces a live link with a frozen copy (used when linking would form a
    /// dependency cycle).
    pub fn freeze(&mut self, definition: &CaptureDefinition, aggregator: Aggregator) {
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.definition == definition) {
            entry.value = Some(CapturedValue::Snapshot(aggregator));
        }
    }

    /// Live links currently held.
    pub fn linked(&self) -> impl Iterator<Item = (&CaptureDefinition, AggregatorId)> {
        self.entries.iter().filter_map(|e| match e.value {
            Some(CapturedValue::Linked(id)) => Some((&e.definition, id)),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedAttribute> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
