//! Server → client replication of a container's effects.
//!
//! The authority produces a [`ContainerSnapshot`]; clients diff it against the
//! previous one by [`ReplicationId`] and apply the added/removed/changed sets in
//! one pass under the container lock (see [`delta`]). Snapshot entries carry
//! values, deltas only carry which fields changed.

pub mod delta;
mod reconcile;
#[cfg(feature = "serde")]
mod wire;

use std::collections::BTreeMap;
use std::fmt;

use crate::attribute::AttributeHandle;
use crate::container::ActiveGameplayEffectsContainer;
use crate::effect::{ActiveEffectHandle, ActiveGameplayEffect, EffectContext, EffectDefId, EffectDuration};
use crate::prediction::PredictionKey;
use crate::tags::{GameplayTag, TagContainer};

pub use delta::{CollectionDelta, EffectChanges, EffectFields, ReplicationDelta};
#[cfg(feature = "serde")]
pub use wire::WireError;

/// Identity of a replicated effect, stable for the effect's lifetime on the
/// server. Derived from the server-side handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplicationId(pub u64);

impl From<ActiveEffectHandle> for ReplicationId {
    fn from(handle: ActiveEffectHandle) -> Self {
        Self(handle.to_bits())
    }
}

impl fmt::Display for ReplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Debug for ReplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicationId({self})")
    }
}

/// Everything a client needs to rebuild one active effect.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplicatedEffect {
    pub id: ReplicationId,
    pub effect: EffectDefId,
    pub level: f32,
    pub stack_count: u32,
    pub duration: EffectDuration,
    /// Server world time at which the effect (re)started.
    pub start_server_time: f32,
    /// Echoed prediction key, already marked as received.
    pub prediction_key: PredictionKey,
    pub context: EffectContext,
    pub modifier_magnitudes: Vec<Option<f32>>,
    pub set_by_caller: BTreeMap<String, f32>,
    pub dynamic_granted_tags: TagContainer,
    pub dynamic_asset_tags: TagContainer,
    pub captured_source_tags: TagContainer,
}

impl ReplicatedEffect {
    fn from_active(effect: &ActiveGameplayEffect) -> Self {
        let spec = &effect.spec;
        Self {
            id: ReplicationId::from(effect.handle),
            effect: spec.def().id.clone(),
            level: spec.level(),
            stack_count: spec.stack_count(),
            duration: spec.duration(),
            start_server_time: effect.start_world_time,
            prediction_key: if effect.prediction_key.is_valid_key() {
                effect.prediction_key.received()
            } else {
                PredictionKey::NONE
            },
            context: spec.context().clone(),
            modifier_magnitudes: spec.modifier_magnitudes().to_vec(),
            set_by_caller: spec.set_by_caller_magnitudes().clone(),
            dynamic_granted_tags: spec.dynamic_granted_tags().clone(),
            dynamic_asset_tags: spec.dynamic_asset_tags().clone(),
            captured_source_tags: spec.captured_source_tags().clone(),
        }
    }
}

/// Authoritative state of one container at a point in server time.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContainerSnapshot {
    pub server_time: f32,
    /// Live effects in application order.
    pub effects: Vec<ReplicatedEffect>,
    pub loose_tags: Vec<(GameplayTag, i32)>,
    /// Current attribute values.
    pub attributes: Vec<(AttributeHandle, f32)>,
    /// Highest client prediction key the server has processed.
    pub caught_up_key: PredictionKey,
}

impl ContainerSnapshot {
    pub fn effect(&self, id: ReplicationId) -> Option<&ReplicatedEffect> {
        self.effects.iter().find(|effect| effect.id == id)
    }

    pub fn attribute(&self, attribute: &AttributeHandle) -> Option<f32> {
        self.attributes
            .iter()
            .find(|(handle, _)| handle == attribute)
            .map(|(_, value)| *value)
    }
}

impl ActiveGameplayEffectsContainer {
    /// Captures the authoritative state for replication.
    pub fn snapshot(&self, caught_up_key: PredictionKey) -> ContainerSnapshot {
        if !self.is_authority {
            tracing::warn!(
                target: "gameplay::replication",
                owner = %self.owner,
                "snapshot taken on a non-authoritative container"
            );
        }
        let attributes = self
            .attribute_sets
            .handles()
            .into_iter()
            .filter_map(|handle| {
                let value = self.attribute_sets.numeric_value(&handle)?;
                Some((handle, value))
            })
            .collect();
        ContainerSnapshot {
            server_time: self.world_time,
            effects: self.iter().map(ReplicatedEffect::from_active).collect(),
            loose_tags: self
                .loose_tags
                .explicit_counts()
                .map(|(tag, count)| (tag.clone(), count))
                .collect(),
            attributes,
            caught_up_key: caught_up_key.received(),
        }
    }
}
