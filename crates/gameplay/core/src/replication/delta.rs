//! Snapshot diffing.
//!
//! Diffs record *which* fields of a replicated effect changed, not their
//! values; the values are read from the newer snapshot when the delta is
//! applied.

use std::collections::BTreeMap;

use bitflags::bitflags;

use super::{ContainerSnapshot, ReplicatedEffect, ReplicationId};

bitflags! {
    /// Fields of a [`ReplicatedEffect`] that changed between two snapshots.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EffectFields: u8 {
        const LEVEL        = 1 << 0;
        const STACK_COUNT  = 1 << 1;
        const DURATION     = 1 << 2;
        const START_TIME   = 1 << 3;
        const MAGNITUDES   = 1 << 4;
        const GRANTED_TAGS = 1 << 5;
    }
}

/// Which fields of one replicated effect changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectChanges {
    pub id: ReplicationId,
    pub fields: EffectFields,
}

impl EffectChanges {
    /// Returns `None` when nothing the client tracks changed.
    pub fn from_states(before: &ReplicatedEffect, after: &ReplicatedEffect) -> Option<Self> {
        debug_assert_eq!(before.id, after.id, "Cannot compare effects with different IDs");

        let mut fields = EffectFields::empty();

        if before.level.to_bits() != after.level.to_bits() {
            fields |= EffectFields::LEVEL;
        }
        if before.stack_count != after.stack_count {
            fields |= EffectFields::STACK_COUNT;
        }
        if before.duration != after.duration {
            fields |= EffectFields::DURATION;
        }
        if before.start_server_time.to_bits() != after.start_server_time.to_bits() {
            fields |= EffectFields::START_TIME;
        }
        if before.modifier_magnitudes != after.modifier_magnitudes
            || before.set_by_caller != after.set_by_caller
        {
            fields |= EffectFields::MAGNITUDES;
        }
        if before.dynamic_granted_tags != after.dynamic_granted_tags {
            fields |= EffectFields::GRANTED_TAGS;
        }

        if fields.is_empty() {
            None
        } else {
            Some(Self {
                id: after.id,
                fields,
            })
        }
    }
}

/// Generic collection delta capturing additions, removals, and updates.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionDelta<Id, Added, Patch> {
    pub added: Vec<Added>,
    pub removed: Vec<Id>,
    pub updated: Vec<Patch>,
}

impl<Id, Added, Patch> CollectionDelta<Id, Added, Patch> {
    pub fn new() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

impl<Id, Added, Patch> Default for CollectionDelta<Id, Added, Patch> {
    fn default() -> Self {
        Self::new()
    }
}

/// Effects added, removed and changed between two snapshots.
pub type ReplicationDelta = CollectionDelta<ReplicationId, ReplicatedEffect, EffectChanges>;

impl ReplicationDelta {
    pub fn from_snapshots(before: &[ReplicatedEffect], after: &ContainerSnapshot) -> Self {
        diff_collection(
            before,
            &after.effects,
            |effect| effect.id,
            EffectChanges::from_states,
        )
    }
}

/// Additions keep `after`'s order; removals come out in id order.
pub(crate) fn diff_collection<Id, T, Patch, FId, FPatch>(
    before: &[T],
    after: &[T],
    id_fn: FId,
    mut patch_fn: FPatch,
) -> CollectionDelta<Id, T, Patch>
where
    Id: Ord + Copy,
    T: Clone,
    FId: Fn(&T) -> Id,
    FPatch: FnMut(&T, &T) -> Option<Patch>,
{
    let mut before_map: BTreeMap<Id, &T> =
        before.iter().map(|item| (id_fn(item), item)).collect();
    let mut delta = CollectionDelta::new();

    for entry in after {
        let id = id_fn(entry);
        match before_map.remove(&id) {
            Some(prev) => {
                if let Some(patch) = patch_fn(prev, entry) {
                    delta.updated.push(patch);
                }
            }
            None => delta.added.push(entry.clone()),
        }
    }

    delta.removed.extend(before_map.into_keys());
    delta
}
