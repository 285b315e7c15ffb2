//! Storage and lifecycle of one owner's active effects.
//!
//! The container owns the attribute sets, the aggregators built over them and
//! every duration/infinite effect applied to the owner. All mutation runs
//! under a reentrant scoped lock: structural erasure of removed effects, tag
//! cascades and dependency propagation are deferred until the outermost
//! operation unlocks, then settled in bounded rounds.

mod apply;
mod attributes;
mod execute;
mod query;
mod remove;
mod tags;
mod timers;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::aggregator::{Aggregator, AggregatorId, AggregatorMap, EvaluateParams};
use crate::attribute::{AttributeHandle, AttributeSet, AttributeSets};
use crate::context::AbilitySystemContext;
use crate::cue::PendingCue;
use crate::effect::{ActiveEffectHandle, ActiveGameplayEffect, EffectDefId, EntityId, SlotArena};
use crate::magnitude::AttributeCapture;
use crate::replication::{ReplicatedEffect, ReplicationId};
use crate::tags::{GameplayTag, TagCountContainer};

pub use apply::ApplyOutcome;

/// Removes every stack.
pub const ALL_STACKS: i32 = -1;

/// An attribute's current value changed.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeChange {
    pub attribute: AttributeHandle,
    pub old_value: f32,
    pub new_value: f32,
}

/// An effect left the container.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedEffectInfo {
    pub handle: ActiveEffectHandle,
    pub effect: EffectDefId,
    pub stack_count: u32,
    /// Removed because its duration ran out.
    pub expired: bool,
}

/// Client-side bookkeeping for replicated state.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReplicaState {
    pub(crate) by_id: BTreeMap<ReplicationId, ActiveEffectHandle>,
    /// Prediction key ids seen on replicated effects.
    pub(crate) received_keys: BTreeSet<u32>,
    pub(crate) last_server_time: f32,
    /// Effects of the last snapshot applied; the next one is diffed
    /// against it.
    pub(crate) last_effects: Vec<ReplicatedEffect>,
}

pub struct ActiveGameplayEffectsContainer {
    pub(crate) ctx: Arc<AbilitySystemContext>,
    pub(crate) owner: EntityId,
    pub(crate) is_authority: bool,
    pub(crate) attribute_sets: AttributeSets,
    pub(crate) effects: SlotArena<ActiveGameplayEffect>,
    /// Application order; erased handles leave at settle time.
    pub(crate) order: Vec<ActiveEffectHandle>,
    pub(crate) aggregators: AggregatorMap,
    /// Granted, cue and loose tags with parent propagation.
    pub(crate) owned_tags: TagCountContainer,
    pub(crate) loose_tags: TagCountContainer,
    /// Ongoing-requirement tag → effects to recheck when it flips.
    pub(crate) tag_dependencies: BTreeMap<GameplayTag, BTreeSet<ActiveEffectHandle>>,
    pub(crate) world_time: f32,
    lock_count: u32,
    /// Logically removed, waiting to be erased from storage.
    pub(crate) pending_erase: Vec<ActiveEffectHandle>,
    pub(crate) pending_tag_flips: Vec<GameplayTag>,
    /// Aggregators whose value changed and whose dependents need recalculation.
    pub(crate) pending_propagation: BTreeSet<AggregatorId>,
    pub(crate) pending_cues: Vec<PendingCue>,
    pub(crate) removed: Vec<RemovedEffectInfo>,
    pub(crate) attribute_changes: Vec<AttributeChange>,
    pub(crate) replica: ReplicaState,
}

impl ActiveGameplayEffectsContainer {
    pub fn new(ctx: Arc<AbilitySystemContext>, owner: EntityId, is_authority: bool) -> Self {
        Self {
            ctx,
            owner,
            is_authority,
            attribute_sets: AttributeSets::new(),
            effects: SlotArena::new(),
            order: Vec::new(),
            aggregators: AggregatorMap::new(),
            owned_tags: TagCountContainer::new(),
            loose_tags: TagCountContainer::new(),
            tag_dependencies: BTreeMap::new(),
            world_time: 0.0,
            lock_count: 0,
            pending_erase: Vec::new(),
            pending_tag_flips: Vec::new(),
            pending_propagation: BTreeSet::new(),
            pending_cues: Vec::new(),
            removed: Vec::new(),
            attribute_changes: Vec::new(),
            replica: ReplicaState::default(),
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn is_authority(&self) -> bool {
        self.is_authority
    }

    pub fn context(&self) -> &Arc<AbilitySystemContext> {
        &self.ctx
    }

    pub fn world_time(&self) -> f32 {
        self.world_time
    }

    pub fn attribute_sets(&self) -> &AttributeSets {
        &self.attribute_sets
    }

    pub fn aggregators(&self) -> &AggregatorMap {
        &self.aggregators
    }

    pub fn owned_tags(&self) -> &TagCountContainer {
        &self.owned_tags
    }

    /// Adds an attribute set. When a set is replaced, aggregators already
    /// built over its attributes keep their base values and mods and rewrite
    /// the new set's current values.
    pub fn add_attribute_set(&mut self, set: Box<dyn AttributeSet>) {
        let id = set.id().clone();
        if self.attribute_sets.insert(set).is_some() {
            tracing::debug!(
                target: "gameplay::container",
                owner = %self.owner,
                set = %id,
                "replaced attribute set"
            );
        }
        let touched: Vec<AggregatorId> = self
            .aggregators
            .iter()
            .filter(|(_, attribute, _)| attribute.set() == &id)
            .map(|(agg, _, _)| agg)
            .collect();
        self.locked(|container| {
            for agg in touched {
                container.mark_aggregator_changed(agg);
            }
        });
    }

    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    /// Opens a scope in which structural removal is deferred.
    pub fn increment_lock(&mut self) {
        self.lock_count += 1;
    }

    /// Closes a scope; the outermost close settles deferred work.
    pub fn decrement_lock(&mut self) {
        debug_assert!(self.lock_count > 0, "unbalanced container lock");
        self.lock_count = self.lock_count.saturating_sub(1);
        if self.lock_count == 0 {
            self.settle();
        }
    }

    pub(crate) fn locked<R>(&mut self, op: impl FnOnce(&mut Self) -> R) -> R {
        self.increment_lock();
        let result = op(self);
        self.decrement_lock();
        result
    }

    /// Records that an aggregator's value may have changed.
    pub(crate) fn mark_aggregator_changed(&mut self, id: AggregatorId) {
        if let Some(aggregator) = self.aggregators.get_mut(id) {
            aggregator.mark_dirty();
        }
        self.pending_propagation.insert(id);
    }

    fn has_pending_work(&self) -> bool {
        !self.pending_erase.is_empty()
            || !self.pending_tag_flips.is_empty()
            || !self.pending_propagation.is_empty()
    }

    /// Runs deferred work until quiescent, then syncs attribute values.
    fn settle(&mut self) {
        // nested operations inside settle stay deferred to the next round
        self.lock_count += 1;

        let max_rounds = self.ctx.config().max_settle_rounds;
        let mut rounds = 0;
        while self.has_pending_work() {
            if rounds == max_rounds {
                tracing::error!(
                    target: "gameplay::container",
                    owner = %self.owner,
                    rounds,
                    "settle did not converge, dropping deferred work"
                );
                self.pending_tag_flips.clear();
                self.pending_propagation.clear();
                self.erase_pending();
                break;
            }
            rounds += 1;

            let flips = std::mem::take(&mut self.pending_tag_flips);
            if !flips.is_empty() {
                self.on_tags_flipped(&flips);
            }

            let changed = std::mem::take(&mut self.pending_propagation);
            for id in changed {
                self.propagate_dependency(id);
            }

            self.erase_pending();
        }

        self.lock_count -= 1;
        self.sync_attribute_values();
    }

    fn erase_pending(&mut self) {
        for handle in std::mem::take(&mut self.pending_erase) {
            if self.effects.remove(handle).is_some() {
                self.order.retain(|h| *h != handle);
                tracing::trace!(
                    target: "gameplay::container",
                    owner = %self.owner,
                    handle = %handle,
                    "erased active effect"
                );
            }
        }
    }

    /// Writes each changed aggregator's final value into its attribute set,
    /// pruning mods that no longer belong to a live contributing effect.
    fn sync_attribute_values(&mut self) {
        let dirty: Vec<AggregatorId> = self
            .aggregators
            .iter()
            .filter(|(_, _, aggregator)| aggregator.is_dirty())
            .map(|(id, _, _)| id)
            .collect();

        for id in dirty {
            let effects = &self.effects;
            let Some(aggregator) = self.aggregators.get_mut(id) else {
                continue;
            };
            let orphaned = aggregator.retain_mods(|m| {
                effects
                    .get(m.handle)
                    .is_some_and(ActiveGameplayEffect::contributes_modifiers)
            });
            if orphaned > 0 {
                tracing::error!(
                    target: "gameplay::aggregator",
                    owner = %self.owner,
                    aggregator = %id,
                    orphaned,
                    "pruned orphaned aggregator mods"
                );
                debug_assert!(false, "orphaned aggregator mod");
            }

            let params = EvaluateParams::new().with_target_tags(&self.owned_tags);
            let new_value = aggregator.evaluate(&params);
            aggregator.mark_clean();

            let Some(attribute) = self.aggregators.attribute(id).cloned() else {
                continue;
            };
            self.write_current_value(&attribute, new_value);
        }
    }

    /// Stores a current value into the owning set, recording the change.
    pub(crate) fn write_current_value(&mut self, attribute: &AttributeHandle, new_value: f32) {
        let Some(old_value) = self.attribute_sets.numeric_value(attribute) else {
            return;
        };
        if old_value.to_bits() == new_value.to_bits() {
            return;
        }
        self.attribute_sets.set_numeric_value(attribute, new_value);
        tracing::trace!(
            target: "gameplay::container",
            owner = %self.owner,
            attribute = %attribute,
            old_value,
            new_value,
            "attribute changed"
        );
        self.attribute_changes.push(AttributeChange {
            attribute: attribute.clone(),
            old_value,
            new_value,
        });
    }

    pub(crate) fn take_pending_cues(&mut self) -> Vec<PendingCue> {
        std::mem::take(&mut self.pending_cues)
    }

    pub(crate) fn take_removed(&mut self) -> Vec<RemovedEffectInfo> {
        std::mem::take(&mut self.removed)
    }

    pub(crate) fn take_attribute_changes(&mut self) -> Vec<AttributeChange> {
        std::mem::take(&mut self.attribute_changes)
    }

    pub(crate) fn has_pending_notifications(&self) -> bool {
        !self.pending_cues.is_empty() || !self.removed.is_empty() || !self.attribute_changes.is_empty()
    }

    /// Aggregator for `attribute`, created from the set's current value.
    pub(crate) fn find_or_create_aggregator(
        &mut self,
        attribute: &AttributeHandle,
    ) -> Option<AggregatorId> {
        let sets = &self.attribute_sets;
        self.aggregators
            .find_or_create(attribute, || sets.numeric_value(attribute))
    }
}

impl AttributeCapture for ActiveGameplayEffectsContainer {
    fn snapshot_attribute(&self, attribute: &AttributeHandle) -> Option<Aggregator> {
        match self.aggregators.by_attribute(attribute) {
            Some(aggregator) => Some(aggregator.clone()),
            None => self.attribute_sets.numeric_value(attribute).map(Aggregator::new),
        }
    }

    fn link_attribute(&mut self, attribute: &AttributeHandle) -> Option<AggregatorId> {
        self.find_or_create_aggregator(attribute)
    }
}

impl std::fmt::Debug for ActiveGameplayEffectsContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveGameplayEffectsContainer")
            .field("owner", &self.owner)
            .field("is_authority", &self.is_authority)
            .field("effects", &self.effects.len())
            .field("aggregators", &self.aggregators.len())
            .field("world_time", &self.world_time)
            .finish_non_exhaustive()
    }
}
