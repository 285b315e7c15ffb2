use std::collections::BTreeSet;

use super::{ContainerSnapshot, EffectChanges, EffectFields, ReplicatedEffect, ReplicationDelta};
use crate::aggregator::EvaluateParams;
use crate::attribute::AttributeHandle;
use crate::container::ActiveGameplayEffectsContainer;
use crate::effect::{ActiveGameplayEffect, GameplayEffectSpec};
use crate::prediction::PredictionKey;
use crate::tags::GameplayTag;

impl ActiveGameplayEffectsContainer {
    /// Opens a replication batch. Removals and cascades wait for
    /// [`post_net_receive`](Self::post_net_receive).
    pub fn pre_net_receive(&mut self) {
        self.increment_lock();
    }

    pub fn post_net_receive(&mut self) {
        self.decrement_lock();
    }

    /// Applies an authoritative snapshot on a client.
    ///
    /// # Algorithm
    ///
    /// 1. Diff against the previous snapshot by replication id
    /// 2. Under one lock: removals, additions, field changes, loose tags,
    ///    then rollback of predictions the server has caught up with
    /// 3. Under a second lock: rebase attribute base values so the
    ///    non-predicted evaluation equals the server's value
    ///
    /// # Returns
    ///
    /// The applied delta; empty on an authority.
    pub fn receive_replication(&mut self, snapshot: &ContainerSnapshot) -> ReplicationDelta {
        if self.is_authority {
            tracing::warn!(
                target: "gameplay::replication",
                owner = %self.owner,
                "authority ignores replicated state"
            );
            return ReplicationDelta::default();
        }

        let delta = ReplicationDelta::from_snapshots(&self.replica.last_effects, snapshot);
        tracing::debug!(
            target: "gameplay::replication",
            owner = %self.owner,
            server_time = snapshot.server_time,
            added = delta.added.len(),
            removed = delta.removed.len(),
            updated = delta.updated.len(),
            "received snapshot"
        );

        self.pre_net_receive();
        for id in &delta.removed {
            let Some(&handle) = self.replica.by_id.get(id) else {
                continue;
            };
            let expired = self
                .effects
                .get(handle)
                .and_then(ActiveGameplayEffect::end_time)
                .is_some_and(|end| end <= self.world_time);
            self.remove_effect_internal(handle, crate::container::ALL_STACKS, expired, false);
        }
        for entry in &delta.added {
            self.add_replicated(entry, snapshot.server_time);
        }
        for changes in &delta.updated {
            if let Some(entry) = snapshot.effect(changes.id) {
                self.apply_replicated_changes(*changes, entry, snapshot.server_time);
            }
        }
        self.sync_loose_tags(&snapshot.loose_tags);
        self.catch_up_predictions(snapshot.caught_up_key);
        self.replica.last_effects = snapshot.effects.clone();
        self.replica.last_server_time = snapshot.server_time;
        self.post_net_receive();

        self.locked(|container| container.reconcile_attributes(&snapshot.attributes));
        delta
    }

    fn rebase_start(&self, server_time: f32, start_server_time: f32) -> f32 {
        self.world_time - (server_time - start_server_time)
    }

    fn add_replicated(&mut self, entry: &ReplicatedEffect, server_time: f32) {
        let Some(def) = self.ctx.effect(&entry.effect).cloned() else {
            tracing::warn!(
                target: "gameplay::replication",
                owner = %self.owner,
                id = %entry.id,
                effect = %entry.effect,
                "replicated effect has no local definition"
            );
            return;
        };
        let mut spec = GameplayEffectSpec::new(def, entry.level, entry.context.clone());
        spec.set_duration(entry.duration);
        spec.set_stack_count(entry.stack_count);
        spec.set_modifier_magnitudes(entry.modifier_magnitudes.clone());
        for (name, magnitude) in &entry.set_by_caller {
            spec.set_set_by_caller_magnitude(name.clone(), *magnitude);
        }
        spec.replace_dynamic_granted_tags(entry.dynamic_granted_tags.clone());
        spec.replace_dynamic_asset_tags(entry.dynamic_asset_tags.clone());
        spec.set_captured_source_tags(entry.captured_source_tags.clone());

        let key = entry.prediction_key;
        let predicted_here = key.is_valid_key()
            && self.iter().any(|effect| {
                effect.prediction_key.is_local_client_key() && effect.prediction_key.same_id(key)
            });
        if key.is_valid_key() {
            self.replica.received_keys.insert(key.id());
        }

        let age = server_time - entry.start_server_time;
        let start = self.rebase_start(server_time, entry.start_server_time);
        let too_old = age >= self.ctx.config().replicated_cue_max_age;
        let handle = self.effects.insert_with(|handle| {
            let mut effect = ActiveGameplayEffect::new(handle, spec, start, key);
            effect.replication_id = Some(entry.id);
            // late joiners only get WhileActive
            effect.has_activated = too_old;
            effect
        });
        self.order.push(handle);
        self.replica.by_id.insert(entry.id, handle);

        let cue_mark = self.pending_cues.len();
        self.register_tag_dependencies(handle);
        self.update_inhibition(handle);
        if predicted_here {
            self.pending_cues.truncate(cue_mark);
        }

        tracing::trace!(
            target: "gameplay::replication",
            owner = %self.owner,
            id = %entry.id,
            handle = %handle,
            key = %key,
            predicted_here,
            "replicated effect added"
        );
    }

    fn apply_replicated_changes(
        &mut self,
        changes: EffectChanges,
        entry: &ReplicatedEffect,
        server_time: f32,
    ) {
        let Some(&handle) = self.replica.by_id.get(&changes.id) else {
            return;
        };
        let start = self.rebase_start(server_time, entry.start_server_time);
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        let fields = changes.fields;

        if fields.contains(EffectFields::START_TIME) {
            effect.start_world_time = start;
        }
        if fields.contains(EffectFields::DURATION) {
            effect.spec.set_duration(entry.duration);
        }
        if fields.contains(EffectFields::LEVEL) {
            effect.spec.set_level(entry.level);
        }
        if fields.contains(EffectFields::MAGNITUDES) {
            effect
                .spec
                .set_modifier_magnitudes(entry.modifier_magnitudes.clone());
            for (name, magnitude) in &entry.set_by_caller {
                effect
                    .spec
                    .set_set_by_caller_magnitude(name.clone(), *magnitude);
            }
        }
        if fields.contains(EffectFields::STACK_COUNT) {
            effect.spec.set_stack_count(entry.stack_count);
        }

        let mut regranted = None;
        if fields.contains(EffectFields::GRANTED_TAGS) {
            let before = effect.spec.all_granted_tags();
            effect
                .spec
                .replace_dynamic_granted_tags(entry.dynamic_granted_tags.clone());
            if effect.grants_tags() {
                regranted = Some((before, effect.spec.all_granted_tags()));
            }
        }
        let refresh_mods = effect.contributes_modifiers()
            && fields.intersects(EffectFields::MAGNITUDES | EffectFields::STACK_COUNT);

        if let Some((before, after)) = regranted {
            self.update_owned_tags(&before, -1);
            self.update_owned_tags(&after, 1);
        }
        if refresh_mods {
            self.refresh_effect_mods(handle);
        }
        tracing::trace!(
            target: "gameplay::replication",
            owner = %self.owner,
            id = %changes.id,
            fields = ?fields,
            "replicated effect changed"
        );
    }

    fn sync_loose_tags(&mut self, replicated: &[(GameplayTag, i32)]) {
        let mut tags: BTreeSet<GameplayTag> = self
            .loose_tags
            .explicit_counts()
            .map(|(tag, _)| tag.clone())
            .collect();
        tags.extend(replicated.iter().map(|(tag, _)| tag.clone()));

        for tag in tags {
            let count = replicated
                .iter()
                .find(|(candidate, _)| *candidate == tag)
                .map_or(0, |(_, count)| *count);
            self.set_loose_tag_count(&tag, count);
        }
    }

    /// Drops local predictions at or below the server's caught-up key.
    fn catch_up_predictions(&mut self, caught_up: PredictionKey) {
        if !caught_up.is_valid_key() {
            return;
        }
        let ids: BTreeSet<u32> = self
            .iter()
            .filter(|effect| {
                effect.prediction_key.is_local_client_key()
                    && effect.prediction_key.id() <= caught_up.id()
            })
            .map(|effect| effect.prediction_key.id())
            .collect();
        for id in ids {
            self.remove_predicted_effects(PredictionKey::local(id));
        }
    }

    /// Rebases each attribute so that its evaluation without predicted mods
    /// equals the server's value.
    fn reconcile_attributes(&mut self, attributes: &[(AttributeHandle, f32)]) {
        for (attribute, value) in attributes {
            let Some(id) = self.aggregators.find(attribute) else {
                self.write_current_value(attribute, *value);
                continue;
            };
            let params = EvaluateParams::new()
                .with_target_tags(&self.owned_tags)
                .excluding_predicted();
            let Some(aggregator) = self.aggregators.get_mut(id) else {
                continue;
            };
            let base = aggregator.reverse_evaluate(*value, &params);
            if aggregator.set_base_value(base) {
                self.mark_aggregator_changed(id);
            }
        }
    }
}
