use super::apply::{cue_tags, effect_cues};
use super::{ALL_STACKS, ActiveGameplayEffectsContainer, RemovedEffectInfo};
use crate::cue::CueEvent;
use crate::effect::{ActiveEffectHandle, ActiveEffectQuery, EffectState};
use crate::prediction::PredictionKey;
use crate::tags::{GameplayTag, TagContainer, TagSource};

impl ActiveGameplayEffectsContainer {
    /// Removes `stacks` stacks from an effect, or the whole effect when
    /// `stacks` is negative or at least its stack count.
    ///
    /// # Returns
    ///
    /// False when the handle is unknown or already being removed.
    pub fn remove_active_gameplay_effect(&mut self, handle: ActiveEffectHandle, stacks: i32) -> bool {
        self.remove_effect_internal(handle, stacks, false, false)
    }

    pub(crate) fn remove_effect_internal(
        &mut self,
        handle: ActiveEffectHandle,
        stacks: i32,
        expired: bool,
        quiet: bool,
    ) -> bool {
        let Some(effect) = self.effects.get(handle) else {
            tracing::debug!(
                target: "gameplay::container",
                owner = %self.owner,
                handle = %handle,
                "remove requested for unknown effect"
            );
            return false;
        };
        if effect.is_pending_removal() {
            return false;
        }

        let count = effect.stack_count();
        if let Ok(partial) = u32::try_from(stacks) {
            if partial < count {
                if partial > 0 {
                    self.locked(|container| container.set_stack_count(handle, count - partial));
                }
                return true;
            }
        }

        self.locked(|container| container.remove_fully(handle, expired, quiet));
        true
    }

    /// Logical removal: mods, tags and cues go now, the storage slot goes
    /// when the outermost lock settles.
    fn remove_fully(&mut self, handle: ActiveEffectHandle, expired: bool, quiet: bool) {
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        let was_active = effect.grants_tags();
        effect.state = EffectState::PendingRemoval;
        let links = std::mem::take(&mut effect.dependency_links);
        let replication_id = effect.replication_id;

        let info = RemovedEffectInfo {
            handle,
            effect: effect.spec.def().id.clone(),
            stack_count: effect.stack_count(),
            expired,
        };
        let dependency_tags: Vec<GameplayTag> = effect
            .spec
            .def()
            .ongoing_requirements
            .referenced_tags()
            .cloned()
            .collect();
        let granted = was_active.then(|| (effect.spec.all_granted_tags(), cue_tags(&effect.spec)));
        if was_active && !quiet {
            self.pending_cues
                .extend(effect_cues(&effect.spec, CueEvent::Removed));
        }

        for (from, to) in links {
            self.aggregators.graph_mut().unlink(from, to, handle);
        }
        self.remove_effect_mods(handle);
        if let Some((granted, cue_tags)) = granted {
            self.update_owned_tags(&granted, -1);
            self.update_owned_tags(&cue_tags, -1);
        }
        self.unregister_tag_dependencies(handle, &dependency_tags);
        if let Some(id) = replication_id {
            self.replica.by_id.remove(&id);
        }

        tracing::debug!(
            target: "gameplay::container",
            owner = %self.owner,
            handle = %handle,
            effect = %info.effect,
            expired,
            "removed active effect"
        );
        self.removed.push(info);
        self.pending_erase.push(handle);
    }

    /// Removes `stacks` stacks from every effect matching `query`.
    pub fn remove_active_effects(&mut self, query: &ActiveEffectQuery, stacks: i32) -> usize {
        let handles = self.active_effects(query);
        self.locked(|container| {
            handles
                .into_iter()
                .filter(|handle| container.remove_active_gameplay_effect(*handle, stacks))
                .count()
        })
    }

    /// Removes every effect whose asset or granted tags match any of `tags`.
    pub(crate) fn remove_effects_with_tags(
        &mut self,
        tags: &TagContainer,
        except: Option<ActiveEffectHandle>,
    ) -> usize {
        if tags.is_empty() {
            return 0;
        }
        let handles: Vec<ActiveEffectHandle> = self
            .order
            .iter()
            .copied()
            .filter(|handle| Some(*handle) != except)
            .filter(|handle| {
                self.effects.get(*handle).is_some_and(|effect| {
                    !effect.is_pending_removal()
                        && (effect.spec.all_asset_tags().has_any_matching(tags)
                            || effect.spec.all_granted_tags().has_any_matching(tags))
                })
            })
            .collect();
        self.locked(|container| {
            handles
                .into_iter()
                .filter(|handle| container.remove_effect_internal(*handle, ALL_STACKS, false, false))
                .count()
        })
    }

    /// Rolls back effects this client predicted with `key`. The removal cue
    /// is suppressed when the server's copy already arrived.
    pub(crate) fn remove_predicted_effects(&mut self, key: PredictionKey) -> usize {
        let quiet = self.replica.received_keys.contains(&key.id());
        let handles: Vec<ActiveEffectHandle> = self
            .order
            .iter()
            .copied()
            .filter(|handle| {
                self.effects.get(*handle).is_some_and(|effect| {
                    effect.replication_id.is_none()
                        && effect.prediction_key.is_local_client_key()
                        && effect.prediction_key.same_id(key)
                })
            })
            .collect();
        if !handles.is_empty() {
            tracing::debug!(
                target: "gameplay::container",
                owner = %self.owner,
                key = %key,
                count = handles.len(),
                quiet,
                "removing predicted effects"
            );
        }
        self.locked(|container| {
            handles
                .into_iter()
                .filter(|handle| container.remove_effect_internal(*handle, ALL_STACKS, false, quiet))
                .count()
        })
    }

    /// Removes every effect. Used on teardown.
    pub fn clear(&mut self) -> usize {
        self.remove_active_effects(&ActiveEffectQuery::all(), ALL_STACKS)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use super::*;
    use crate::aggregator::ModOp;
    use crate::effect::{EffectContext, GameplayEffectDef, GameplayEffectSpec, StackingRules};
    use crate::magnitude::MagnitudeFormula;

    fn buff(id: &str, amount: f32) -> GameplayEffectSpec {
        let def = GameplayEffectDef::infinite(id)
            .with_modifier(armor(), ModOp::Add, MagnitudeFormula::constant(amount))
            .with_granted_tags(TagContainer::from_names(["Status.Buffed"]));
        GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::default())
    }

    #[test]
    fn removal_restores_value_and_tags() {
        let mut container = container();
        let handle = container
            .apply_gameplay_effect_spec(buff("Fortify", 5.0), PredictionKey::NONE)
            .handle()
            .unwrap();
        assert_eq!(container.get_numeric_attribute(&armor()), 15.0);
        assert!(container.has_matching_tag(&GameplayTag::new("Status")));

        assert!(container.remove_active_gameplay_effect(handle, ALL_STACKS));
        assert_eq!(container.get_numeric_attribute(&armor()), 10.0);
        assert!(!container.has_matching_tag(&GameplayTag::new("Status.Buffed")));
        assert!(!container.remove_active_gameplay_effect(handle, ALL_STACKS));

        let removed = container.take_removed();
        assert_eq!(removed.len(), 1);
        assert!(!removed[0].expired);
    }

    #[test]
    fn removal_under_lock_is_deferred_but_logical() {
        let mut container = container();
        let handle = container
            .apply_gameplay_effect_spec(buff("Fortify", 5.0), PredictionKey::NONE)
            .handle()
            .unwrap();

        container.increment_lock();
        assert!(container.remove_active_gameplay_effect(handle, ALL_STACKS));
        assert!(container.effects.contains(handle));
        assert!(container.get(handle).is_none());
        assert!(!container.has_matching_tag(&GameplayTag::new("Status.Buffed")));
        container.decrement_lock();

        assert!(!container.effects.contains(handle));
        assert_eq!(container.get_numeric_attribute(&armor()), 10.0);
    }

    #[test]
    fn partial_stack_removal() {
        let mut container = container();
        let def = Arc::new(
            GameplayEffectDef::infinite("Poison")
                .with_modifier(armor(), ModOp::Add, MagnitudeFormula::constant(-1.0))
                .with_stacking(StackingRules::aggregate_by_target(5)),
        );
        let mut handle = None;
        for _ in 0..3 {
            let spec = GameplayEffectSpec::new(Arc::clone(&def), 1.0, EffectContext::default());
            handle = container
                .apply_gameplay_effect_spec(spec, PredictionKey::NONE)
                .handle();
        }
        let handle = handle.unwrap();
        assert_eq!(container.get_numeric_attribute(&armor()), 7.0);

        assert!(container.remove_active_gameplay_effect(handle, 2));
        assert_eq!(container.stack_count(handle), Some(1));
        assert_eq!(container.get_numeric_attribute(&armor()), 9.0);
    }

    #[test]
    fn remove_by_tags_matches_asset_and_granted() {
        let mut container = container();
        container.apply_gameplay_effect_spec(buff("Fortify", 5.0), PredictionKey::NONE);
        let removed = container
            .remove_effects_with_tags(&TagContainer::from_names(["Status.Buffed"]), None);
        assert_eq!(removed, 1);
        assert_eq!(container.len(), 0);
    }
}
