use std::collections::BTreeSet;

use super::ActiveGameplayEffectsContainer;
use crate::aggregator::AggregatorId;
use crate::effect::{ActiveEffectHandle, EffectState, GameplayEffectSpec};
use crate::tags::{GameplayTag, TagContainer, TagSource};

impl ActiveGameplayEffectsContainer {
    pub fn has_matching_tag(&self, tag: &GameplayTag) -> bool {
        self.owned_tags.has_matching_tag(tag)
    }

    pub fn loose_tags(&self) -> TagContainer {
        self.loose_tags.explicit_tags()
    }

    /// Changes a loose tag's count. Removing more than was added stops at
    /// zero and never eats counts granted by effects.
    pub fn update_loose_tag(&mut self, tag: &GameplayTag, delta: i32) {
        let before = self.loose_tags.explicit_count(tag);
        self.loose_tags.update(tag, delta);
        let applied = self.loose_tags.explicit_count(tag) - before;
        if applied == 0 {
            return;
        }
        self.locked(|container| {
            let flips = container.owned_tags.update(tag, applied);
            container.pending_tag_flips.extend(flips);
        });
    }

    /// Sets a loose tag's count outright.
    pub(crate) fn set_loose_tag_count(&mut self, tag: &GameplayTag, count: i32) {
        let delta = count.max(0) - self.loose_tags.explicit_count(tag);
        if delta != 0 {
            self.update_loose_tag(tag, delta);
        }
    }

    /// Adds `delta` to every tag in `tags`, queueing presence flips for the
    /// next settle round.
    pub(crate) fn update_owned_tags(&mut self, tags: &TagContainer, delta: i32) {
        if tags.is_empty() {
            return;
        }
        let flips = self.owned_tags.update_container(tags, delta);
        self.pending_tag_flips.extend(flips);
    }

    pub(crate) fn register_tag_dependencies(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get(handle) else {
            return;
        };
        let tags: Vec<GameplayTag> = effect
            .spec
            .def()
            .ongoing_requirements
            .referenced_tags()
            .cloned()
            .collect();
        for tag in tags {
            self.tag_dependencies.entry(tag).or_default().insert(handle);
        }
    }

    pub(crate) fn unregister_tag_dependencies(
        &mut self,
        handle: ActiveEffectHandle,
        tags: &[GameplayTag],
    ) {
        for tag in tags {
            if let Some(dependents) = self.tag_dependencies.get_mut(tag) {
                dependents.remove(&handle);
                if dependents.is_empty() {
                    self.tag_dependencies.remove(tag);
                }
            }
        }
    }

    /// Reacts to tags that appeared or disappeared: rechecks dependent
    /// effects in application order and re-evaluates aggregators holding
    /// target-tag requirements.
    pub(crate) fn on_tags_flipped(&mut self, flips: &[GameplayTag]) {
        tracing::trace!(
            target: "gameplay::container",
            owner = %self.owner,
            flips = flips.len(),
            "tag presence changed"
        );
        let mut affected: BTreeSet<ActiveEffectHandle> = BTreeSet::new();
        for tag in flips {
            if let Some(dependents) = self.tag_dependencies.get(tag) {
                affected.extend(dependents.iter().copied());
            }
        }
        if !affected.is_empty() {
            let ordered: Vec<ActiveEffectHandle> = self
                .order
                .iter()
                .copied()
                .filter(|handle| affected.contains(handle))
                .collect();
            for handle in ordered {
                self.update_inhibition(handle);
            }
        }

        let tag_sensitive: Vec<AggregatorId> = self
            .aggregators
            .iter()
            .filter(|(_, _, aggregator)| aggregator.has_target_requirements())
            .map(|(id, _, _)| id)
            .collect();
        for id in tag_sensitive {
            self.mark_aggregator_changed(id);
        }
    }

    /// An active effect whose immunity requirements the incoming spec's
    /// source tags satisfy.
    pub fn immunity_blocking(&self, spec: &GameplayEffectSpec) -> Option<ActiveEffectHandle> {
        self.order.iter().copied().find(|handle| {
            self.effects.get(*handle).is_some_and(|effect| {
                let immunity = &effect.spec.def().granted_immunity;
                effect.state == EffectState::Active
                    && !immunity.is_empty()
                    && immunity.requirements_met(spec.captured_source_tags())
            })
        })
    }
}
