use super::ActiveGameplayEffectsContainer;
use crate::attribute::AttributeHandle;
use crate::effect::{
    ActiveEffectHandle, ActiveEffectQuery, ActiveGameplayEffect, EffectDefId, EffectDuration,
};

impl ActiveGameplayEffectsContainer {
    /// A live effect. Effects already removed but not yet erased are hidden.
    pub fn get(&self, handle: ActiveEffectHandle) -> Option<&ActiveGameplayEffect> {
        self.effects
            .get(handle)
            .filter(|effect| !effect.is_pending_removal())
    }

    /// Live effects in application order.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveGameplayEffect> {
        self.order.iter().filter_map(|handle| self.get(*handle))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn active_effects(&self, query: &ActiveEffectQuery) -> Vec<ActiveEffectHandle> {
        self.iter()
            .filter(|effect| query.matches(effect))
            .map(ActiveGameplayEffect::handle)
            .collect()
    }

    /// Seconds left per matching effect; `None` for infinite ones.
    pub fn time_remaining(&self, query: &ActiveEffectQuery) -> Vec<Option<f32>> {
        self.iter()
            .filter(|effect| query.matches(effect))
            .map(|effect| effect.time_remaining(self.world_time))
            .collect()
    }

    pub fn durations(&self, query: &ActiveEffectQuery) -> Vec<EffectDuration> {
        self.iter()
            .filter(|effect| query.matches(effect))
            .map(ActiveGameplayEffect::duration)
            .collect()
    }

    pub fn effect_duration(&self, handle: ActiveEffectHandle) -> Option<EffectDuration> {
        self.get(handle).map(ActiveGameplayEffect::duration)
    }

    /// Stacked magnitude of the effect's first modifier on `attribute`.
    pub fn effect_magnitude(
        &self,
        handle: ActiveEffectHandle,
        attribute: &AttributeHandle,
    ) -> Option<f32> {
        let effect = self.get(handle)?;
        let index = effect
            .spec
            .def()
            .modifiers
            .iter()
            .position(|modifier| &modifier.attribute == attribute)?;
        effect.spec.stacked_modifier_magnitude(index)
    }

    pub fn stack_count(&self, handle: ActiveEffectHandle) -> Option<u32> {
        self.get(handle).map(ActiveGameplayEffect::stack_count)
    }

    /// Total stacks across every live instance of a definition.
    pub fn stack_count_of(&self, id: &EffectDefId) -> u32 {
        self.iter()
            .filter(|effect| &effect.spec.def().id == id)
            .map(ActiveGameplayEffect::stack_count)
            .sum()
    }

    pub fn is_effect_active(&self, handle: ActiveEffectHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn is_effect_inhibited(&self, handle: ActiveEffectHandle) -> bool {
        self.get(handle).is_some_and(ActiveGameplayEffect::is_inhibited)
    }
}
