use std::sync::Arc;

use super::ActiveGameplayEffectsContainer;
use crate::aggregator::{AggregatorId, AggregatorMod, ModOp};
use crate::attribute::AttributeHandle;
use crate::cue::{CueEvent, CueParameters, PendingCue};
use crate::effect::{
    ActiveEffectHandle, ActiveGameplayEffect, EffectDuration, EffectState, GameplayEffectSpec,
    SpecError, StackDurationRefreshPolicy, StackPeriodResetPolicy, StackingType,
};
use crate::magnitude::CaptureDefinition;
use crate::prediction::PredictionKey;
use crate::tags::TagContainer;

/// Result of a successful application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Instant effect: base values changed, nothing stored.
    Executed,
    /// A new active effect.
    Added(ActiveEffectHandle),
    /// Merged into an existing stack.
    Stacked {
        handle: ActiveEffectHandle,
        stack_count: u32,
        /// The stack was already at its limit.
        overflowed: bool,
    },
}

impl ApplyOutcome {
    pub fn handle(&self) -> Option<ActiveEffectHandle> {
        match self {
            Self::Executed => None,
            Self::Added(handle) | Self::Stacked { handle, .. } => Some(*handle),
        }
    }
}

/// Cue events for every cue tag on the spec's definition.
pub(crate) fn effect_cues(spec: &GameplayEffectSpec, event: CueEvent) -> Vec<PendingCue> {
    let def = spec.def();
    let mut cues = Vec::new();
    for cue in &def.cues {
        let raw_magnitude = cue
            .magnitude_attribute
            .as_ref()
            .and_then(|attribute| def.modifiers.iter().position(|m| &m.attribute == attribute))
            .and_then(|index| spec.stacked_modifier_magnitude(index))
            .unwrap_or(spec.level());
        let params = CueParameters {
            normalized_magnitude: cue.normalize_level(spec.level()),
            raw_magnitude,
            context: spec.context().clone(),
            effect: Some(def.id.clone()),
            source_tags: spec.captured_source_tags().clone(),
            level: spec.level(),
            stack_count: spec.stack_count(),
        };
        for tag in &cue.tags {
            cues.push(PendingCue {
                tag: tag.clone(),
                event,
                params: params.clone(),
            });
        }
    }
    cues
}

/// Every tag named by the definition's cues.
pub(crate) fn cue_tags(spec: &GameplayEffectSpec) -> TagContainer {
    let mut tags = TagContainer::new();
    for cue in &spec.def().cues {
        tags.extend_from(&cue.tags);
    }
    tags
}

fn build_mod(
    effect: &ActiveGameplayEffect,
    index: usize,
    magnitude: f32,
) -> Option<(AttributeHandle, ModOp, AggregatorMod)> {
    let modifier = effect.spec.def().modifiers.get(index)?;
    let mut aggregator_mod = AggregatorMod::new(effect.handle, index, magnitude)
        .predicted(effect.prediction_key.is_local_client_key());
    aggregator_mod.source_tag_requirements = modifier.source_tags.clone();
    aggregator_mod.target_tag_requirements = modifier.target_tags.clone();
    aggregator_mod.captured_source_tags = effect.spec.captured_source_tags().clone();
    Some((modifier.attribute.clone(), modifier.op, aggregator_mod))
}

impl ActiveGameplayEffectsContainer {
    /// Applies a spec that already passed the owner's gates.
    ///
    /// Instant specs execute against base values and return
    /// [`ApplyOutcome::Executed`]. Duration and infinite specs stack onto a
    /// matching effect or become a new one.
    pub fn apply_gameplay_effect_spec(
        &mut self,
        spec: GameplayEffectSpec,
        prediction_key: PredictionKey,
    ) -> ApplyOutcome {
        self.locked(|container| container.apply_locked(spec, prediction_key))
    }

    fn apply_locked(
        &mut self,
        mut spec: GameplayEffectSpec,
        prediction_key: PredictionKey,
    ) -> ApplyOutcome {
        if spec.duration().is_instant() {
            self.execute_active_effects_from(spec);
            return ApplyOutcome::Executed;
        }

        let ctx = Arc::clone(&self.ctx);
        self.capture_target_data(&mut spec);

        if let Err(error) =
            spec.attempt_calculate_duration(Some(&self.aggregators), ctx.calculations())
        {
            self.log_spec_errors(&[error]);
        }
        self.clamp_duration(&mut spec);

        if let Some(existing) = self.find_stack_target(&spec) {
            if let Some(outcome) = self.add_stacks(existing, &spec) {
                return outcome;
            }
        }

        let errors = spec.attempt_calculate_magnitudes(Some(&self.aggregators), ctx.calculations());
        self.log_spec_errors(&errors);
        let limited = spec.def().stacking.clamp_count(spec.stack_count());
        spec.set_stack_count(limited);

        let now = self.world_time;
        let periodic = spec.is_periodic();
        let execute_now = periodic && spec.def().execute_periodic_on_application;
        let handle = self.effects.insert_with(|handle| {
            let mut effect = ActiveGameplayEffect::new(handle, spec, now, prediction_key);
            if periodic {
                effect.restart_period(now);
            }
            effect
        });
        self.order.push(handle);

        tracing::debug!(
            target: "gameplay::container",
            owner = %self.owner,
            handle = %handle,
            key = %prediction_key,
            "added active effect"
        );

        self.link_live_captures(handle);
        self.register_tag_dependencies(handle);
        self.update_inhibition(handle);
        if execute_now {
            self.execute_periodic_effect(handle);
        }
        ApplyOutcome::Added(handle)
    }

    /// Queues `event` for every cue on the spec's definition.
    pub(crate) fn push_effect_cues(&mut self, spec: &GameplayEffectSpec, event: CueEvent) {
        self.pending_cues.extend(effect_cues(spec, event));
    }

    /// Declares and captures target-side data and the target's tags.
    pub(crate) fn capture_target_data(&mut self, spec: &mut GameplayEffectSpec) {
        let ctx = Arc::clone(&self.ctx);
        spec.declare_captures(ctx.calculations());
        let errors = spec.capture_attribute_data_from_target(self);
        self.log_spec_errors(&errors);
        spec.set_captured_target_tags(self.owned_tags.explicit_tags());
    }

    pub(crate) fn log_spec_errors(&self, errors: &[SpecError]) {
        for error in errors {
            tracing::warn!(
                target: "gameplay::container",
                owner = %self.owner,
                error = %error,
                "skipping unresolved effect data"
            );
        }
    }

    fn clamp_duration(&self, spec: &mut GameplayEffectSpec) {
        if let EffectDuration::Finite(seconds) = spec.duration() {
            let min_duration = self.ctx.config().min_duration;
            if seconds <= 0.0 || seconds.is_nan() {
                tracing::error!(
                    target: "gameplay::container",
                    owner = %self.owner,
                    effect = %spec.def().id,
                    seconds,
                    min_duration,
                    "non-positive duration, clamping"
                );
                spec.set_duration(EffectDuration::Finite(min_duration));
            }
        }
    }

    fn find_stack_target(&self, spec: &GameplayEffectSpec) -> Option<ActiveEffectHandle> {
        let def = spec.def();
        let instigator = spec.context().instigator;
        let same_stack = |effect: &ActiveGameplayEffect| {
            !effect.is_pending_removal()
                && effect.spec.def().id == def.id
                && match def.stacking.stacking_type {
                    StackingType::None => false,
                    StackingType::AggregateByTarget => true,
                    StackingType::AggregateBySource => {
                        effect.spec.context().instigator == instigator
                    }
                }
        };
        self.order
            .iter()
            .copied()
            .find(|handle| self.effects.get(*handle).is_some_and(same_stack))
    }

    fn add_stacks(
        &mut self,
        handle: ActiveEffectHandle,
        incoming: &GameplayEffectSpec,
    ) -> Option<ApplyOutcome> {
        let rules = &incoming.def().stacking;
        let now = self.world_time;
        let effect = self.effects.get_mut(handle)?;

        let current = effect.stack_count();
        let overflowed = rules.is_full(current);
        if overflowed && rules.deny_overflow_application {
            tracing::debug!(
                target: "gameplay::container",
                owner = %self.owner,
                handle = %handle,
                "stack full, application denied"
            );
            return Some(ApplyOutcome::Stacked {
                handle,
                stack_count: current,
                overflowed,
            });
        }

        if rules.duration_refresh == StackDurationRefreshPolicy::RefreshOnSuccessfulApplication {
            effect.start_world_time = now;
        }
        if rules.period_reset == StackPeriodResetPolicy::ResetOnSuccessfulApplication
            && effect.spec.is_periodic()
        {
            effect.restart_period(now);
        }

        let stack_count = rules.clamp_count(current.saturating_add(incoming.stack_count()));
        self.set_stack_count(handle, stack_count);
        tracing::debug!(
            target: "gameplay::container",
            owner = %self.owner,
            handle = %handle,
            stack_count,
            overflowed,
            "stacked active effect"
        );
        Some(ApplyOutcome::Stacked {
            handle,
            stack_count,
            overflowed,
        })
    }

    /// Changes the stack count and rescales live mods.
    pub(crate) fn set_stack_count(&mut self, handle: ActiveEffectHandle, count: u32) {
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        if effect.stack_count() == count {
            return;
        }
        effect.spec.set_stack_count(count);
        if effect.contributes_modifiers() {
            self.refresh_effect_mods(handle);
        }
    }

    /// Re-evaluates ongoing requirements and moves the effect between
    /// active and inhibited.
    pub(crate) fn update_inhibition(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        if effect.is_pending_removal() {
            return;
        }
        let met = effect
            .spec
            .def()
            .ongoing_requirements
            .requirements_met(&self.owned_tags);
        match (effect.state, met) {
            (EffectState::Active, true) | (EffectState::Inhibited, false) => {}
            (_, true) => self.activate(handle),
            (EffectState::Active, false) => self.inhibit(handle),
            (_, false) => {
                effect.state = EffectState::Inhibited;
                tracing::debug!(
                    target: "gameplay::container",
                    owner = %self.owner,
                    handle = %handle,
                    "effect starts inhibited"
                );
            }
        }
    }

    fn activate(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        effect.state = EffectState::Active;
        let first = !effect.has_activated;
        effect.has_activated = true;

        let granted = effect.spec.all_granted_tags();
        let cue_tags = cue_tags(&effect.spec);
        if first {
            self.pending_cues
                .extend(effect_cues(&effect.spec, CueEvent::OnActive));
        }
        self.pending_cues
            .extend(effect_cues(&effect.spec, CueEvent::WhileActive));

        self.add_effect_mods(handle);
        self.update_owned_tags(&granted, 1);
        self.update_owned_tags(&cue_tags, 1);
        tracing::debug!(
            target: "gameplay::container",
            owner = %self.owner,
            handle = %handle,
            "effect active"
        );
    }

    fn inhibit(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        effect.state = EffectState::Inhibited;
        let granted = effect.spec.all_granted_tags();
        let cue_tags = cue_tags(&effect.spec);
        self.pending_cues
            .extend(effect_cues(&effect.spec, CueEvent::Removed));

        self.remove_effect_mods(handle);
        self.update_owned_tags(&granted, -1);
        self.update_owned_tags(&cue_tags, -1);
        tracing::debug!(
            target: "gameplay::container",
            owner = %self.owner,
            handle = %handle,
            "effect inhibited"
        );
    }

    /// Registers the effect's valid modifiers with their aggregators.
    fn add_effect_mods(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get(handle) else {
            return;
        };
        if !effect.contributes_modifiers() {
            return;
        }
        let mods: Vec<_> = (0..effect.spec.def().modifiers.len())
            .filter_map(|index| {
                let magnitude = effect.spec.stacked_modifier_magnitude(index)?;
                build_mod(effect, index, magnitude)
            })
            .collect();

        for (attribute, op, aggregator_mod) in mods {
            let Some(id) = self.find_or_create_aggregator(&attribute) else {
                tracing::warn!(
                    target: "gameplay::container",
                    owner = %self.owner,
                    handle = %handle,
                    attribute = %attribute,
                    "no attribute set for modifier"
                );
                continue;
            };
            let added = self
                .aggregators
                .get_mut(id)
                .is_some_and(|aggregator| aggregator.add_mod(op, aggregator_mod));
            if added {
                self.mark_aggregator_changed(id);
            }
        }
    }

    pub(crate) fn remove_effect_mods(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get(handle) else {
            return;
        };
        let mut attributes: Vec<AttributeHandle> = effect
            .spec
            .def()
            .modifiers
            .iter()
            .map(|m| m.attribute.clone())
            .collect();
        attributes.sort();
        attributes.dedup();

        for attribute in attributes {
            let Some(id) = self.aggregators.find(&attribute) else {
                continue;
            };
            let removed = self
                .aggregators
                .get_mut(id)
                .map_or(0, |aggregator| aggregator.remove_mods_for_handle(handle));
            if removed > 0 {
                self.mark_aggregator_changed(id);
            }
        }
    }

    /// Brings the effect's registered mods in line with its current
    /// magnitudes and stack count.
    pub(crate) fn refresh_effect_mods(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get(handle) else {
            return;
        };
        let updates: Vec<(usize, AttributeHandle, ModOp, Option<AggregatorMod>)> = effect
            .spec
            .def()
            .modifiers
            .iter()
            .enumerate()
            .map(|(index, modifier)| {
                let built = effect
                    .spec
                    .stacked_modifier_magnitude(index)
                    .and_then(|magnitude| build_mod(effect, index, magnitude))
                    .map(|(_, _, aggregator_mod)| aggregator_mod);
                (index, modifier.attribute.clone(), modifier.op, built)
            })
            .collect();

        for (index, attribute, op, built) in updates {
            let Some(id) = self.find_or_create_aggregator(&attribute) else {
                continue;
            };
            let Some(aggregator) = self.aggregators.get_mut(id) else {
                continue;
            };
            let changed = match built {
                Some(aggregator_mod) => {
                    let magnitude = aggregator_mod.evaluated_magnitude;
                    aggregator.update_mod_magnitude(op, handle, index, magnitude)
                        || aggregator.add_mod(op, aggregator_mod)
                }
                None => {
                    aggregator.retain_mods(|m| !(m.handle == handle && m.modifier_index == index))
                        > 0
                }
            };
            if changed {
                self.mark_aggregator_changed(id);
            }
        }
    }

    pub(crate) fn recalculate_magnitudes(&mut self, handle: ActiveEffectHandle) {
        let ctx = Arc::clone(&self.ctx);
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        let errors = effect
            .spec
            .attempt_calculate_magnitudes(Some(&self.aggregators), ctx.calculations());
        self.log_spec_errors(&errors);
    }

    /// Adds `captured → modified` edges for each live capture. A capture
    /// that would close a cycle is frozen to a snapshot instead.
    fn link_live_captures(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get(handle) else {
            return;
        };
        if effect.spec.is_periodic() {
            return;
        }
        let linked: Vec<(CaptureDefinition, AggregatorId)> = effect
            .spec
            .captures()
            .linked()
            .map(|(definition, id)| (definition.clone(), id))
            .collect();
        if linked.is_empty() {
            return;
        }
        let mut modified: Vec<AttributeHandle> = effect
            .spec
            .def()
            .modifiers
            .iter()
            .map(|m| m.attribute.clone())
            .collect();
        modified.sort();
        modified.dedup();
        let targets: Vec<AggregatorId> = modified
            .iter()
            .filter_map(|attribute| self.find_or_create_aggregator(attribute))
            .collect();

        let mut frozen = false;
        for (definition, from) in linked {
            let graph = self.aggregators.graph();
            if targets.iter().any(|to| graph.would_create_cycle(from, *to)) {
                tracing::warn!(
                    target: "gameplay::container",
                    owner = %self.owner,
                    handle = %handle,
                    attribute = %definition.attribute,
                    "live capture would form a dependency cycle, using a snapshot"
                );
                let snapshot = self.aggregators.get(from).cloned().unwrap_or_default();
                if let Some(effect) = self.effects.get_mut(handle) {
                    effect.spec.captures_mut().freeze(&definition, snapshot);
                }
                frozen = true;
                continue;
            }
            for &to in &targets {
                match self.aggregators.graph_mut().link(from, to, handle) {
                    Ok(()) => {
                        if let Some(effect) = self.effects.get_mut(handle) {
                            effect.dependency_links.push((from, to));
                        }
                    }
                    Err(error) => tracing::warn!(
                        target: "gameplay::container",
                        owner = %self.owner,
                        handle = %handle,
                        error = %error,
                        "dependency link refused"
                    ),
                }
            }
        }
        if frozen {
            self.recalculate_magnitudes(handle);
        }
    }

    /// Recalculates effects holding live captures of an aggregator whose
    /// value changed.
    pub(crate) fn propagate_dependency(&mut self, id: AggregatorId) {
        for handle in self.aggregators.graph().dependents(id) {
            let Some(effect) = self.effects.get(handle) else {
                continue;
            };
            if effect.is_pending_removal() {
                continue;
            }
            self.recalculate_magnitudes(handle);
            if self
                .effects
                .get(handle)
                .is_some_and(ActiveGameplayEffect::contributes_modifiers)
            {
                self.refresh_effect_mods(handle);
            }
        }
    }
}
