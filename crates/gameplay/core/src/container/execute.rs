use std::sync::Arc;

use super::ActiveGameplayEffectsContainer;
use super::apply::effect_cues;
use crate::aggregator::{EvaluateParams, ModOp};
use crate::attribute::{AttributeHandle, ModCallbackData};
use crate::cue::CueEvent;
use crate::effect::{ActiveEffectHandle, EffectState, GameplayEffectSpec};
use crate::magnitude::{CaptureReader, ExecutionOutput};

impl ActiveGameplayEffectsContainer {
    /// Executes an instant spec against base values without storing it.
    pub fn execute_active_effects_from(&mut self, mut spec: GameplayEffectSpec) {
        self.locked(|container| {
            let ctx = Arc::clone(&container.ctx);
            container.capture_target_data(&mut spec);
            let errors =
                spec.attempt_calculate_magnitudes(Some(&container.aggregators), ctx.calculations());
            container.log_spec_errors(&errors);
            container.execute_spec(&mut spec);
        });
    }

    /// Executes a spec against base values: its qualifying modifiers, then
    /// its execution calculations. Used for instant effects and for each
    /// period of a periodic one.
    pub(crate) fn execute_spec(&mut self, spec: &mut GameplayEffectSpec) {
        let def = Arc::clone(spec.def());
        let ctx = Arc::clone(&self.ctx);

        for (index, modifier) in def.modifiers.iter().enumerate() {
            let Some(magnitude) = spec.stacked_modifier_magnitude(index) else {
                tracing::debug!(
                    target: "gameplay::effect",
                    owner = %self.owner,
                    effect = %def.id,
                    index,
                    "skipping invalid modifier"
                );
                continue;
            };
            if !modifier.source_tags.requirements_met(spec.captured_source_tags())
                || !modifier.target_tags.requirements_met(&self.owned_tags)
            {
                continue;
            }
            if self.internal_execute_mod(spec, &modifier.attribute, modifier.op, magnitude) {
                spec.record_modified_attribute(&modifier.attribute, magnitude);
            }
        }

        for name in &def.executions {
            let Some(execution) = ctx.calculations().execution(name) else {
                tracing::warn!(
                    target: "gameplay::effect",
                    owner = %self.owner,
                    effect = %def.id,
                    execution = %name,
                    "unknown execution calculation"
                );
                continue;
            };
            let mut output = ExecutionOutput::default();
            let reader = CaptureReader::new(spec, Some(&self.aggregators));
            if let Err(error) = execution.execute(spec, &reader, &mut output) {
                tracing::warn!(
                    target: "gameplay::effect",
                    owner = %self.owner,
                    effect = %def.id,
                    execution = %name,
                    error = %error,
                    "execution failed"
                );
                continue;
            }
            for modifier in output.into_modifiers() {
                if self.internal_execute_mod(
                    spec,
                    &modifier.attribute,
                    modifier.op,
                    modifier.magnitude,
                ) {
                    spec.record_modified_attribute(&modifier.attribute, modifier.magnitude);
                }
            }
        }

        self.pending_cues
            .extend(effect_cues(spec, CueEvent::Executed));
    }

    /// Applies one modifier to an attribute's base value, running the set's
    /// pre/post hooks. Returns false when the set vetoed or is missing.
    ///
    /// When the post hook rewrites the current value (clamping, say) the
    /// base value is reverse-derived so the aggregator agrees with the set.
    pub(crate) fn internal_execute_mod(
        &mut self,
        spec: &GameplayEffectSpec,
        attribute: &AttributeHandle,
        op: ModOp,
        magnitude: f32,
    ) -> bool {
        let Some(set) = self.attribute_sets.get_mut(attribute.set()) else {
            tracing::warn!(
                target: "gameplay::effect",
                owner = %self.owner,
                attribute = %attribute,
                "no attribute set for executed modifier"
            );
            return false;
        };
        let Some(old_value) = set.numeric_value(attribute.name()) else {
            tracing::warn!(
                target: "gameplay::effect",
                owner = %self.owner,
                attribute = %attribute,
                "attribute set has no such attribute"
            );
            return false;
        };

        let mut data = ModCallbackData {
            attribute,
            op,
            magnitude,
            spec,
        };
        if !set.pre_gameplay_effect_execute(&mut data) {
            tracing::debug!(
                target: "gameplay::effect",
                owner = %self.owner,
                attribute = %attribute,
                "execution vetoed by attribute set"
            );
            return false;
        }

        let aggregator_id = self.aggregators.find(attribute);
        let params = EvaluateParams::new().with_target_tags(&self.owned_tags);
        let current = match aggregator_id.and_then(|id| self.aggregators.get_mut(id)) {
            Some(aggregator) => {
                aggregator.exec_mod_on_base_value(data.op, data.magnitude);
                aggregator.evaluate(&params)
            }
            None => data.op.apply(old_value, data.magnitude),
        };
        set.set_numeric_value(attribute.name(), current);
        set.post_gameplay_effect_execute(&data);
        let new_value = set.numeric_value(attribute.name()).unwrap_or(current);

        if let Some(aggregator) = aggregator_id.and_then(|id| self.aggregators.get_mut(id)) {
            if new_value.to_bits() != current.to_bits() {
                let base = aggregator.reverse_evaluate(new_value, &params);
                aggregator.set_base_value(base);
            }
            // the set already holds the evaluated value
            aggregator.mark_clean();
        }
        if let Some(id) = aggregator_id {
            self.pending_propagation.insert(id);
        }

        tracing::trace!(
            target: "gameplay::effect",
            owner = %self.owner,
            attribute = %attribute,
            op = %op,
            magnitude,
            old_value,
            new_value,
            "executed modifier"
        );
        if old_value.to_bits() != new_value.to_bits() {
            self.attribute_changes.push(super::AttributeChange {
                attribute: attribute.clone(),
                old_value,
                new_value,
            });
        }
        true
    }

    /// Runs one period of a periodic effect. Inhibited effects skip.
    pub fn execute_periodic_effect(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get(handle) else {
            return;
        };
        if effect.state != EffectState::Active {
            tracing::trace!(
                target: "gameplay::effect",
                owner = %self.owner,
                handle = %handle,
                "inhibited periodic effect skips its execution"
            );
            return;
        }
        let mut spec = effect.spec.clone();
        if spec.captures().linked().next().is_some() {
            let ctx = Arc::clone(&self.ctx);
            let errors =
                spec.attempt_calculate_magnitudes(Some(&self.aggregators), ctx.calculations());
            self.log_spec_errors(&errors);
        }
        tracing::debug!(
            target: "gameplay::effect",
            owner = %self.owner,
            handle = %handle,
            "periodic execution"
        );
        self.execute_spec(&mut spec);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::aggregator::ModOp;
    use crate::effect::{EffectContext, GameplayEffectDef, GameplayEffectSpec};
    use crate::magnitude::MagnitudeFormula;
    use crate::prediction::PredictionKey;

    use std::sync::Arc;

    fn damage(amount: f32) -> GameplayEffectSpec {
        let def = GameplayEffectDef::instant("Damage").with_modifier(
            health(),
            ModOp::Add,
            MagnitudeFormula::constant(-amount),
        );
        GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::default())
    }

    #[test]
    fn instant_execution_changes_base() {
        let mut container = container();
        container.apply_gameplay_effect_spec(damage(20.0), PredictionKey::NONE);
        assert_eq!(container.get_numeric_attribute(&health()), 80.0);
        assert_eq!(container.get_numeric_attribute_base(&health()), 80.0);
        assert!(container.iter().next().is_none());
    }

    #[test]
    fn post_hook_clamp_reaches_base_value() {
        let mut container = container();
        container.apply_gameplay_effect_spec(damage(250.0), PredictionKey::NONE);
        assert_eq!(container.get_numeric_attribute(&health()), 0.0);

        // force an aggregator and hit again; the clamp must reach its base
        let heal = GameplayEffectDef::infinite("Vigor").with_modifier(
            health(),
            ModOp::Add,
            MagnitudeFormula::constant(0.0),
        );
        container.apply_gameplay_effect_spec(
            GameplayEffectSpec::new(Arc::new(heal), 1.0, EffectContext::default()),
            PredictionKey::NONE,
        );
        container.apply_gameplay_effect_spec(damage(10.0), PredictionKey::NONE);
        assert_eq!(container.get_numeric_attribute(&health()), 0.0);
        assert_eq!(container.get_numeric_attribute_base(&health()), 0.0);
    }
}
