use super::ActiveGameplayEffectsContainer;
use crate::aggregator::EvaluateParams;
use crate::attribute::AttributeHandle;

impl ActiveGameplayEffectsContainer {
    /// Current value: the aggregator's evaluation when one exists, else the
    /// set's stored value. Unknown attributes read as 0.
    pub fn get_numeric_attribute(&self, attribute: &AttributeHandle) -> f32 {
        if !self.attribute_sets.has_set_for(attribute) {
            return 0.0;
        }
        match self.aggregators.by_attribute(attribute) {
            Some(aggregator) => {
                aggregator.evaluate(&EvaluateParams::new().with_target_tags(&self.owned_tags))
            }
            None => self.attribute_sets.numeric_value(attribute).unwrap_or(0.0),
        }
    }

    pub fn get_numeric_attribute_base(&self, attribute: &AttributeHandle) -> f32 {
        if !self.attribute_sets.has_set_for(attribute) {
            return 0.0;
        }
        match self.aggregators.by_attribute(attribute) {
            Some(aggregator) => aggregator.base_value(),
            None => self.attribute_sets.numeric_value(attribute).unwrap_or(0.0),
        }
    }

    /// Overwrites the base value; the current value is recomputed from the
    /// live mods. Returns false when no set owns the attribute.
    pub fn set_numeric_attribute_base(&mut self, attribute: &AttributeHandle, value: f32) -> bool {
        if self.attribute_sets.numeric_value(attribute).is_none() {
            return false;
        }
        self.locked(|container| match container.aggregators.find(attribute) {
            Some(id) => {
                let changed = container
                    .aggregators
                    .get_mut(id)
                    .is_some_and(|aggregator| aggregator.set_base_value(value));
                if changed {
                    container.mark_aggregator_changed(id);
                }
            }
            None => container.write_current_value(attribute, value),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use crate::aggregator::ModOp;
    use crate::attribute::AttributeHandle;
    use crate::effect::{EffectContext, GameplayEffectDef, GameplayEffectSpec};
    use crate::magnitude::MagnitudeFormula;
    use crate::prediction::PredictionKey;

    #[test]
    fn base_write_keeps_mods() {
        let mut container = container();
        let def = GameplayEffectDef::infinite("Plate").with_modifier(
            armor(),
            ModOp::Multiply,
            MagnitudeFormula::constant(1.5),
        );
        container.apply_gameplay_effect_spec(
            GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::default()),
            PredictionKey::NONE,
        );
        assert_eq!(container.get_numeric_attribute(&armor()), 15.0);

        assert!(container.set_numeric_attribute_base(&armor(), 20.0));
        assert_eq!(container.get_numeric_attribute_base(&armor()), 20.0);
        assert_eq!(container.get_numeric_attribute(&armor()), 30.0);
        assert_eq!(
            container.attribute_sets().numeric_value(&armor()),
            Some(30.0)
        );
    }

    #[test]
    fn unknown_attributes_read_zero() {
        let mut container = container();
        let mana = AttributeHandle::new("Arcana", "Mana");
        assert_eq!(container.get_numeric_attribute(&mana), 0.0);
        assert!(!container.set_numeric_attribute_base(&mana, 5.0));
    }
}
