use std::sync::Arc;

use super::{AbilitySystemComponent, AttributeError};
use crate::aggregator::ModOp;
use crate::attribute::AttributeHandle;
use crate::effect::{EffectContext, GameplayEffectDef, GameplayEffectSpec};
use crate::magnitude::MagnitudeFormula;

impl AbilitySystemComponent {
    /// Final value of `attribute`; 0 when no set owns it.
    pub fn get_numeric_attribute(&self, attribute: &AttributeHandle) -> f32 {
        self.container.get_numeric_attribute(attribute)
    }

    pub fn get_numeric_attribute_base(&self, attribute: &AttributeHandle) -> f32 {
        self.container.get_numeric_attribute_base(attribute)
    }

    /// Overwrites the base value. Authority only.
    pub fn set_numeric_attribute_base(
        &mut self,
        attribute: &AttributeHandle,
        value: f32,
    ) -> Result<(), AttributeError> {
        self.check_attribute_write(attribute)?;
        self.container.set_numeric_attribute_base(attribute, value);
        self.flush();
        Ok(())
    }

    /// Executes one loose modifier against the base value, as an instant
    /// effect would. Authority only.
    pub fn apply_mod_to_attribute(
        &mut self,
        attribute: &AttributeHandle,
        op: ModOp,
        magnitude: f32,
    ) -> Result<(), AttributeError> {
        self.check_attribute_write(attribute)?;
        let def = GameplayEffectDef::instant("LooseModifier").with_modifier(
            attribute.clone(),
            op,
            MagnitudeFormula::constant(magnitude),
        );
        let spec = GameplayEffectSpec::new(
            Arc::new(def),
            1.0,
            EffectContext::from_instigator(self.owner()),
        );
        self.container.execute_active_effects_from(spec);
        self.flush();
        Ok(())
    }

    /// Whether every additive modifier of `def` at `level` would leave its
    /// attribute at or above zero. Used for cost checks before applying.
    pub fn can_apply_attribute_modifiers(&mut self, def: &Arc<GameplayEffectDef>, level: f32) -> bool {
        let ctx = Arc::clone(&self.ctx);
        let mut spec = self.make_outgoing_spec_from(Arc::clone(def), level);
        self.container.capture_target_data(&mut spec);
        let errors =
            spec.attempt_calculate_magnitudes(Some(self.container.aggregators()), ctx.calculations());
        if !errors.is_empty() {
            self.container.log_spec_errors(&errors);
            return false;
        }

        def.modifiers.iter().enumerate().all(|(index, modifier)| {
            if modifier.op != ModOp::Add {
                return true;
            }
            if !self.container.attribute_sets().has_set_for(&modifier.attribute) {
                return false;
            }
            let magnitude = spec.stacked_modifier_magnitude(index).unwrap_or(0.0);
            self.get_numeric_attribute(&modifier.attribute) + magnitude >= 0.0
        })
    }

    fn check_attribute_write(&self, attribute: &AttributeHandle) -> Result<(), AttributeError> {
        let error = if !self.is_authority() {
            AttributeError::NotAuthority {
                attribute: attribute.clone(),
            }
        } else if self.container.attribute_sets().numeric_value(attribute).is_none() {
            AttributeError::MissingAttributeSet {
                attribute: attribute.clone(),
            }
        } else {
            return Ok(());
        };
        tracing::debug!(
            target: "gameplay::component",
            owner = %self.owner(),
            error = %error,
            "attribute write rejected"
        );
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::NetRole;
    use super::super::test_support::*;
    use super::*;
    use crate::context::AbilitySystemContext;
    use crate::prediction::PredictionKey;

    #[test]
    fn loose_writes_need_authority() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut client = component(&ctx, NetRole::Client);
        assert_eq!(
            client.set_numeric_attribute_base(&armor(), 50.0),
            Err(AttributeError::NotAuthority { attribute: armor() })
        );
        assert_eq!(
            client.apply_mod_to_attribute(&armor(), ModOp::Add, 5.0),
            Err(AttributeError::NotAuthority { attribute: armor() })
        );
        assert_eq!(client.get_numeric_attribute(&armor()), 10.0);

        let mut server = component(&ctx, NetRole::Authority);
        let mana = AttributeHandle::new("Arcana", "Mana");
        assert_eq!(
            server.set_numeric_attribute_base(&mana, 5.0),
            Err(AttributeError::MissingAttributeSet { attribute: mana.clone() })
        );
        assert_eq!(server.get_numeric_attribute(&mana), 0.0);
    }

    #[test]
    fn loose_mod_goes_through_the_aggregator() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut asc = component(&ctx, NetRole::Authority);
        let plate = GameplayEffectDef::infinite("Plate").with_modifier(
            armor(),
            ModOp::Multiply,
            MagnitudeFormula::constant(2.0),
        );
        let spec = asc.make_outgoing_spec_from(Arc::new(plate), 1.0);
        asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
            .unwrap();
        assert_eq!(asc.get_numeric_attribute(&armor()), 20.0);

        asc.apply_mod_to_attribute(&armor(), ModOp::Add, 5.0).unwrap();
        assert_eq!(asc.get_numeric_attribute_base(&armor()), 15.0);
        assert_eq!(asc.get_numeric_attribute(&armor()), 30.0);

        asc.set_numeric_attribute_base(&armor(), 1.0).unwrap();
        assert_eq!(asc.get_numeric_attribute(&armor()), 2.0);
    }

    #[test]
    fn cost_check_reads_current_values() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut asc = component(&ctx, NetRole::Authority);
        let cost = |amount: f32| {
            Arc::new(GameplayEffectDef::instant("Cost").with_modifier(
                armor(),
                ModOp::Add,
                MagnitudeFormula::constant(-amount),
            ))
        };
        assert!(asc.can_apply_attribute_modifiers(&cost(10.0), 1.0));
        assert!(!asc.can_apply_attribute_modifiers(&cost(10.5), 1.0));
        assert_eq!(asc.get_numeric_attribute(&armor()), 10.0);
    }
}
