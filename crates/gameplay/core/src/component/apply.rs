use std::sync::Arc;

use super::{AbilitySystemComponent, ApplyRejection};
use crate::config::GameplayConfig;
use crate::container::ApplyOutcome;
use crate::cue::CueEvent;
use crate::effect::{
    EffectContext, EffectDefId, EffectDuration, GameplayEffectDef, GameplayEffectSpec,
};
use crate::error::GameplayError;
use crate::prediction::PredictionKey;
use crate::rng::compute_seed;

impl AbilitySystemComponent {
    /// Builds a spec for a library effect with this component as source.
    pub fn make_outgoing_spec(
        &mut self,
        id: &EffectDefId,
        level: f32,
    ) -> Result<GameplayEffectSpec, ApplyRejection> {
        let def = self
            .ctx
            .effect(id)
            .cloned()
            .ok_or_else(|| ApplyRejection::UnknownEffect { effect: id.clone() })?;
        Ok(self.make_outgoing_spec_from(def, level))
    }

    /// Builds a spec from a definition: instigator context, the owner's tags
    /// as source tags and snapshots of every source capture.
    pub fn make_outgoing_spec_from(
        &mut self,
        def: Arc<GameplayEffectDef>,
        level: f32,
    ) -> GameplayEffectSpec {
        let mut spec =
            GameplayEffectSpec::new(def, level, EffectContext::from_instigator(self.owner()));
        spec.capture_source_tags(&self.container.owned_tags().explicit_tags());
        spec.declare_captures(self.ctx.calculations());
        let errors = spec.capture_attribute_data_from_source(&mut self.container);
        self.container.log_spec_errors(&errors);
        spec
    }

    /// Applies a spec to this component's owner.
    ///
    /// # Gates (in order)
    ///
    /// 1. Authority, or a local prediction key on a client
    /// 2. Periodic specs are never predicted: the authority drops the key,
    ///    a client rejects
    /// 3. Immunity granted by active effects
    /// 4. An attribute set for every modified attribute
    /// 5. Chance to apply
    /// 6. Application tag requirements
    ///
    /// A predicted instant spec on a client is stored as an infinite effect
    /// until the server's result arrives. After a successful application the
    /// authority removes effects matching `remove_effects_with_tags`, and
    /// linked effects are applied to the same owner.
    pub fn apply_gameplay_effect_spec_to_self(
        &mut self,
        spec: GameplayEffectSpec,
        prediction_key: PredictionKey,
    ) -> Result<ApplyOutcome, ApplyRejection> {
        let result = self.apply_at_depth(spec, prediction_key, 0);
        self.flush();
        result
    }

    /// Applies a spec built by this component to another owner. The
    /// target's gates decide.
    pub fn apply_gameplay_effect_spec_to_target(
        &mut self,
        spec: GameplayEffectSpec,
        target: &mut AbilitySystemComponent,
        prediction_key: PredictionKey,
    ) -> Result<ApplyOutcome, ApplyRejection> {
        tracing::trace!(
            target: "gameplay::component",
            source = %self.owner(),
            target_owner = %target.owner(),
            effect = %spec.def().id,
            "applying to target"
        );
        target.apply_gameplay_effect_spec_to_self(spec, prediction_key)
    }

    fn apply_at_depth(
        &mut self,
        mut spec: GameplayEffectSpec,
        prediction_key: PredictionKey,
        depth: u32,
    ) -> Result<ApplyOutcome, ApplyRejection> {
        let def = Arc::clone(spec.def());
        let effect = def.id.clone();
        let level = spec.level();
        if depth > GameplayConfig::MAX_LINKED_EFFECT_DEPTH {
            return self.reject(ApplyRejection::LinkDepthExceeded { effect, depth });
        }

        let mut key = prediction_key;
        if self.is_authority() {
            if key.is_valid_key() {
                key = key.received();
                if key.id() > self.caught_up_key.id() {
                    self.caught_up_key = key;
                }
            }
        } else if !key.is_local_client_key() {
            return self.reject(ApplyRejection::NoAuthority { effect });
        }

        if spec.is_periodic() && key.is_valid_key() {
            if !self.is_authority() {
                return self.reject(ApplyRejection::PredictedPeriodic { effect });
            }
            key = PredictionKey::NONE;
        }

        if let Some(blocker) = self.container.immunity_blocking(&spec) {
            return self.reject(ApplyRejection::Immune { effect, blocker });
        }

        if let Some(modifier) = def
            .modifiers
            .iter()
            .find(|m| !self.container.attribute_sets().has_set_for(&m.attribute))
        {
            let attribute = modifier.attribute.clone();
            return self.reject(ApplyRejection::MissingAttributeSet { effect, attribute });
        }

        self.nonce += 1;
        let chance = spec.chance_to_apply_to_target();
        if chance < 1.0 {
            let seed = compute_seed(self.ctx.config().rng_seed, self.nonce, self.owner().0, depth);
            let roll = self.ctx.rng().roll_unit(seed);
            if roll >= chance {
                return self.reject(ApplyRejection::ChanceFailed {
                    effect,
                    chance,
                    roll,
                });
            }
        }

        if !def
            .application_requirements
            .requirements_met(self.container.owned_tags())
        {
            return self.reject(ApplyRejection::ApplicationTagsUnmet { effect });
        }

        let predicted_instant =
            !self.is_authority() && key.is_local_client_key() && spec.duration().is_instant();
        if predicted_instant {
            spec.set_duration(EffectDuration::Infinite);
        }

        let linked = spec.take_target_effect_specs();
        let cue_spec = predicted_instant.then(|| spec.clone());
        let outcome = self.container.apply_gameplay_effect_spec(spec, key);
        if let Some(cue_spec) = cue_spec {
            self.container.push_effect_cues(&cue_spec, CueEvent::Executed);
        }

        tracing::debug!(
            target: "gameplay::component",
            owner = %self.owner(),
            effect = %effect,
            key = %key,
            outcome = ?outcome,
            depth,
            "applied effect"
        );

        if self.is_authority() && !def.remove_effects_with_tags.is_empty() {
            let removed = self
                .container
                .remove_effects_with_tags(&def.remove_effects_with_tags, outcome.handle());
            if removed > 0 {
                tracing::debug!(
                    target: "gameplay::component",
                    owner = %self.owner(),
                    effect = %effect,
                    removed,
                    "removed effects by tag"
                );
            }
        }

        if let ApplyOutcome::Stacked {
            overflowed: true, ..
        } = outcome
        {
            for id in &def.stacking.overflow_effects {
                self.apply_linked(id, &def, level, key, depth);
            }
            if def.stacking.deny_overflow_application {
                return Ok(outcome);
            }
        }

        for linked_spec in linked {
            if let Err(rejection) = self.apply_at_depth(linked_spec, key, depth + 1) {
                self.log_linked_rejection(&effect, &rejection);
            }
        }
        for id in &def.linked_effects {
            self.apply_linked(id, &def, level, key, depth);
        }

        Ok(outcome)
    }

    /// Applies a library effect on behalf of `parent` at the parent's level.
    fn apply_linked(
        &mut self,
        id: &EffectDefId,
        parent: &GameplayEffectDef,
        level: f32,
        key: PredictionKey,
        depth: u32,
    ) {
        let result = self
            .ctx
            .effect(id)
            .cloned()
            .ok_or_else(|| ApplyRejection::UnknownEffect { effect: id.clone() })
            .and_then(|def| {
                let spec = self.make_outgoing_spec_from(def, level);
                self.apply_at_depth(spec, key, depth + 1)
            });
        if let Err(rejection) = result {
            self.log_linked_rejection(&parent.id, &rejection);
        }
    }

    fn log_linked_rejection(&self, parent: &EffectDefId, rejection: &ApplyRejection) {
        tracing::debug!(
            target: "gameplay::component",
            owner = %self.owner(),
            parent = %parent,
            error = %rejection,
            code = rejection.error_code(),
            "linked effect not applied"
        );
    }

    fn reject(&self, rejection: ApplyRejection) -> Result<ApplyOutcome, ApplyRejection> {
        tracing::debug!(
            target: "gameplay::component",
            owner = %self.owner(),
            error = %rejection,
            code = rejection.error_code(),
            severity = rejection.severity().as_str(),
            "application rejected"
        );
        Err(rejection)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::NetRole;
    use super::super::test_support::*;
    use super::*;
    use crate::aggregator::ModOp;
    use crate::context::AbilitySystemContext;
    use crate::effect::{EffectLibrary, EntityId, LibraryError, StackingRules};
    use crate::magnitude::MagnitudeFormula;
    use crate::tags::{GameplayTag, TagContainer, TagRequirements};

    fn library_context(defs: Vec<GameplayEffectDef>) -> Arc<AbilitySystemContext> {
        AbilitySystemContext::builder()
            .library(EffectLibrary::from_defs(defs).unwrap())
            .build()
    }

    fn damage(amount: f32) -> GameplayEffectDef {
        GameplayEffectDef::instant("Damage").with_modifier(
            health(),
            ModOp::Add,
            MagnitudeFormula::constant(-amount),
        )
    }

    #[test]
    fn client_without_key_has_no_authority() {
        let ctx = library_context(vec![damage(20.0)]);
        let mut client = component(&ctx, NetRole::Client);
        let spec = client.make_outgoing_spec(&"Damage".into(), 1.0).unwrap();
        let error = client
            .apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
            .unwrap_err();
        assert_eq!(error.error_code(), "APPLY_NO_AUTHORITY");
        assert_eq!(client.get_numeric_attribute(&health()), 100.0);
    }

    #[test]
    fn predicted_periodic_is_rejected_on_client_only() {
        let dot = GameplayEffectDef::timed("Bleed", 4.0)
            .with_period(1.0)
            .with_modifier(health(), ModOp::Add, MagnitudeFormula::constant(-1.0));
        let ctx = library_context(vec![dot]);

        let mut client = component(&ctx, NetRole::Client);
        let key = client.next_prediction_key();
        let spec = client.make_outgoing_spec(&"Bleed".into(), 1.0).unwrap();
        assert!(matches!(
            client.apply_gameplay_effect_spec_to_self(spec, key),
            Err(ApplyRejection::PredictedPeriodic { .. })
        ));

        let mut server = component(&ctx, NetRole::Authority);
        let spec = server.make_outgoing_spec(&"Bleed".into(), 1.0).unwrap();
        let handle = server
            .apply_gameplay_effect_spec_to_self(spec, key)
            .unwrap()
            .handle()
            .unwrap();
        assert!(
            !server
                .container()
                .get(handle)
                .unwrap()
                .prediction_key()
                .is_valid_key()
        );
    }

    #[test]
    fn immunity_blocks_matching_sources() {
        let ward = GameplayEffectDef::infinite("FireWard").with_immunity(TagRequirements::requiring(
            TagContainer::from_names(["Damage.Fire"]),
        ));
        let burn = damage(30.0).with_asset_tags(TagContainer::from_names(["Damage.Fire.Dot"]));
        let ctx = library_context(vec![ward]);
        let mut asc = component(&ctx, NetRole::Authority);

        let spec = asc.make_outgoing_spec(&"FireWard".into(), 1.0).unwrap();
        let ward_handle = asc
            .apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
            .unwrap()
            .handle()
            .unwrap();

        let spec = asc.make_outgoing_spec_from(Arc::new(burn), 1.0);
        assert_eq!(
            asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE),
            Err(ApplyRejection::Immune {
                effect: "Damage".into(),
                blocker: ward_handle,
            })
        );
        assert_eq!(asc.get_numeric_attribute(&health()), 100.0);
    }

    #[test]
    fn missing_set_and_tag_requirements_reject() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut asc = component(&ctx, NetRole::Authority);

        let drain = GameplayEffectDef::instant("Drain").with_modifier(
            crate::attribute::AttributeHandle::new("Arcana", "Mana"),
            ModOp::Add,
            MagnitudeFormula::constant(-5.0),
        );
        let spec = asc.make_outgoing_spec_from(Arc::new(drain), 1.0);
        assert!(matches!(
            asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE),
            Err(ApplyRejection::MissingAttributeSet { .. })
        ));

        let execute = damage(50.0).with_application_requirements(TagRequirements::requiring(
            TagContainer::from_names(["State.Stunned"]),
        ));
        let execute = Arc::new(execute);
        let spec = asc.make_outgoing_spec_from(Arc::clone(&execute), 1.0);
        assert!(matches!(
            asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE),
            Err(ApplyRejection::ApplicationTagsUnmet { .. })
        ));

        asc.add_loose_gameplay_tag(&GameplayTag::new("State.Stunned"));
        let spec = asc.make_outgoing_spec_from(execute, 1.0);
        assert_eq!(
            asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE),
            Ok(ApplyOutcome::Executed)
        );
        assert_eq!(asc.get_numeric_attribute(&health()), 50.0);
    }

    #[test]
    fn zero_chance_never_applies() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut asc = component(&ctx, NetRole::Authority);
        let spec = asc.make_outgoing_spec_from(Arc::new(damage(10.0).with_chance(0.0)), 1.0);
        assert!(matches!(
            asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE),
            Err(ApplyRejection::ChanceFailed { .. })
        ));
        assert_eq!(asc.get_numeric_attribute(&health()), 100.0);
    }

    #[test]
    fn predicted_instant_is_held_as_infinite() {
        let ctx = library_context(vec![damage(20.0)]);
        let mut client = component(&ctx, NetRole::Client);
        let key = client.next_prediction_key();
        let spec = client.make_outgoing_spec(&"Damage".into(), 1.0).unwrap();

        let outcome = client.apply_gameplay_effect_spec_to_self(spec, key).unwrap();
        let handle = outcome.handle().unwrap();
        assert_eq!(client.get_numeric_attribute(&health()), 80.0);
        assert_eq!(client.get_numeric_attribute_base(&health()), 100.0);
        assert!(client.container().get(handle).unwrap().is_predicted());

        client.on_prediction_key_rejected(key);
        assert_eq!(client.get_numeric_attribute(&health()), 100.0);
        assert!(client.container().is_empty());
    }

    #[test]
    fn remove_with_tags_spares_the_new_effect() {
        let burn = GameplayEffectDef::infinite("Burn")
            .with_granted_tags(TagContainer::from_names(["State.Burning"]));
        let douse = GameplayEffectDef::timed("Douse", 5.0)
            .with_granted_tags(TagContainer::from_names(["State.Wet"]))
            .removing_effects_with(TagContainer::from_names(["State.Burning", "State.Wet"]));
        let ctx = library_context(vec![burn, douse]);
        let mut asc = component(&ctx, NetRole::Authority);

        let spec = asc.make_outgoing_spec(&"Burn".into(), 1.0).unwrap();
        asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
            .unwrap();
        let spec = asc.make_outgoing_spec(&"Douse".into(), 1.0).unwrap();
        asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
            .unwrap();

        assert!(!asc.has_matching_tag(&GameplayTag::new("State.Burning")));
        assert!(asc.has_matching_tag(&GameplayTag::new("State.Wet")));
        assert_eq!(asc.container().len(), 1);
    }

    #[test]
    fn linked_and_overflow_effects_apply() {
        let shock = GameplayEffectDef::instant("Shock").with_modifier(
            armor(),
            ModOp::Add,
            MagnitudeFormula::constant(-1.0),
        );
        let charge = GameplayEffectDef::infinite("Charge")
            .with_stacking(StackingRules {
                overflow_effects: vec!["Shock".into()],
                ..StackingRules::aggregate_by_target(2)
            })
            .with_linked_effect("Shock");
        let ctx = library_context(vec![shock, charge]);
        let mut asc = component(&ctx, NetRole::Authority);

        for _ in 0..3 {
            let spec = asc.make_outgoing_spec(&"Charge".into(), 1.0).unwrap();
            asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
                .unwrap();
        }
        // three linked shocks and one overflow shock
        assert_eq!(asc.get_numeric_attribute(&armor()), 6.0);
        assert_eq!(asc.container().stack_count_of(&"Charge".into()), 2);
    }

    #[test]
    fn self_linked_effects_are_rejected_by_the_library() {
        let echo = GameplayEffectDef::instant("Echo")
            .with_modifier(armor(), ModOp::Add, MagnitudeFormula::constant(1.0))
            .with_linked_effect("Echo");
        let error = EffectLibrary::from_defs([echo]).unwrap_err();
        assert!(matches!(error, LibraryError::LinkCycle(_)));
        assert_eq!(error.error_code(), "LIBRARY_LINK_CYCLE");
    }

    #[test]
    fn nested_target_specs_stop_at_depth_limit() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut asc = component(&ctx, NetRole::Authority);
        let plate = Arc::new(GameplayEffectDef::instant("Plate").with_modifier(
            armor(),
            ModOp::Add,
            MagnitudeFormula::constant(1.0),
        ));
        let limit = GameplayConfig::MAX_LINKED_EFFECT_DEPTH;

        let mut chain = asc.make_outgoing_spec_from(Arc::clone(&plate), 1.0);
        for _ in 0..limit + 3 {
            let mut outer = asc.make_outgoing_spec_from(Arc::clone(&plate), 1.0);
            outer.add_target_effect_spec(chain);
            chain = outer;
        }
        asc.apply_gameplay_effect_spec_to_self(chain, PredictionKey::NONE)
            .unwrap();

        // depths 0 through the limit apply; the next one is rejected along
        // with everything nested under it
        assert_eq!(asc.get_numeric_attribute(&armor()), 10.0 + (limit + 1) as f32);
    }

    #[test]
    fn applying_to_a_target_uses_source_tags() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut source = component(&ctx, NetRole::Authority);
        let mut target = AbilitySystemComponent::new(Arc::clone(&ctx), EntityId(2), NetRole::Authority)
            .with_attribute_set(vitals());
        source.add_loose_gameplay_tag(&GameplayTag::new("Team.Red"));

        let spec = source.make_outgoing_spec_from(Arc::new(damage(15.0)), 1.0);
        assert!(
            spec.captured_source_tags()
                .contains_exact(&GameplayTag::new("Team.Red"))
        );
        source
            .apply_gameplay_effect_spec_to_target(spec, &mut target, PredictionKey::NONE)
            .unwrap();
        assert_eq!(target.get_numeric_attribute(&health()), 85.0);
        assert_eq!(source.get_numeric_attribute(&health()), 100.0);
    }
}
