use super::{ActiveGameplayEffect, EffectDefId};
use crate::attribute::AttributeHandle;
use crate::tags::{TagContainer, TagSource};

/// Filter over active effects. Empty fields match everything; the default
/// query matches every live effect.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ActiveEffectQuery {
    /// Any of these must match the effect's granted tags.
    pub owning_tags: TagContainer,
    /// Any of these must match the effect's asset tags.
    pub effect_tags: TagContainer,
    /// None of these may match the effect's asset tags.
    pub effect_rejection_tags: TagContainer,
    pub modifying_attribute: Option<AttributeHandle>,
    pub effect: Option<EffectDefId>,
}

impl ActiveEffectQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_owning_tags(tags: TagContainer) -> Self {
        Self {
            owning_tags: tags,
            ..Self::default()
        }
    }

    pub fn with_effect_tags(tags: TagContainer) -> Self {
        Self {
            effect_tags: tags,
            ..Self::default()
        }
    }

    pub fn modifying(attribute: AttributeHandle) -> Self {
        Self {
            modifying_attribute: Some(attribute),
            ..Self::default()
        }
    }

    pub fn of_effect(id: impl Into<EffectDefId>) -> Self {
        Self {
            effect: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn rejecting(mut self, tags: TagContainer) -> Self {
        self.effect_rejection_tags = tags;
        self
    }

    pub fn matches(&self, effect: &ActiveGameplayEffect) -> bool {
        let spec = effect.spec();
        if let Some(id) = &self.effect {
            if &spec.def().id != id {
                return false;
            }
        }
        if let Some(attribute) = &self.modifying_attribute {
            if !spec.def().modifies(attribute) {
                return false;
            }
        }
        if !self.owning_tags.is_empty()
            && !spec.all_granted_tags().has_any_matching(&self.owning_tags)
        {
            return false;
        }
        let needs_asset_tags = !self.effect_tags.is_empty() || !self.effect_rejection_tags.is_empty();
        if needs_asset_tags {
            let asset_tags = spec.all_asset_tags();
            if !self.effect_tags.is_empty() && !asset_tags.has_any_matching(&self.effect_tags) {
                return false;
            }
            if asset_tags.has_any_matching(&self.effect_rejection_tags) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::aggregator::ModOp;
    use crate::effect::{ActiveEffectHandle, EffectContext, GameplayEffectDef, GameplayEffectSpec};
    use crate::magnitude::MagnitudeFormula;
    use crate::prediction::PredictionKey;

    fn burning() -> ActiveGameplayEffect {
        let def = GameplayEffectDef::timed("GE_Burn", 5.0)
            .with_asset_tags(TagContainer::from_names(["Damage.Fire.Dot"]))
            .with_granted_tags(TagContainer::from_names(["Status.Burning"]))
            .with_modifier(
                AttributeHandle::new("Vitals", "Health"),
                ModOp::Add,
                MagnitudeFormula::constant(-1.0),
            );
        ActiveGameplayEffect::new(
            ActiveEffectHandle::from_parts(0, 1),
            GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::new()),
            0.0,
            PredictionKey::NONE,
        )
    }

    #[test]
    fn tag_queries_match_hierarchically() {
        let effect = burning();
        assert!(ActiveEffectQuery::all().matches(&effect));
        assert!(ActiveEffectQuery::with_owning_tags(TagContainer::from_names(["Status"]))
            .matches(&effect));
        assert!(ActiveEffectQuery::with_effect_tags(TagContainer::from_names(["Damage.Fire"]))
            .matches(&effect));
        assert!(!ActiveEffectQuery::with_effect_tags(TagContainer::from_names(["Damage.Fire"]))
            .rejecting(TagContainer::from_names(["Damage.Fire.Dot"]))
            .matches(&effect));
        assert!(!ActiveEffectQuery::with_owning_tags(TagContainer::from_names(["Status.Frozen"]))
            .matches(&effect));
    }

    #[test]
    fn attribute_and_definition_filters() {
        let effect = burning();
        assert!(ActiveEffectQuery::modifying(AttributeHandle::new("Vitals", "Health"))
            .matches(&effect));
        assert!(!ActiveEffectQuery::modifying(AttributeHandle::new("Vitals", "Mana"))
            .matches(&effect));
        assert!(ActiveEffectQuery::of_effect("GE_Burn").matches(&effect));
        assert!(!ActiveEffectQuery::of_effect("GE_Freeze").matches(&effect));
    }
}
