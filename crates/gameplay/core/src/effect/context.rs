use std::fmt;

/// Opaque identifier of a component's owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a hit landed, for cue presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HitResult {
    pub location: [f32; 3],
    pub normal: [f32; 3],
}

/// Who caused an effect and how. Carried on the spec and handed to cues.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EffectContext {
    pub instigator: Option<EntityId>,
    pub effect_causer: Option<EntityId>,
    pub hit_result: Option<HitResult>,
    /// Name of the ability that made the spec, if any.
    pub ability: Option<String>,
    pub ability_level: u32,
}

impl EffectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instigator(instigator: EntityId) -> Self {
        Self {
            instigator: Some(instigator),
            effect_causer: Some(instigator),
            ..Self::default()
        }
    }

    pub fn with_causer(mut self, causer: EntityId) -> Self {
        self.effect_causer = Some(causer);
        self
    }

    pub fn with_hit_result(mut self, hit: HitResult) -> Self {
        self.hit_result = Some(hit);
        self
    }

    pub fn with_ability(mut self, ability: impl Into<String>, level: u32) -> Self {
        self.ability = Some(ability.into());
        self.ability_level = level;
        self
    }
}
