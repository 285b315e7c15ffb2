use std::fmt;
use std::sync::Arc;

use arrayvec::ArrayVec;

use super::StackingRules;
use crate::aggregator::ModOp;
use crate::attribute::AttributeHandle;
use crate::config::GameplayConfig;
use crate::cue::EffectCue;
use crate::magnitude::{MagnitudeFormula, ScalableFloat};
use crate::tags::{TagContainer, TagRequirements};

/// Identifier of an effect definition inside an [`EffectLibrary`](super::EffectLibrary).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EffectDefId(Arc<str>);

impl EffectDefId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for EffectDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EffectDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectDefId({})", self.0)
    }
}

impl From<&str> for EffectDefId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DurationPolicy {
    /// Executes once against base values and is never stored.
    #[default]
    Instant,
    Infinite,
    HasDuration(MagnitudeFormula),
}

impl DurationPolicy {
    pub fn seconds(seconds: f32) -> Self {
        Self::HasDuration(MagnitudeFormula::constant(seconds))
    }

    pub fn is_instant(&self) -> bool {
        matches!(self, Self::Instant)
    }
}

/// One attribute modification declared by an effect.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifierInfo {
    pub attribute: AttributeHandle,
    pub op: ModOp,
    pub magnitude: MagnitudeFormula,
    /// Checked against the source tags at evaluation time.
    #[cfg_attr(feature = "serde", serde(default))]
    pub source_tags: TagRequirements,
    /// Checked against the target's tags at evaluation time.
    #[cfg_attr(feature = "serde", serde(default))]
    pub target_tags: TagRequirements,
}

impl ModifierInfo {
    pub fn new(attribute: AttributeHandle, op: ModOp, magnitude: MagnitudeFormula) -> Self {
        Self {
            attribute,
            op,
            magnitude,
            source_tags: TagRequirements::new(),
            target_tags: TagRequirements::new(),
        }
    }

    pub fn with_source_tags(mut self, requirements: TagRequirements) -> Self {
        self.source_tags = requirements;
        self
    }

    pub fn with_target_tags(mut self, requirements: TagRequirements) -> Self {
        self.target_tags = requirements;
        self
    }
}

/// Static description of an effect. Shared by every spec made from it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GameplayEffectDef {
    pub id: EffectDefId,
    pub duration: DurationPolicy,
    /// Seconds between periodic executions; 0 means not periodic.
    pub period: ScalableFloat,
    /// Execute once immediately when applied instead of waiting one period.
    pub execute_periodic_on_application: bool,
    pub modifiers: Vec<ModifierInfo>,
    /// Names of registered execution calculations.
    pub executions: ArrayVec<String, { GameplayConfig::MAX_EXECUTIONS_PER_EFFECT }>,
    pub chance_to_apply: ScalableFloat,
    /// Applied to the same target after this effect applies successfully.
    pub linked_effects: Vec<EffectDefId>,
    pub cues: ArrayVec<EffectCue, { GameplayConfig::MAX_CUES_PER_EFFECT }>,
    pub stacking: StackingRules,
    /// Describe the effect itself; matched by queries and immunity.
    pub asset_tags: TagContainer,
    /// Given to the target while the effect is active and not inhibited.
    pub granted_tags: TagContainer,
    /// While unmet the effect is inhibited.
    pub ongoing_requirements: TagRequirements,
    /// Checked once on application.
    pub application_requirements: TagRequirements,
    /// Active effects whose asset or granted tags match any of these are
    /// removed when this effect applies.
    pub remove_effects_with_tags: TagContainer,
    /// Incoming specs whose source tags meet these requirements are rejected
    /// while this effect is active. Empty grants nothing.
    pub granted_immunity: TagRequirements,
}

impl Default for GameplayEffectDef {
    fn default() -> Self {
        Self {
            id: EffectDefId::default(),
            duration: DurationPolicy::Instant,
            period: ScalableFloat::zero(),
            execute_periodic_on_application: false,
            modifiers: Vec::new(),
            executions: ArrayVec::new(),
            chance_to_apply: ScalableFloat::one(),
            linked_effects: Vec::new(),
            cues: ArrayVec::new(),
            stacking: StackingRules::default(),
            asset_tags: TagContainer::new(),
            granted_tags: TagContainer::new(),
            ongoing_requirements: TagRequirements::new(),
            application_requirements: TagRequirements::new(),
            remove_effects_with_tags: TagContainer::new(),
            granted_immunity: TagRequirements::new(),
        }
    }
}

impl GameplayEffectDef {
    pub fn new(id: impl Into<EffectDefId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn instant(id: impl Into<EffectDefId>) -> Self {
        Self::new(id)
    }

    pub fn infinite(id: impl Into<EffectDefId>) -> Self {
        Self::new(id).with_duration(DurationPolicy::Infinite)
    }

    pub fn timed(id: impl Into<EffectDefId>, seconds: f32) -> Self {
        Self::new(id).with_duration(DurationPolicy::seconds(seconds))
    }

    pub fn with_duration(mut self, duration: DurationPolicy) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_period(mut self, seconds: f32) -> Self {
        self.period = ScalableFloat::constant(seconds);
        self
    }

    pub fn executing_on_application(mut self) -> Self {
        self.execute_periodic_on_application = true;
        self
    }

    pub fn with_modifier(
        self,
        attribute: AttributeHandle,
        op: ModOp,
        magnitude: MagnitudeFormula,
    ) -> Self {
        self.with_modifier_info(ModifierInfo::new(attribute, op, magnitude))
    }

    pub fn with_modifier_info(mut self, modifier: ModifierInfo) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Adds an execution; names past the per-effect limit are dropped.
    pub fn with_execution(mut self, name: impl Into<String>) -> Self {
        if self.executions.try_push(name.into()).is_err() {
            tracing::warn!(
                target: "gameplay::effect",
                effect = %self.id,
                "execution limit reached, dropping execution"
            );
        }
        self
    }

    pub fn with_chance(mut self, chance: f32) -> Self {
        self.chance_to_apply = ScalableFloat::constant(chance);
        self
    }

    pub fn with_linked_effect(mut self, id: impl Into<EffectDefId>) -> Self {
        self.linked_effects.push(id.into());
        self
    }

    /// Adds a cue; cues past the per-effect limit are dropped.
    pub fn with_cue(mut self, cue: EffectCue) -> Self {
        if self.cues.try_push(cue).is_err() {
            tracing::warn!(
                target: "gameplay::effect",
                effect = %self.id,
                "cue limit reached, dropping cue"
            );
        }
        self
    }

    pub fn with_stacking(mut self, stacking: StackingRules) -> Self {
        self.stacking = stacking;
        self
    }

    pub fn with_asset_tags(mut self, tags: TagContainer) -> Self {
        self.asset_tags = tags;
        self
    }

    pub fn with_granted_tags(mut self, tags: TagContainer) -> Self {
        self.granted_tags = tags;
        self
    }

    pub fn with_ongoing_requirements(mut self, requirements: TagRequirements) -> Self {
        self.ongoing_requirements = requirements;
        self
    }

    pub fn with_application_requirements(mut self, requirements: TagRequirements) -> Self {
        self.application_requirements = requirements;
        self
    }

    pub fn removing_effects_with(mut self, tags: TagContainer) -> Self {
        self.remove_effects_with_tags = tags;
        self
    }

    pub fn with_immunity(mut self, requirements: TagRequirements) -> Self {
        self.granted_immunity = requirements;
        self
    }

    pub fn is_instant(&self) -> bool {
        self.duration.is_instant()
    }

    /// True if any modifier targets `attribute`.
    pub fn modifies(&self, attribute: &AttributeHandle) -> bool {
        self.modifiers.iter().any(|m| &m.attribute == attribute)
    }
}
