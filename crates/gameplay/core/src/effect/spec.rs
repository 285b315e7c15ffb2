use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{DurationPolicy, EffectContext, EffectDefId, GameplayEffectDef, StackMagnitudePolicy};
use crate::aggregator::AggregatorMap;
use crate::attribute::AttributeHandle;
use crate::error::{ErrorSeverity, GameplayError};
use crate::magnitude::{
    AttributeCapture, CalculationRegistry, CaptureDefinition, CaptureSet, CaptureSource,
    MagnitudeError,
};
use crate::tags::{GameplayTag, TagContainer};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectDuration {
    Instant,
    Infinite,
    /// Seconds of world time.
    Finite(f32),
}

impl EffectDuration {
    /// Legacy numeric form: `0` is instant, any negative value is infinite.
    pub fn from_seconds(seconds: f32) -> Self {
        if seconds < 0.0 {
            Self::Infinite
        } else if seconds == 0.0 {
            Self::Instant
        } else {
            Self::Finite(seconds)
        }
    }

    pub fn is_instant(self) -> bool {
        matches!(self, Self::Instant)
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Self::Infinite)
    }

    pub fn seconds(self) -> Option<f32> {
        match self {
            Self::Finite(seconds) => Some(seconds),
            _ => None,
        }
    }
}

impl fmt::Display for EffectDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant => f.write_str("instant"),
            Self::Infinite => f.write_str("infinite"),
            Self::Finite(seconds) => write!(f, "{seconds}s"),
        }
    }
}

/// A spec value could not be computed.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SpecError {
    #[error("modifier {index} of {effect}: {source}")]
    Modifier {
        effect: EffectDefId,
        index: usize,
        #[source]
        source: MagnitudeError,
    },

    #[error("duration of {effect}: {source}")]
    Duration {
        effect: EffectDefId,
        #[source]
        source: MagnitudeError,
    },

    #[error("{effect} could not capture {attribute}")]
    Capture {
        effect: EffectDefId,
        attribute: AttributeHandle,
    },
}

impl GameplayError for SpecError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Modifier { .. } => "SPEC_MODIFIER_UNRESOLVED",
            Self::Duration { .. } => "SPEC_DURATION_UNRESOLVED",
            Self::Capture { .. } => "SPEC_CAPTURE_MISSING",
        }
    }
}

/// An effect definition bound to a level, a context and captured data.
///
/// Specs are made by the source, captured again on the target at application
/// time, then copied into the active effect. After capture only the stack
/// count and duration change.
#[derive(Clone, Debug, PartialEq)]
pub struct GameplayEffectSpec {
    def: Arc<GameplayEffectDef>,
    level: f32,
    context: EffectContext,
    duration: EffectDuration,
    period: f32,
    chance_to_apply: f32,
    /// Per declared modifier; `None` when its formula could not resolve.
    magnitudes: Vec<Option<f32>>,
    captures: CaptureSet,
    set_by_caller: BTreeMap<String, f32>,
    stack_count: u32,
    dynamic_granted_tags: TagContainer,
    dynamic_asset_tags: TagContainer,
    captured_source_tags: TagContainer,
    captured_target_tags: TagContainer,
    target_effect_specs: Vec<GameplayEffectSpec>,
    modified_attributes: BTreeMap<AttributeHandle, f32>,
}

impl GameplayEffectSpec {
    pub fn new(def: Arc<GameplayEffectDef>, level: f32, context: EffectContext) -> Self {
        let duration = match &def.duration {
            DurationPolicy::Instant => EffectDuration::Instant,
            DurationPolicy::Infinite => EffectDuration::Infinite,
            // non-static formulas are resolved once captures exist
            DurationPolicy::HasDuration(formula) => {
                EffectDuration::Finite(formula.static_value(level).unwrap_or(0.0))
            }
        };
        let magnitudes = def
            .modifiers
            .iter()
            .map(|m| m.magnitude.static_value(level))
            .collect();
        Self {
            level,
            context,
            duration,
            period: def.period.value_at_level(level).max(0.0),
            chance_to_apply: def.chance_to_apply.value_at_level(level),
            magnitudes,
            captures: CaptureSet::new(),
            set_by_caller: BTreeMap::new(),
            stack_count: 1,
            dynamic_granted_tags: TagContainer::new(),
            dynamic_asset_tags: TagContainer::new(),
            captured_source_tags: def.asset_tags.clone(),
            captured_target_tags: TagContainer::new(),
            target_effect_specs: Vec::new(),
            modified_attributes: BTreeMap::new(),
            def,
        }
    }

    pub fn def(&self) -> &Arc<GameplayEffectDef> {
        &self.def
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Changes the level, re-evaluating level-scaled period and chance.
    /// Magnitudes are recalculated by the next `attempt_calculate_magnitudes`.
    pub fn set_level(&mut self, level: f32) {
        self.level = level;
        self.period = self.def.period.value_at_level(level).max(0.0);
        self.chance_to_apply = self.def.chance_to_apply.value_at_level(level);
    }

    pub fn context(&self) -> &EffectContext {
        &self.context
    }

    pub fn duration(&self) -> EffectDuration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: EffectDuration) {
        self.duration = duration;
    }

    pub fn period(&self) -> f32 {
        self.period
    }

    pub fn is_periodic(&self) -> bool {
        self.period > 0.0
    }

    pub fn chance_to_apply_to_target(&self) -> f32 {
        self.chance_to_apply
    }

    pub fn stack_count(&self) -> u32 {
        self.stack_count
    }

    /// Sets the stack count (at least 1).
    pub fn set_stack_count(&mut self, count: u32) {
        self.stack_count = count.max(1);
    }

    pub fn captures(&self) -> &CaptureSet {
        &self.captures
    }

    pub(crate) fn captures_mut(&mut self) -> &mut CaptureSet {
        &mut self.captures
    }

    pub fn captured_source_tags(&self) -> &TagContainer {
        &self.captured_source_tags
    }

    pub(crate) fn set_captured_source_tags(&mut self, tags: TagContainer) {
        self.captured_source_tags = tags;
    }

    /// Adds the source owner's tags to the captured source tags.
    pub fn capture_source_tags(&mut self, owner_tags: &TagContainer) {
        self.captured_source_tags.extend_from(owner_tags);
    }

    pub fn captured_target_tags(&self) -> &TagContainer {
        &self.captured_target_tags
    }

    pub fn set_captured_target_tags(&mut self, tags: TagContainer) {
        self.captured_target_tags = tags;
    }

    pub fn dynamic_granted_tags(&self) -> &TagContainer {
        &self.dynamic_granted_tags
    }

    pub fn add_dynamic_granted_tag(&mut self, tag: GameplayTag) {
        self.dynamic_granted_tags.insert(tag);
    }

    pub(crate) fn replace_dynamic_granted_tags(&mut self, tags: TagContainer) {
        self.dynamic_granted_tags = tags;
    }

    pub fn dynamic_asset_tags(&self) -> &TagContainer {
        &self.dynamic_asset_tags
    }

    pub(crate) fn replace_dynamic_asset_tags(&mut self, tags: TagContainer) {
        self.dynamic_asset_tags = tags;
    }

    /// Asset tags added at runtime also count as source tags.
    pub fn add_dynamic_asset_tag(&mut self, tag: GameplayTag) {
        self.captured_source_tags.insert(tag.clone());
        self.dynamic_asset_tags.insert(tag);
    }

    /// Definition granted tags plus dynamic ones.
    pub fn all_granted_tags(&self) -> TagContainer {
        let mut tags = self.def.granted_tags.clone();
        tags.extend_from(&self.dynamic_granted_tags);
        tags
    }

    pub fn all_asset_tags(&self) -> TagContainer {
        let mut tags = self.def.asset_tags.clone();
        tags.extend_from(&self.dynamic_asset_tags);
        tags
    }

    pub fn set_set_by_caller_magnitude(&mut self, name: impl Into<String>, magnitude: f32) {
        self.set_by_caller.insert(name.into(), magnitude);
    }

    pub fn set_by_caller_magnitude(&self, name: &str) -> Option<f32> {
        self.set_by_caller.get(name).copied()
    }

    pub fn set_by_caller_magnitudes(&self) -> &BTreeMap<String, f32> {
        &self.set_by_caller
    }

    pub fn target_effect_specs(&self) -> &[GameplayEffectSpec] {
        &self.target_effect_specs
    }

    /// Queues a spec to be applied to the same target after this one.
    pub fn add_target_effect_spec(&mut self, spec: GameplayEffectSpec) {
        self.target_effect_specs.push(spec);
    }

    pub(crate) fn take_target_effect_specs(&mut self) -> Vec<GameplayEffectSpec> {
        std::mem::take(&mut self.target_effect_specs)
    }

    pub fn modified_attributes(&self) -> &BTreeMap<AttributeHandle, f32> {
        &self.modified_attributes
    }

    /// Accumulates the magnitude applied to `attribute` by an execution.
    pub fn record_modified_attribute(&mut self, attribute: &AttributeHandle, magnitude: f32) {
        *self
            .modified_attributes
            .entry(attribute.clone())
            .or_insert(0.0) += magnitude;
    }

    /// Declares every capture the definition's formulas and executions read.
    /// Idempotent.
    pub fn declare_captures(&mut self, calculations: &CalculationRegistry) {
        let def = Arc::clone(&self.def);
        let mut declared: Vec<CaptureDefinition> = def
            .modifiers
            .iter()
            .flat_map(|m| m.magnitude.captures(calculations))
            .collect();
        if let DurationPolicy::HasDuration(formula) = &def.duration {
            declared.extend(formula.captures(calculations));
        }
        for name in &def.executions {
            if let Some(execution) = calculations.execution(name) {
                declared.extend(execution.relevant_captures());
            }
        }
        for definition in declared {
            self.captures.declare(definition);
        }
    }

    /// Captures source-side attributes. Always snapshots.
    pub fn capture_attribute_data_from_source(
        &mut self,
        source: &mut dyn AttributeCapture,
    ) -> Vec<SpecError> {
        self.capture_side(CaptureSource::Source, source)
    }

    /// Captures target-side attributes; non-snapshot captures link to the
    /// target's live aggregators.
    pub fn capture_attribute_data_from_target(
        &mut self,
        target: &mut dyn AttributeCapture,
    ) -> Vec<SpecError> {
        self.capture_side(CaptureSource::Target, target)
    }

    fn capture_side(
        &mut self,
        side: CaptureSource,
        provider: &mut dyn AttributeCapture,
    ) -> Vec<SpecError> {
        self.captures
            .capture(side, provider)
            .into_iter()
            .map(|definition| SpecError::Capture {
                effect: self.def.id.clone(),
                attribute: definition.attribute,
            })
            .collect()
    }

    /// Evaluates every modifier formula. Modifiers that fail are marked
    /// invalid and skipped by the container; their errors are returned.
    pub fn attempt_calculate_magnitudes(
        &mut self,
        aggregators: Option<&AggregatorMap>,
        calculations: &CalculationRegistry,
    ) -> Vec<SpecError> {
        let def = Arc::clone(&self.def);
        let mut failures = Vec::new();
        let mut magnitudes = Vec::with_capacity(def.modifiers.len());
        for (index, modifier) in def.modifiers.iter().enumerate() {
            match modifier.magnitude.calculate(self, aggregators, calculations) {
                Ok(magnitude) => magnitudes.push(Some(magnitude)),
                Err(source) => {
                    magnitudes.push(None);
                    failures.push(SpecError::Modifier {
                        effect: def.id.clone(),
                        index,
                        source,
                    });
                }
            }
        }
        self.magnitudes = magnitudes;
        failures
    }

    /// Resolves a formula-driven duration. Static durations were set on
    /// construction and are left alone.
    pub fn attempt_calculate_duration(
        &mut self,
        aggregators: Option<&AggregatorMap>,
        calculations: &CalculationRegistry,
    ) -> Result<(), SpecError> {
        let def = Arc::clone(&self.def);
        let DurationPolicy::HasDuration(formula) = &def.duration else {
            return Ok(());
        };
        if formula.static_value(self.level).is_some() {
            return Ok(());
        }
        let seconds = formula
            .calculate(self, aggregators, calculations)
            .map_err(|source| SpecError::Duration {
                effect: def.id.clone(),
                source,
            })?;
        self.duration = EffectDuration::Finite(seconds);
        Ok(())
    }

    /// Unstacked magnitude of modifier `index`.
    pub fn modifier_magnitude(&self, index: usize) -> Option<f32> {
        self.magnitudes.get(index).copied().flatten()
    }

    /// Magnitude of modifier `index` scaled by the stack count when the
    /// definition's stacking rules say so.
    pub fn stacked_modifier_magnitude(&self, index: usize) -> Option<f32> {
        let magnitude = self.modifier_magnitude(index)?;
        let op = self.def.modifiers.get(index)?.op;
        Some(match self.def.stacking.magnitude {
            StackMagnitudePolicy::Scaled => op.stacked_magnitude(magnitude, self.stack_count),
            StackMagnitudePolicy::Unscaled => magnitude,
        })
    }

    pub fn modifier_magnitudes(&self) -> &[Option<f32>] {
        &self.magnitudes
    }

    pub(crate) fn set_modifier_magnitudes(&mut self, magnitudes: Vec<Option<f32>>) {
        self.magnitudes = magnitudes;
        self.magnitudes.resize(self.def.modifiers.len(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Aggregator, AggregatorId, ModOp};
    use crate::magnitude::{AttributeBasedFloat, MagnitudeFormula};

    struct Vitals(f32);

    impl AttributeCapture for Vitals {
        fn snapshot_attribute(&self, attribute: &AttributeHandle) -> Option<Aggregator> {
            (attribute.name() == "Strength").then(|| Aggregator::new(self.0))
        }

        fn link_attribute(&mut self, _attribute: &AttributeHandle) -> Option<AggregatorId> {
            None
        }
    }

    fn strength() -> AttributeHandle {
        AttributeHandle::new("Stats", "Strength")
    }

    fn health() -> AttributeHandle {
        AttributeHandle::new("Vitals", "Health")
    }

    #[test]
    fn legacy_duration_values() {
        assert_eq!(EffectDuration::from_seconds(-1.0), EffectDuration::Infinite);
        assert_eq!(EffectDuration::from_seconds(0.0), EffectDuration::Instant);
        assert_eq!(EffectDuration::from_seconds(2.5), EffectDuration::Finite(2.5));
    }

    #[test]
    fn attribute_based_magnitude_from_source_capture() {
        let def = GameplayEffectDef::instant("GE_Punch").with_modifier(
            health(),
            ModOp::Add,
            MagnitudeFormula::AttributeBased(
                AttributeBasedFloat::new(CaptureDefinition::source(strength()))
                    .with_coefficient(-2.0),
            ),
        );
        let registry = CalculationRegistry::new();
        let mut spec = GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::new());
        spec.declare_captures(&registry);
        assert!(spec.capture_attribute_data_from_source(&mut Vitals(7.0)).is_empty());
        assert!(spec.attempt_calculate_magnitudes(None, &registry).is_empty());
        assert_eq!(spec.modifier_magnitude(0), Some(-14.0));
    }

    #[test]
    fn unresolved_modifier_is_skipped_not_fatal() {
        let def = GameplayEffectDef::instant("GE_Damage")
            .with_modifier(health(), ModOp::Add, MagnitudeFormula::set_by_caller("Damage"))
            .with_modifier(health(), ModOp::Add, MagnitudeFormula::constant(-1.0));
        let registry = CalculationRegistry::new();
        let mut spec = GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::new());

        let failures = spec.attempt_calculate_magnitudes(None, &registry);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error_code(), "SPEC_MODIFIER_UNRESOLVED");
        assert_eq!(spec.modifier_magnitude(0), None);
        assert_eq!(spec.modifier_magnitude(1), Some(-1.0));

        spec.set_set_by_caller_magnitude("Damage", -20.0);
        assert!(spec.attempt_calculate_magnitudes(None, &registry).is_empty());
        assert_eq!(spec.modifier_magnitude(0), Some(-20.0));
    }

    #[test]
    fn stacked_magnitudes_follow_policy() {
        let def = GameplayEffectDef::infinite("GE_Might")
            .with_modifier(strength(), ModOp::Add, MagnitudeFormula::constant(5.0))
            .with_modifier(strength(), ModOp::Multiply, MagnitudeFormula::constant(1.5));
        let mut spec = GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::new());
        spec.set_stack_count(3);
        assert_eq!(spec.stacked_modifier_magnitude(0), Some(15.0));
        assert_eq!(spec.stacked_modifier_magnitude(1), Some(2.5));
        spec.set_stack_count(0);
        assert_eq!(spec.stack_count(), 1);
    }

    #[test]
    fn dynamic_asset_tags_become_source_tags() {
        let def = GameplayEffectDef::instant("GE_Fire")
            .with_asset_tags(TagContainer::from_names(["Damage.Fire"]));
        let mut spec = GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::new());
        spec.add_dynamic_asset_tag(GameplayTag::new("Damage.Critical"));
        assert_eq!(spec.captured_source_tags().len(), 2);
        assert_eq!(spec.all_asset_tags().len(), 2);
    }
}
