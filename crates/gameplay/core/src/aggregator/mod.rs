//! Per-attribute modifier aggregation.
//!
//! An [`Aggregator`] holds one attribute's base value and the modifiers that
//! live effects currently contribute to it. The final value is computed in a
//! fixed operation order:
//!
//! Add → Multiply → Override → Division
//!
//! ```text
//! final = override.unwrap_or((base + Σadd) × Πmultiply) ÷ Πdivision
//! ```
//!
//! Only *qualifying* mods participate: their tag requirements must be met by
//! the evaluation context, and predicted mods can be excluded when a client
//! needs the server-authoritative value.

mod graph;
mod map;

pub use graph::{CycleError, DependencyGraph};
pub use map::{AggregatorId, AggregatorMap};

use crate::effect::ActiveEffectHandle;
use crate::tags::{TagContainer, TagRequirements, TagSource};

/// Modifier operation.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModOp {
    Add,
    Multiply,
    Override,
    Division,
}

impl ModOp {
    /// Evaluation order.
    pub const ALL: [ModOp; 4] = [ModOp::Add, ModOp::Multiply, ModOp::Override, ModOp::Division];

    const fn index(self) -> usize {
        match self {
            ModOp::Add => 0,
            ModOp::Multiply => 1,
            ModOp::Override => 2,
            ModOp::Division => 3,
        }
    }

    /// Applies a single modification directly to `value`.
    ///
    /// Division by zero leaves the value unchanged.
    pub fn apply(self, value: f32, magnitude: f32) -> f32 {
        match self {
            ModOp::Add => value + magnitude,
            ModOp::Multiply => value * magnitude,
            ModOp::Override => magnitude,
            ModOp::Division if magnitude == 0.0 => value,
            ModOp::Division => value / magnitude,
        }
    }

    /// Magnitude of `stacks` stacked copies of a modifier.
    ///
    /// ```
    /// # use gameplay_core::aggregator::ModOp;
    /// assert_eq!(ModOp::Add.stacked_magnitude(5.0, 3), 15.0);
    /// // three stacks of +10% is +30%, not ×1.331
    /// assert!((ModOp::Multiply.stacked_magnitude(1.1, 3) - 1.3).abs() < 1e-6);
    /// assert_eq!(ModOp::Override.stacked_magnitude(7.0, 4), 7.0);
    /// ```
    pub fn stacked_magnitude(self, magnitude: f32, stacks: u32) -> f32 {
        let stacks = stacks as f32;
        match self {
            ModOp::Add => magnitude * stacks,
            ModOp::Multiply | ModOp::Division => 1.0 + (magnitude - 1.0) * stacks,
            ModOp::Override => magnitude,
        }
    }
}

/// One modifier contributed by a live effect.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatorMod {
    pub evaluated_magnitude: f32,
    pub handle: ActiveEffectHandle,
    /// Position of the modifier inside its effect definition. Together with
    /// `handle` this identifies the mod.
    pub modifier_index: usize,
    pub source_tag_requirements: TagRequirements,
    pub target_tag_requirements: TagRequirements,
    /// Source tags captured when the owning spec was applied.
    pub captured_source_tags: TagContainer,
    pub is_predicted: bool,
}

impl AggregatorMod {
    pub fn new(handle: ActiveEffectHandle, modifier_index: usize, magnitude: f32) -> Self {
        Self {
            evaluated_magnitude: magnitude,
            handle,
            modifier_index,
            source_tag_requirements: TagRequirements::new(),
            target_tag_requirements: TagRequirements::new(),
            captured_source_tags: TagContainer::new(),
            is_predicted: false,
        }
    }

    pub fn predicted(mut self, is_predicted: bool) -> Self {
        self.is_predicted = is_predicted;
        self
    }

    pub fn qualifies(&self, params: &EvaluateParams<'_>) -> bool {
        if self.is_predicted && !params.include_predicted_mods {
            return false;
        }
        if let Some(filter) = params.applied_source_tag_filter {
            if !self.captured_source_tags.has_all_matching(filter) {
                return false;
            }
        }

        let source_met = match params.source_tags {
            Some(tags) => self.source_tag_requirements.requirements_met(tags),
            None => self
                .source_tag_requirements
                .requirements_met(&self.captured_source_tags),
        };
        let target_met = match params.target_tags {
            Some(tags) => self.target_tag_requirements.requirements_met(tags),
            None => self
                .target_tag_requirements
                .requirements_met(&TagContainer::new()),
        };
        source_met && target_met
    }
}

/// Evaluation context for [`Aggregator::evaluate`].
#[derive(Clone, Copy)]
pub struct EvaluateParams<'a> {
    /// Source tags to test mods against. `None` uses each mod's own captured
    /// source tags.
    pub source_tags: Option<&'a dyn TagSource>,
    pub target_tags: Option<&'a dyn TagSource>,
    /// Only mods whose captured source tags contain all of these count.
    pub applied_source_tag_filter: Option<&'a TagContainer>,
    pub include_predicted_mods: bool,
}

impl<'a> EvaluateParams<'a> {
    pub fn new() -> Self {
        Self {
            source_tags: None,
            target_tags: None,
            applied_source_tag_filter: None,
            include_predicted_mods: true,
        }
    }

    pub fn with_source_tags(mut self, tags: &'a dyn TagSource) -> Self {
        self.source_tags = Some(tags);
        self
    }

    pub fn with_target_tags(mut self, tags: &'a dyn TagSource) -> Self {
        self.target_tags = Some(tags);
        self
    }

    pub fn with_source_tag_filter(mut self, filter: &'a TagContainer) -> Self {
        if !filter.is_empty() {
            self.applied_source_tag_filter = Some(filter);
        }
        self
    }

    /// Server-authoritative view: ignore locally predicted mods.
    pub fn excluding_predicted(mut self) -> Self {
        self.include_predicted_mods = false;
        self
    }
}

impl Default for EvaluateParams<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulator for one attribute.
///
/// # Example
/// ```
/// # use gameplay_core::aggregator::{Aggregator, AggregatorMod, EvaluateParams, ModOp};
/// # use gameplay_core::effect::ActiveEffectHandle;
/// let handle = ActiveEffectHandle::from_parts(0, 1);
/// let mut health = Aggregator::new(10.0);
/// health.add_mod(ModOp::Add, AggregatorMod::new(handle, 0, 5.0));
/// health.add_mod(ModOp::Add, AggregatorMod::new(handle, 1, 3.0));
/// health.add_mod(ModOp::Multiply, AggregatorMod::new(handle, 2, 2.0));
///
/// // (10 + 5 + 3) × 2
/// assert_eq!(health.evaluate(&EvaluateParams::default()), 36.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregator {
    base_value: f32,
    mods: [Vec<AggregatorMod>; 4],
    dirty: bool,
}

impl Aggregator {
    pub fn new(base_value: f32) -> Self {
        Self {
            base_value,
            mods: Default::default(),
            dirty: false,
        }
    }

    pub fn base_value(&self) -> f32 {
        self.base_value
    }

    /// Returns true when the value actually changed.
    pub fn set_base_value(&mut self, value: f32) -> bool {
        if self.base_value.to_bits() == value.to_bits() {
            return false;
        }
        self.base_value = value;
        self.dirty = true;
        true
    }

    /// Inserts a mod into its operation list.
    ///
    /// A mod with the same `(handle, modifier_index)` already present in that
    /// list is left untouched and `false` is returned.
    pub fn add_mod(&mut self, op: ModOp, modifier: AggregatorMod) -> bool {
        let list = &mut self.mods[op.index()];
        if list
            .iter()
            .any(|m| m.handle == modifier.handle && m.modifier_index == modifier.modifier_index)
        {
            return false;
        }
        list.push(modifier);
        self.dirty = true;
        true
    }

    /// Rewrites the magnitude of an existing mod in place, keeping its
    /// arrival position. Returns true when the value changed.
    pub fn update_mod_magnitude(
        &mut self,
        op: ModOp,
        handle: ActiveEffectHandle,
        modifier_index: usize,
        magnitude: f32,
    ) -> bool {
        let Some(modifier) = self.mods[op.index()]
            .iter_mut()
            .find(|m| m.handle == handle && m.modifier_index == modifier_index)
        else {
            return false;
        };
        if modifier.evaluated_magnitude.to_bits() == magnitude.to_bits() {
            return false;
        }
        modifier.evaluated_magnitude = magnitude;
        self.dirty = true;
        true
    }

    /// Removes every mod owned by `handle` across all operations.
    pub fn remove_mods_for_handle(&mut self, handle: ActiveEffectHandle) -> usize {
        self.retain_mods(|m| m.handle != handle)
    }

    /// Keeps only mods matching `keep`; returns how many were dropped.
    pub fn retain_mods(&mut self, mut keep: impl FnMut(&AggregatorMod) -> bool) -> usize {
        let mut removed = 0;
        for list in &mut self.mods {
            let before = list.len();
            list.retain(|m| keep(m));
            removed += before - list.len();
        }
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn mods(&self, op: ModOp) -> &[AggregatorMod] {
        &self.mods[op.index()]
    }

    pub fn all_mods(&self) -> impl Iterator<Item = (ModOp, &AggregatorMod)> {
        ModOp::ALL
            .into_iter()
            .flat_map(move |op| self.mods[op.index()].iter().map(move |m| (op, m)))
    }

    pub fn has_mods_for(&self, handle: ActiveEffectHandle) -> bool {
        self.all_mods().any(|(_, m)| m.handle == handle)
    }

    pub fn mod_count(&self) -> usize {
        self.mods.iter().map(Vec::len).sum()
    }

    /// True if any mod's qualification depends on the target's tags.
    pub fn has_target_requirements(&self) -> bool {
        self.all_mods()
            .any(|(_, m)| !m.target_tag_requirements.is_empty())
    }

    /// Computes the final value. Pure: no caching, no mutation.
    pub fn evaluate(&self, params: &EvaluateParams<'_>) -> f32 {
        Self::evaluate_with_base(self.base_value, &self.mods, params)
    }

    /// `evaluate - base`: what the qualifying mods contribute.
    pub fn evaluate_bonus(&self, params: &EvaluateParams<'_>) -> f32 {
        self.evaluate(params) - self.base_value
    }

    fn evaluate_with_base(
        base: f32,
        mods: &[Vec<AggregatorMod>; 4],
        params: &EvaluateParams<'_>,
    ) -> f32 {
        let qualifying =
            |op: ModOp| mods[op.index()].iter().filter(move |m| m.qualifies(params));

        let additive: f32 = qualifying(ModOp::Add).map(|m| m.evaluated_magnitude).sum();
        let multiplicative: f32 = qualifying(ModOp::Multiply)
            .map(|m| m.evaluated_magnitude)
            .product();
        let division: f32 = qualifying(ModOp::Division)
            .map(|m| m.evaluated_magnitude)
            .filter(|magnitude| *magnitude != 0.0)
            .product();
        let overridden = qualifying(ModOp::Override)
            .map(|m| m.evaluated_magnitude)
            .next();

        overridden.unwrap_or((base + additive) * multiplicative) / division
    }

    /// Derives the base value that would evaluate to `final_value`.
    ///
    /// Used by clients to turn a server-reported final value back into a base
    /// so local (predicted) mods can be layered on top. Not reversible while a
    /// qualifying Override mod exists or the multiplier is zero; the current
    /// base is returned in that case.
    pub fn reverse_evaluate(&self, final_value: f32, params: &EvaluateParams<'_>) -> f32 {
        let qualifying = |op: ModOp| {
            self.mods[op.index()]
                .iter()
                .filter(move |m| m.qualifies(params))
        };

        if qualifying(ModOp::Override).next().is_some() {
            return self.base_value;
        }
        let additive: f32 = qualifying(ModOp::Add).map(|m| m.evaluated_magnitude).sum();
        let multiplicative: f32 = qualifying(ModOp::Multiply)
            .map(|m| m.evaluated_magnitude)
            .product();
        let division: f32 = qualifying(ModOp::Division)
            .map(|m| m.evaluated_magnitude)
            .filter(|magnitude| *magnitude != 0.0)
            .product();
        if multiplicative.abs() <= f32::EPSILON {
            return self.base_value;
        }

        final_value * division / multiplicative - additive
    }

    /// Instant modification of the base value.
    pub fn exec_mod_on_base_value(&mut self, op: ModOp, magnitude: f32) {
        let next = op.apply(self.base_value, magnitude);
        self.set_base_value(next);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::GameplayTag;

    fn handle(slot: u32) -> ActiveEffectHandle {
        ActiveEffectHandle::from_parts(slot, 1)
    }

    #[test]
    fn operation_order_is_fixed() {
        let mut agg = Aggregator::new(10.0);
        // Insert the multiplier first: order of insertion across ops is irrelevant.
        agg.add_mod(ModOp::Multiply, AggregatorMod::new(handle(2), 0, 2.0));
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 5.0));
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(1), 0, 3.0));
        assert_eq!(agg.evaluate(&EvaluateParams::default()), 36.0);

        agg.add_mod(ModOp::Division, AggregatorMod::new(handle(3), 0, 4.0));
        assert_eq!(agg.evaluate(&EvaluateParams::default()), 9.0);
    }

    #[test]
    fn override_replaces_then_division_applies() {
        let mut agg = Aggregator::new(10.0);
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 5.0));
        agg.add_mod(ModOp::Override, AggregatorMod::new(handle(1), 0, 50.0));
        agg.add_mod(ModOp::Override, AggregatorMod::new(handle(2), 0, 70.0));
        agg.add_mod(ModOp::Division, AggregatorMod::new(handle(3), 0, 2.0));
        // first override in arrival order wins
        assert_eq!(agg.evaluate(&EvaluateParams::default()), 25.0);
    }

    #[test]
    fn duplicate_mod_is_ignored() {
        let mut agg = Aggregator::new(1.0);
        assert!(agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 1.0)));
        assert!(!agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 9.0)));
        assert!(agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 1, 1.0)));
        assert_eq!(agg.evaluate(&EvaluateParams::default()), 3.0);
    }

    #[test]
    fn remove_mods_for_handle_is_idempotent() {
        let mut agg = Aggregator::new(100.0);
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 10.0));
        agg.add_mod(ModOp::Multiply, AggregatorMod::new(handle(0), 1, 2.0));
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(1), 0, 1.0));

        assert_eq!(agg.remove_mods_for_handle(handle(0)), 2);
        let once = agg.clone();
        assert_eq!(agg.remove_mods_for_handle(handle(0)), 0);
        assert_eq!(agg, once);
        assert_eq!(agg.evaluate(&EvaluateParams::default()), 101.0);
    }

    #[test]
    fn evaluation_is_bit_identical() {
        let mut agg = Aggregator::new(0.1);
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 0.7));
        agg.add_mod(ModOp::Multiply, AggregatorMod::new(handle(1), 0, 1.3));
        agg.add_mod(ModOp::Division, AggregatorMod::new(handle(2), 0, 0.9));
        let params = EvaluateParams::default();
        assert_eq!(agg.evaluate(&params).to_bits(), agg.evaluate(&params).to_bits());
    }

    #[test]
    fn predicted_mods_can_be_excluded() {
        let mut agg = Aggregator::new(10.0);
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 5.0));
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(1), 0, 20.0).predicted(true));

        assert_eq!(agg.evaluate(&EvaluateParams::default()), 35.0);
        assert_eq!(agg.evaluate(&EvaluateParams::new().excluding_predicted()), 15.0);
    }

    #[test]
    fn target_requirements_gate_mods() {
        let mut agg = Aggregator::new(10.0);
        let mut conditional = AggregatorMod::new(handle(0), 0, 5.0);
        conditional.target_tag_requirements =
            TagRequirements::requiring(TagContainer::from_names(["State.Enraged"]));
        agg.add_mod(ModOp::Add, conditional);

        let calm = TagContainer::new();
        let enraged = TagContainer::from_names(["State.Enraged"]);
        assert_eq!(agg.evaluate(&EvaluateParams::new().with_target_tags(&calm)), 10.0);
        assert_eq!(agg.evaluate(&EvaluateParams::new().with_target_tags(&enraged)), 15.0);
        assert!(agg.has_target_requirements());
    }

    #[test]
    fn source_filter_uses_captured_tags() {
        let mut agg = Aggregator::new(0.0);
        let mut fire = AggregatorMod::new(handle(0), 0, 4.0);
        fire.captured_source_tags.insert(GameplayTag::new("Element.Fire"));
        agg.add_mod(ModOp::Add, fire);
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(1), 0, 1.0));

        let filter = TagContainer::from_names(["Element.Fire"]);
        let params = EvaluateParams::new().with_source_tag_filter(&filter);
        assert_eq!(agg.evaluate_bonus(&params), 4.0);
    }

    #[test]
    fn reverse_evaluate_recovers_base() {
        let mut agg = Aggregator::new(40.0);
        agg.add_mod(ModOp::Add, AggregatorMod::new(handle(0), 0, 10.0));
        agg.add_mod(ModOp::Multiply, AggregatorMod::new(handle(1), 0, 2.0));
        let params = EvaluateParams::default();
        let final_value = agg.evaluate(&params);
        assert_eq!(final_value, 100.0);
        assert_eq!(agg.reverse_evaluate(final_value, &params), 40.0);

        agg.add_mod(ModOp::Override, AggregatorMod::new(handle(2), 0, 1.0));
        assert_eq!(agg.reverse_evaluate(123.0, &params), 40.0);
    }

    #[test]
    fn exec_on_base_value() {
        let mut agg = Aggregator::new(100.0);
        agg.exec_mod_on_base_value(ModOp::Add, -20.0);
        assert_eq!(agg.base_value(), 80.0);
        agg.exec_mod_on_base_value(ModOp::Division, 0.0);
        assert_eq!(agg.base_value(), 80.0);
        assert!(agg.is_dirty());
    }
}
