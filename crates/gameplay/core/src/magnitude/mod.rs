//! Modifier magnitude formulas.
//!
//! Every modifier, duration and chance value on an effect definition is a
//! [`MagnitudeFormula`] resolved against a spec:
//!
//! - `ScalableFloat`: `value × curve(level)`
//! - `AttributeBased`: `coefficient × (attribute + pre) + post`
//! - `Custom`: a registered [`MagnitudeCalculation`], scaled the same way
//! - `SetByCaller`: a number supplied on the spec by whoever created it

mod calculation;
mod capture;

pub use calculation::{
    CalculationRegistry, CaptureReader, EvaluatedModifier, ExecutionCalculation, ExecutionOutput,
    MagnitudeCalculation,
};
pub use capture::{
    AttributeCapture, CaptureDefinition, CaptureSet, CaptureSource, CapturedAttribute,
    CapturedValue,
};

use crate::aggregator::{AggregatorMap, EvaluateParams};
use crate::attribute::AttributeHandle;
use crate::effect::GameplayEffectSpec;
use crate::error::{ErrorSeverity, GameplayError};
use crate::tags::TagContainer;

/// A formula could not be resolved; the modifier using it is skipped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MagnitudeError {
    #[error("attribute {attribute} was never captured")]
    MissingCapture { attribute: AttributeHandle },

    #[error("custom calculation `{name}` is not registered")]
    MissingCalculation { name: String },

    #[error("no set-by-caller magnitude named `{name}`")]
    MissingSetByCaller { name: String },

    #[error("calculation `{name}` failed: {reason}")]
    Calculation { name: String, reason: String },
}

impl GameplayError for MagnitudeError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCapture { .. } => "MAGNITUDE_MISSING_CAPTURE",
            Self::MissingCalculation { .. } => "MAGNITUDE_MISSING_CALCULATION",
            Self::MissingSetByCaller { .. } => "MAGNITUDE_MISSING_SET_BY_CALLER",
            Self::Calculation { .. } => "MAGNITUDE_CALCULATION_FAILED",
        }
    }
}

/// Piecewise-linear curve over level. Clamps outside the key range.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Curve {
    keys: Vec<(f32, f32)>,
}

impl Curve {
    /// Keys are sorted by x; duplicates keep the last value.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        keys.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });
        Self { keys }
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 1.0;
        };
        if x <= first.0 {
            return first.1;
        }
        for pair in self.keys.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if x <= x1 {
                let t = (x - x0) / (x1 - x0);
                return y0 + (y1 - y0) * t;
            }
        }
        self.keys.last().map_or(1.0, |last| last.1)
    }
}

/// A constant optionally scaled by a level curve.
///
/// ```
/// # use gameplay_core::magnitude::{Curve, ScalableFloat};
/// let damage = ScalableFloat::constant(10.0)
///     .with_curve(Curve::new(vec![(1.0, 1.0), (5.0, 3.0)]));
/// assert_eq!(damage.value_at_level(1.0), 10.0);
/// assert_eq!(damage.value_at_level(3.0), 20.0);
/// assert_eq!(damage.value_at_level(9.0), 30.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalableFloat {
    pub value: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub curve: Option<Curve>,
}

impl ScalableFloat {
    pub const fn constant(value: f32) -> Self {
        Self { value, curve: None }
    }

    pub const fn zero() -> Self {
        Self::constant(0.0)
    }

    pub const fn one() -> Self {
        Self::constant(1.0)
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn value_at_level(&self, level: f32) -> f32 {
        match &self.curve {
            Some(curve) => self.value * curve.evaluate(level),
            None => self.value,
        }
    }
}

/// Which value of a captured attribute an attribute-based formula reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeCalculation {
    /// Final value with all qualifying mods.
    #[default]
    Magnitude,
    BaseValue,
    /// Final minus base.
    BonusMagnitude,
}

/// `coefficient × (attribute + pre_multiply_additive) + post_multiply_additive`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeBasedFloat {
    #[cfg_attr(feature = "serde", serde(default = "ScalableFloat::one"))]
    pub coefficient: ScalableFloat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pre_multiply_additive: ScalableFloat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub post_multiply_additive: ScalableFloat,
    pub backing: CaptureDefinition,
    #[cfg_attr(feature = "serde", serde(default))]
    pub calculation: AttributeCalculation,
    /// Only mods applied by effects carrying these source tags are counted.
    #[cfg_attr(feature = "serde", serde(default))]
    pub source_tag_filter: TagContainer,
}

impl AttributeBasedFloat {
    pub fn new(backing: CaptureDefinition) -> Self {
        Self {
            coefficient: ScalableFloat::one(),
            pre_multiply_additive: ScalableFloat::zero(),
            post_multiply_additive: ScalableFloat::zero(),
            backing,
            calculation: AttributeCalculation::Magnitude,
            source_tag_filter: TagContainer::new(),
        }
    }

    pub fn with_coefficient(mut self, coefficient: f32) -> Self {
        self.coefficient = ScalableFloat::constant(coefficient);
        self
    }

    pub fn with_additives(mut self, pre: f32, post: f32) -> Self {
        self.pre_multiply_additive = ScalableFloat::constant(pre);
        self.post_multiply_additive = ScalableFloat::constant(post);
        self
    }

    pub fn with_calculation(mut self, calculation: AttributeCalculation) -> Self {
        self.calculation = calculation;
        self
    }

    fn scale(&self, attribute_value: f32, level: f32) -> f32 {
        self.coefficient.value_at_level(level)
            * (attribute_value + self.pre_multiply_additive.value_at_level(level))
            + self.post_multiply_additive.value_at_level(level)
    }
}

/// A registered [`MagnitudeCalculation`] scaled like [`AttributeBasedFloat`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CustomCalculationFloat {
    pub calculation: String,
    #[cfg_attr(feature = "serde", serde(default = "ScalableFloat::one"))]
    pub coefficient: ScalableFloat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pre_multiply_additive: ScalableFloat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub post_multiply_additive: ScalableFloat,
}

impl CustomCalculationFloat {
    pub fn new(calculation: impl Into<String>) -> Self {
        Self {
            calculation: calculation.into(),
            coefficient: ScalableFloat::one(),
            pre_multiply_additive: ScalableFloat::zero(),
            post_multiply_additive: ScalableFloat::zero(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MagnitudeFormula {
    ScalableFloat(ScalableFloat),
    AttributeBased(AttributeBasedFloat),
    Custom(CustomCalculationFloat),
    SetByCaller { name: String },
}

impl MagnitudeFormula {
    pub const fn constant(value: f32) -> Self {
        Self::ScalableFloat(ScalableFloat::constant(value))
    }

    pub fn set_by_caller(name: impl Into<String>) -> Self {
        Self::SetByCaller { name: name.into() }
    }

    /// Value when the formula needs nothing but a level.
    pub fn static_value(&self, level: f32) -> Option<f32> {
        match self {
            Self::ScalableFloat(value) => Some(value.value_at_level(level)),
            _ => None,
        }
    }

    /// Captures this formula reads.
    pub fn captures(&self, calculations: &CalculationRegistry) -> Vec<CaptureDefinition> {
        match self {
            Self::AttributeBased(formula) => vec![formula.backing.clone()],
            Self::Custom(custom) => calculations
                .magnitude(&custom.calculation)
                .map(|calc| calc.relevant_captures())
                .unwrap_or_default(),
            Self::ScalableFloat(_) | Self::SetByCaller { .. } => Vec::new(),
        }
    }

    pub fn calculate(
        &self,
        spec: &GameplayEffectSpec,
        aggregators: Option<&AggregatorMap>,
        calculations: &CalculationRegistry,
    ) -> Result<f32, MagnitudeError> {
        let level = spec.level();
        match self {
            Self::ScalableFloat(value) => Ok(value.value_at_level(level)),
            Self::AttributeBased(formula) => {
                let reader = CaptureReader::new(spec, aggregators);
                let params = EvaluateParams::new()
                    .with_source_tags(spec.captured_source_tags())
                    .with_target_tags(spec.captured_target_tags())
                    .with_source_tag_filter(&formula.source_tag_filter);
                let attribute_value = match formula.calculation {
                    AttributeCalculation::Magnitude => {
                        reader.attribute_magnitude(&formula.backing, &params)?
                    }
                    AttributeCalculation::BaseValue => reader.base_value(&formula.backing)?,
                    AttributeCalculation::BonusMagnitude => {
                        reader.bonus_magnitude(&formula.backing, &params)?
                    }
                };
                Ok(formula.scale(attribute_value, level))
            }
            Self::Custom(custom) => {
                let calc = calculations.magnitude(&custom.calculation).ok_or_else(|| {
                    MagnitudeError::MissingCalculation {
                        name: custom.calculation.clone(),
                    }
                })?;
                let reader = CaptureReader::new(spec, aggregators);
                let base = calc.base_magnitude(spec, &reader)?;
                Ok(custom.coefficient.value_at_level(level)
                    * (base + custom.pre_multiply_additive.value_at_level(level))
                    + custom.post_multiply_additive.value_at_level(level))
            }
            Self::SetByCaller { name } => spec.set_by_caller_magnitude(name).ok_or_else(|| {
                MagnitudeError::MissingSetByCaller { name: name.clone() }
            }),
        }
    }
}

impl Default for MagnitudeFormula {
    fn default() -> Self {
        Self::constant(0.0)
    }
}
