use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{CaptureDefinition, CapturedValue, MagnitudeError};
use crate::aggregator::{Aggregator, AggregatorMap, EvaluateParams, ModOp};
use crate::attribute::AttributeHandle;
use crate::effect::GameplayEffectSpec;

/// Read access to a spec's captured attributes.
pub struct CaptureReader<'a> {
    spec: &'a GameplayEffectSpec,
    aggregators: Option<&'a AggregatorMap>,
}

impl<'a> CaptureReader<'a> {
    pub fn new(spec: &'a GameplayEffectSpec, aggregators: Option<&'a AggregatorMap>) -> Self {
        Self { spec, aggregators }
    }

    fn aggregator(&self, definition: &CaptureDefinition) -> Result<&'a Aggregator, MagnitudeError> {
        let missing = || MagnitudeError::MissingCapture {
            attribute: definition.attribute.clone(),
        };
        let captured = self.spec.captures().find(definition).ok_or_else(missing)?;
        match &captured.value {
            Some(CapturedValue::Snapshot(aggregator)) => Ok(aggregator),
            Some(CapturedValue::Linked(id)) => self
                .aggregators
                .and_then(|map| map.get(*id))
                .ok_or_else(missing),
            None => Err(missing()),
        }
    }

    fn default_params(&self) -> EvaluateParams<'a> {
        EvaluateParams::new()
            .with_source_tags(self.spec.captured_source_tags())
            .with_target_tags(self.spec.captured_target_tags())
    }

    /// Final value using the spec's captured source/target tags.
    pub fn magnitude(&self, definition: &CaptureDefinition) -> Result<f32, MagnitudeError> {
        self.attribute_magnitude(definition, &self.default_params())
    }

    pub fn attribute_magnitude(
        &self,
        definition: &CaptureDefinition,
        params: &EvaluateParams<'_>,
    ) -> Result<f32, MagnitudeError> {
        Ok(self.aggregator(definition)?.evaluate(params))
    }

    pub fn base_value(&self, definition: &CaptureDefinition) -> Result<f32, MagnitudeError> {
        Ok(self.aggregator(definition)?.base_value())
    }

    pub fn bonus_magnitude(
        &self,
        definition: &CaptureDefinition,
        params: &EvaluateParams<'_>,
    ) -> Result<f32, MagnitudeError> {
        Ok(self.aggregator(definition)?.evaluate_bonus(params))
    }
}

/// Game-specific magnitude logic referenced by name from effect data.
pub trait MagnitudeCalculation: Send + Sync {
    fn name(&self) -> &str;

    /// Attributes this calculation reads; captured along with the spec.
    fn relevant_captures(&self) -> Vec<CaptureDefinition> {
        Vec::new()
    }

    fn base_magnitude(
        &self,
        spec: &GameplayEffectSpec,
        captures: &CaptureReader<'_>,
    ) -> Result<f32, MagnitudeError>;
}

/// A modifier produced at execution time rather than declared on the effect.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluatedModifier {
    pub attribute: AttributeHandle,
    pub op: ModOp,
    pub magnitude: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionOutput {
    modifiers: Vec<EvaluatedModifier>,
}

impl ExecutionOutput {
    pub fn add(&mut self, attribute: AttributeHandle, op: ModOp, magnitude: f32) {
        self.modifiers.push(EvaluatedModifier {
            attribute,
            op,
            magnitude,
        });
    }

    pub fn modifiers(&self) -> &[EvaluatedModifier] {
        &self.modifiers
    }

    pub fn into_modifiers(self) -> Vec<EvaluatedModifier> {
        self.modifiers
    }
}

/// Arbitrary instant logic run when an effect executes (damage pipelines and
/// the like). Only runs for instant and periodic executions.
pub trait ExecutionCalculation: Send + Sync {
    fn name(&self) -> &str;

    fn relevant_captures(&self) -> Vec<CaptureDefinition> {
        Vec::new()
    }

    fn execute(
        &self,
        spec: &GameplayEffectSpec,
        captures: &CaptureReader<'_>,
        output: &mut ExecutionOutput,
    ) -> Result<(), MagnitudeError>;
}

/// Name → calculation lookup, filled once when the context is built.
#[derive(Clone, Default)]
pub struct CalculationRegistry {
    magnitudes: BTreeMap<String, Arc<dyn MagnitudeCalculation>>,
    executions: BTreeMap<String, Arc<dyn ExecutionCalculation>>,
}

impl CalculationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_magnitude(&mut self, calculation: Arc<dyn MagnitudeCalculation>) {
        self.magnitudes
            .insert(calculation.name().to_owned(), calculation);
    }

    pub fn register_execution(&mut self, calculation: Arc<dyn ExecutionCalculation>) {
        self.executions
            .insert(calculation.name().to_owned(), calculation);
    }

    pub fn magnitude(&self, name: &str) -> Option<&Arc<dyn MagnitudeCalculation>> {
        self.magnitudes.get(name)
    }

    pub fn execution(&self, name: &str) -> Option<&Arc<dyn ExecutionCalculation>> {
        self.executions.get(name)
    }
}

impl fmt::Debug for CalculationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationRegistry")
            .field("magnitudes", &self.magnitudes.keys().collect::<Vec<_>>())
            .field("executions", &self.executions.keys().collect::<Vec<_>>())
            .finish()
    }
}
