//! Process-wide collaborators shared by every component.
//!
//! There are no globals: a context is built once, wrapped in an `Arc`, and
//! handed to each [`AbilitySystemComponent`](crate::AbilitySystemComponent).
//! Dropping the last reference tears it down.

use std::fmt;
use std::sync::Arc;

use crate::config::GameplayConfig;
use crate::cue::{CueManager, GameplayCueHandler};
use crate::effect::{EffectDefId, EffectLibrary, GameplayEffectDef};
use crate::magnitude::{CalculationRegistry, ExecutionCalculation, MagnitudeCalculation};
use crate::rng::{PcgRng, RngOracle};
use crate::tags::GameplayTag;

pub struct AbilitySystemContext {
    config: GameplayConfig,
    library: EffectLibrary,
    calculations: CalculationRegistry,
    cues: CueManager,
    rng: Box<dyn RngOracle>,
}

impl AbilitySystemContext {
    pub fn builder() -> AbilitySystemContextBuilder {
        AbilitySystemContextBuilder::default()
    }

    pub fn config(&self) -> &GameplayConfig {
        &self.config
    }

    pub fn library(&self) -> &EffectLibrary {
        &self.library
    }

    pub fn effect(&self, id: &EffectDefId) -> Option<&Arc<GameplayEffectDef>> {
        self.library.get(id)
    }

    pub fn calculations(&self) -> &CalculationRegistry {
        &self.calculations
    }

    pub fn cues(&self) -> &CueManager {
        &self.cues
    }

    pub fn rng(&self) -> &dyn RngOracle {
        self.rng.as_ref()
    }
}

impl Default for AbilitySystemContext {
    fn default() -> Self {
        AbilitySystemContextBuilder::default().build_owned()
    }
}

impl fmt::Debug for AbilitySystemContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilitySystemContext")
            .field("config", &self.config)
            .field("effects", &self.library.len())
            .field("calculations", &self.calculations)
            .field("cues", &self.cues)
            .finish_non_exhaustive()
    }
}

/// Assembles a context. Registration happens here and nowhere else.
#[derive(Default)]
pub struct AbilitySystemContextBuilder {
    config: GameplayConfig,
    library: EffectLibrary,
    calculations: CalculationRegistry,
    cues: CueManager,
    rng: Option<Box<dyn RngOracle>>,
}

impl AbilitySystemContextBuilder {
    pub fn config(mut self, config: GameplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn library(mut self, library: EffectLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn magnitude_calculation(mut self, calculation: Arc<dyn MagnitudeCalculation>) -> Self {
        self.calculations.register_magnitude(calculation);
        self
    }

    pub fn execution(mut self, calculation: Arc<dyn ExecutionCalculation>) -> Self {
        self.calculations.register_execution(calculation);
        self
    }

    pub fn cue_handler(mut self, tag: GameplayTag, handler: Arc<dyn GameplayCueHandler>) -> Self {
        self.cues.register(tag, handler);
        self
    }

    /// Replaces the default PCG oracle.
    pub fn rng(mut self, rng: Box<dyn RngOracle>) -> Self {
        self.rng = Some(rng);
        self
    }

    fn build_owned(self) -> AbilitySystemContext {
        AbilitySystemContext {
            config: self.config,
            library: self.library,
            calculations: self.calculations,
            cues: self.cues,
            rng: self.rng.unwrap_or_else(|| Box::new(PcgRng)),
        }
    }

    pub fn build(self) -> Arc<AbilitySystemContext> {
        let context = self.build_owned();
        tracing::debug!(
            target: "gameplay::context",
            effects = context.library.len(),
            cue_handlers = context.cues.len(),
            "ability system context ready"
        );
        Arc::new(context)
    }
}
