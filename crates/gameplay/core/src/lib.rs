//! Gameplay effects, attribute aggregation and replication.
//!
//! `gameplay-core` applies timed, stacking, networked modifiers to numeric
//! character attributes and computes their combined values deterministically
//! on server and client. Every mutation of an owner's effects flows through
//! an [`AbilitySystemComponent`], which gates the request and hands it to the
//! owner's [`ActiveGameplayEffectsContainer`]. Shared collaborators (effect
//! library, custom calculations, cue handlers, RNG) live in an
//! [`AbilitySystemContext`] built once per process.
pub mod aggregator;
pub mod attribute;
pub mod commands;
pub mod component;
pub mod config;
pub mod container;
pub mod context;
pub mod cue;
pub mod effect;
pub mod error;
pub mod magnitude;
pub mod prediction;
pub mod replication;
pub mod rng;
pub mod tags;

pub use aggregator::{
    Aggregator, AggregatorId, AggregatorMap, AggregatorMod, CycleError, DependencyGraph,
    EvaluateParams, ModOp,
};
pub use attribute::{
    AttributeBounds, AttributeHandle, AttributeSet, AttributeSetId, AttributeSets,
    ModCallbackData, NumericAttributeSet,
};
pub use commands::{EffectCommand, EffectCommands};
pub use component::{
    AbilitySystemComponent, ApplyRejection, AttributeError, AttributeListener, ListenerId,
    NetRole, RemovalListener,
};
pub use config::GameplayConfig;
pub use container::{
    ALL_STACKS, ActiveGameplayEffectsContainer, ApplyOutcome, AttributeChange, RemovedEffectInfo,
};
pub use context::{AbilitySystemContext, AbilitySystemContextBuilder};
pub use cue::{CueEvent, CueManager, CueParameters, EffectCue, GameplayCueHandler, PendingCue};
pub use effect::{
    ActiveEffectHandle, ActiveEffectQuery, ActiveGameplayEffect, DurationPolicy, EffectContext,
    EffectDefId, EffectDuration, EffectLibrary, EffectState, EntityId, GameplayEffectDef,
    GameplayEffectSpec, HitResult, LibraryError, ModifierInfo, SpecError,
    StackDurationRefreshPolicy, StackExpirationPolicy, StackMagnitudePolicy,
    StackPeriodResetPolicy, StackingRules, StackingType,
};
pub use error::{ErrorSeverity, GameplayError};
pub use magnitude::{
    AttributeBasedFloat, AttributeCalculation, CalculationRegistry, CaptureDefinition,
    CaptureReader, CaptureSource, Curve, CustomCalculationFloat, ExecutionCalculation,
    ExecutionOutput, MagnitudeCalculation, MagnitudeError, MagnitudeFormula, ScalableFloat,
};
pub use prediction::{KeyOrigin, PredictionKey, PredictionKeyGenerator};
#[cfg(feature = "serde")]
pub use replication::WireError;
pub use replication::{
    ContainerSnapshot, EffectChanges, EffectFields, ReplicatedEffect, ReplicationDelta,
    ReplicationId,
};
pub use rng::{PcgRng, RngOracle, compute_seed};
pub use tags::{GameplayTag, TagContainer, TagCountContainer, TagRequirements, TagSource};
