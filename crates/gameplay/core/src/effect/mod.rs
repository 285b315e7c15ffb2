//! Effect definitions, specs and the records the container stores.
//!
//! - [`GameplayEffectDef`]: static data, shared through an [`EffectLibrary`]
//! - [`GameplayEffectSpec`]: a definition bound to level, context and captures
//! - [`ActiveGameplayEffect`]: a spec living in a container, addressed by an
//!   [`ActiveEffectHandle`]

mod active;
mod context;
mod definition;
mod handle;
mod library;
mod query;
mod spec;
mod stacking;

pub use active::{ActiveGameplayEffect, EffectState};
pub use context::{EffectContext, EntityId, HitResult};
pub use definition::{DurationPolicy, EffectDefId, GameplayEffectDef, ModifierInfo};
pub use handle::ActiveEffectHandle;
pub use library::{EffectLibrary, LibraryError};
pub use query::ActiveEffectQuery;
pub use spec::{EffectDuration, GameplayEffectSpec, SpecError};
pub use stacking::{
    StackDurationRefreshPolicy, StackExpirationPolicy, StackMagnitudePolicy,
    StackPeriodResetPolicy, StackingRules, StackingType,
};

pub(crate) use handle::SlotArena;
