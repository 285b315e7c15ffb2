//! Data-driven effect content and loaders.
//!
//! This crate houses the bundled effect library, default attribute sets and
//! tunables, and provides loaders for RON/TOML data files:
//! - Effect definitions (RON list of `GameplayEffectDef`)
//! - Attribute set defaults (RON list of `NumericAttributeSet`)
//! - Effect system configuration (TOML `GameplayConfig`)
//!
//! The bundled files are embedded at compile time so a binary works without
//! a data directory; pointing a [`ContentFactory`] at a directory overrides
//! them.

pub mod bundled;

#[cfg(feature = "loaders")]
pub mod loaders;

#[cfg(feature = "loaders")]
pub use loaders::{AttributeSetLoader, ConfigLoader, ContentFactory, EffectLibraryLoader};
