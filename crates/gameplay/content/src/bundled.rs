//! Content embedded at compile time.

/// Effect definitions shipped with the crate.
pub const EFFECTS_RON: &str = include_str!("../data/effects.ron");

/// Default attribute sets.
pub const ATTRIBUTES_RON: &str = include_str!("../data/attributes.ron");

/// Default tunables.
pub const CONFIG_TOML: &str = include_str!("../data/config.toml");
