/// Effect system constants and tunable parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GameplayConfig {
    /// Shortest duration a finite effect may have. Computed durations at or
    /// below zero are clamped up to this value.
    pub min_duration: f32,

    /// Replicated effects older than this (seconds, server clock) do not fire
    /// their `OnActive` cue when a client first sees them.
    pub replicated_cue_max_age: f32,

    /// Upper bound on settle rounds (deferred removals, tag cascades,
    /// dependency propagation) per outer operation.
    pub max_settle_rounds: u32,

    /// Base seed for chance-to-apply rolls.
    pub rng_seed: u64,
}

impl GameplayConfig {
    // ===== compile-time constants used as type parameters =====
    pub const MAX_CUES_PER_EFFECT: usize = 8;
    pub const MAX_EXECUTIONS_PER_EFFECT: usize = 4;
    /// Nesting limit for linked (target) effect applications.
    pub const MAX_LINKED_EFFECT_DEPTH: u32 = 8;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_MIN_DURATION: f32 = 0.1;
    pub const DEFAULT_REPLICATED_CUE_MAX_AGE: f32 = 3.0;
    pub const DEFAULT_MAX_SETTLE_ROUNDS: u32 = 64;

    pub fn new() -> Self {
        Self {
            min_duration: Self::DEFAULT_MIN_DURATION,
            replicated_cue_max_age: Self::DEFAULT_REPLICATED_CUE_MAX_AGE,
            max_settle_rounds: Self::DEFAULT_MAX_SETTLE_ROUNDS,
            rng_seed: 0,
        }
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self::new()
    }
}
