use super::EffectDefId;

/// How repeated applications of the same effect combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackingType {
    /// Every application is its own record.
    #[default]
    None,
    /// One stack per instigator.
    AggregateBySource,
    /// One stack per target regardless of instigator.
    AggregateByTarget,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackDurationRefreshPolicy {
    #[default]
    RefreshOnSuccessfulApplication,
    NeverRefresh,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackPeriodResetPolicy {
    #[default]
    ResetOnSuccessfulApplication,
    NeverReset,
}

/// What happens when a stacked effect's duration runs out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackExpirationPolicy {
    #[default]
    ClearEntireStack,
    RemoveSingleStackAndRefreshDuration,
    /// Duration restarts and the stack is kept; removal must be explicit.
    RefreshDuration,
}

/// Whether modifier magnitudes scale with stack count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackMagnitudePolicy {
    #[default]
    Scaled,
    Unscaled,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StackingRules {
    pub stacking_type: StackingType,
    /// 0 means unlimited.
    pub limit_count: u32,
    pub duration_refresh: StackDurationRefreshPolicy,
    pub period_reset: StackPeriodResetPolicy,
    pub expiration: StackExpirationPolicy,
    pub magnitude: StackMagnitudePolicy,
    /// Applied to the target when an application arrives at a full stack.
    pub overflow_effects: Vec<EffectDefId>,
    /// A full stack ignores further applications entirely (no refresh).
    pub deny_overflow_application: bool,
}

impl StackingRules {
    pub fn aggregate_by_target(limit_count: u32) -> Self {
        Self {
            stacking_type: StackingType::AggregateByTarget,
            limit_count,
            ..Self::default()
        }
    }

    pub fn aggregate_by_source(limit_count: u32) -> Self {
        Self {
            stacking_type: StackingType::AggregateBySource,
            limit_count,
            ..Self::default()
        }
    }

    pub fn is_stacking(&self) -> bool {
        self.stacking_type != StackingType::None
    }

    /// Clamps a requested count to the limit.
    pub fn clamp_count(&self, count: u32) -> u32 {
        if self.limit_count == 0 {
            count.max(1)
        } else {
            count.clamp(1, self.limit_count)
        }
    }

    pub fn is_full(&self, count: u32) -> bool {
        self.limit_count != 0 && count >= self.limit_count
    }
}
