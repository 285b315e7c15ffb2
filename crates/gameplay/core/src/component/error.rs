//! Rejections surfaced by the component API.

use crate::attribute::AttributeHandle;
use crate::effect::{ActiveEffectHandle, EffectDefId};
use crate::error::{ErrorSeverity, GameplayError};

/// Why an application did not happen. Nothing was mutated.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ApplyRejection {
    #[error("{effect}: no authority and no local prediction key")]
    NoAuthority { effect: EffectDefId },

    #[error("{effect}: periodic effects cannot be predicted")]
    PredictedPeriodic { effect: EffectDefId },

    #[error("{effect}: target is immune (granted by {blocker})")]
    Immune {
        effect: EffectDefId,
        blocker: ActiveEffectHandle,
    },

    #[error("{effect}: target has no attribute set for {attribute}")]
    MissingAttributeSet {
        effect: EffectDefId,
        attribute: AttributeHandle,
    },

    #[error("{effect}: chance roll {roll} failed against {chance}")]
    ChanceFailed {
        effect: EffectDefId,
        chance: f32,
        roll: f32,
    },

    #[error("{effect}: application tag requirements not met")]
    ApplicationTagsUnmet { effect: EffectDefId },

    #[error("{effect}: linked effect chain reached depth {depth}")]
    LinkDepthExceeded { effect: EffectDefId, depth: u32 },

    #[error("unknown effect definition '{effect}'")]
    UnknownEffect { effect: EffectDefId },
}

impl ApplyRejection {
    pub fn effect(&self) -> &EffectDefId {
        match self {
            Self::NoAuthority { effect }
            | Self::PredictedPeriodic { effect }
            | Self::Immune { effect, .. }
            | Self::MissingAttributeSet { effect, .. }
            | Self::ChanceFailed { effect, .. }
            | Self::ApplicationTagsUnmet { effect }
            | Self::LinkDepthExceeded { effect, .. }
            | Self::UnknownEffect { effect } => effect,
        }
    }
}

impl GameplayError for ApplyRejection {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoAuthority { .. } | Self::PredictedPeriodic { .. } => ErrorSeverity::Validation,
            Self::Immune { .. }
            | Self::MissingAttributeSet { .. }
            | Self::ChanceFailed { .. }
            | Self::ApplicationTagsUnmet { .. } => ErrorSeverity::Recoverable,
            Self::LinkDepthExceeded { .. } | Self::UnknownEffect { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NoAuthority { .. } => "APPLY_NO_AUTHORITY",
            Self::PredictedPeriodic { .. } => "APPLY_PREDICTED_PERIODIC",
            Self::Immune { .. } => "APPLY_IMMUNE",
            Self::MissingAttributeSet { .. } => "APPLY_MISSING_ATTRIBUTE_SET",
            Self::ChanceFailed { .. } => "APPLY_CHANCE_FAILED",
            Self::ApplicationTagsUnmet { .. } => "APPLY_TAGS_UNMET",
            Self::LinkDepthExceeded { .. } => "APPLY_LINK_DEPTH_EXCEEDED",
            Self::UnknownEffect { .. } => "APPLY_UNKNOWN_EFFECT",
        }
    }
}

/// Loose attribute mutation failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("{attribute}: only the authority may write attributes")]
    NotAuthority { attribute: AttributeHandle },

    #[error("{attribute}: no attribute set owns this attribute")]
    MissingAttributeSet { attribute: AttributeHandle },
}

impl GameplayError for AttributeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotAuthority { .. } => ErrorSeverity::Validation,
            Self::MissingAttributeSet { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthority { .. } => "ATTRIBUTE_NOT_AUTHORITY",
            Self::MissingAttributeSet { .. } => "ATTRIBUTE_MISSING_SET",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_classification() {
        let immune = ApplyRejection::Immune {
            effect: "Burn".into(),
            blocker: ActiveEffectHandle::INVALID,
        };
        assert!(immune.severity().is_recoverable());
        assert_eq!(immune.error_code(), "APPLY_IMMUNE");
        assert_eq!(immune.effect().as_str(), "Burn");

        let unknown = ApplyRejection::UnknownEffect {
            effect: "Missing".into(),
        };
        assert!(unknown.severity().is_internal());
        assert_eq!(unknown.to_string(), "unknown effect definition 'Missing'");
    }
}
