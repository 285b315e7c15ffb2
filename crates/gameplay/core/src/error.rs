//! Common error infrastructure for gameplay-core.
//!
//! Domain errors (`ApplyRejection`, `MagnitudeError`, `LibraryError`, ...) live
//! next to the operations that produce them. This module only provides the
//! shared classification used by logging and callers.
//!
//! Most failures in the effect system are *expected*: an immune target, a
//! failed chance roll or a missing attribute set is a no-op, not a fault.
//! Severity lets callers tell these apart from data errors and broken
//! invariants without matching on every variant.

/// Severity level of an error, used for categorization and logging.
///
/// - **Recoverable**: expected gameplay outcome, the caller treats it as a no-op
/// - **Validation**: the request itself was not allowed (authority, bad input)
/// - **Internal**: content or registration problem that needs investigation
/// - **Fatal**: container state can no longer be trusted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Expected rejection, e.g. chance roll failed or target is immune.
    Recoverable,

    /// The request was not permitted, e.g. no network authority.
    Validation,

    /// Bad content or a missing registration, e.g. unknown custom calculation.
    Internal,

    /// Corrupted state.
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is an expected, non-fatal outcome.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates a bug or broken content.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for all gameplay-core errors.
///
/// # Implementation Guidelines
///
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Return a stable SCREAMING_SNAKE identifier from `error_code`
/// - Classify severity by how the caller should react, not by impact
pub trait GameplayError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Default implementation uses the error type name.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
