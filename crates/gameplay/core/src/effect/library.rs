use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{DurationPolicy, EffectDefId, GameplayEffectDef};
use crate::error::{ErrorSeverity, GameplayError};

/// Effect data that cannot be used as-is.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LibraryError {
    #[error("effect definition has an empty id")]
    EmptyId,

    #[error("effect {0} is defined twice")]
    Duplicate(EffectDefId),

    #[error("{effect} references unknown effect {reference}")]
    UnknownReference {
        effect: EffectDefId,
        reference: EffectDefId,
    },

    #[error("{effect} modifier {index} has an invalid attribute")]
    InvalidModifierAttribute { effect: EffectDefId, index: usize },

    #[error("{0} is instant but declares a period")]
    PeriodicInstant(EffectDefId),

    #[error("{effect} cue {index} has min_level above max_level")]
    InvalidCueRange { effect: EffectDefId, index: usize },

    #[error("linked effects of {0} form a cycle")]
    LinkCycle(EffectDefId),
}

impl GameplayError for LibraryError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyId => "LIBRARY_EMPTY_ID",
            Self::Duplicate(_) => "LIBRARY_DUPLICATE",
            Self::UnknownReference { .. } => "LIBRARY_UNKNOWN_REFERENCE",
            Self::InvalidModifierAttribute { .. } => "LIBRARY_INVALID_MODIFIER_ATTRIBUTE",
            Self::PeriodicInstant(_) => "LIBRARY_PERIODIC_INSTANT",
            Self::InvalidCueRange { .. } => "LIBRARY_INVALID_CUE_RANGE",
            Self::LinkCycle(_) => "LIBRARY_LINK_CYCLE",
        }
    }
}

/// All effect definitions known to a context, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct EffectLibrary {
    defs: BTreeMap<EffectDefId, Arc<GameplayEffectDef>>,
}

impl EffectLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and validates a library in one step.
    pub fn from_defs(
        defs: impl IntoIterator<Item = GameplayEffectDef>,
    ) -> Result<Self, LibraryError> {
        let mut library = Self::new();
        for def in defs {
            library.insert(def)?;
        }
        library.validate()?;
        Ok(library)
    }

    pub fn insert(&mut self, def: GameplayEffectDef) -> Result<Arc<GameplayEffectDef>, LibraryError> {
        if !def.id.is_valid() {
            return Err(LibraryError::EmptyId);
        }
        if self.defs.contains_key(&def.id) {
            return Err(LibraryError::Duplicate(def.id));
        }
        let def = Arc::new(def);
        self.defs.insert(def.id.clone(), Arc::clone(&def));
        Ok(def)
    }

    pub fn get(&self, id: &EffectDefId) -> Option<&Arc<GameplayEffectDef>> {
        self.defs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<GameplayEffectDef>> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Checks cross-references and per-definition consistency.
    pub fn validate(&self) -> Result<(), LibraryError> {
        for def in self.defs.values() {
            for (index, modifier) in def.modifiers.iter().enumerate() {
                if !modifier.attribute.is_valid() {
                    return Err(LibraryError::InvalidModifierAttribute {
                        effect: def.id.clone(),
                        index,
                    });
                }
            }
            if def.duration == DurationPolicy::Instant && def.period.value > 0.0 {
                return Err(LibraryError::PeriodicInstant(def.id.clone()));
            }
            for (index, cue) in def.cues.iter().enumerate() {
                if cue.min_level > cue.max_level {
                    return Err(LibraryError::InvalidCueRange {
                        effect: def.id.clone(),
                        index,
                    });
                }
            }
            for reference in def
                .linked_effects
                .iter()
                .chain(def.stacking.overflow_effects.iter())
            {
                if !self.defs.contains_key(reference) {
                    return Err(LibraryError::UnknownReference {
                        effect: def.id.clone(),
                        reference: reference.clone(),
                    });
                }
            }
        }
        for id in self.defs.keys() {
            if self.links_back_to(id) {
                return Err(LibraryError::LinkCycle(id.clone()));
            }
        }
        Ok(())
    }

    fn links_back_to(&self, start: &EffectDefId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&EffectDefId> = self
            .defs
            .get(start)
            .map(|def| def.linked_effects.iter().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if id == start {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(def) = self.defs.get(id) {
                stack.extend(def.linked_effects.iter());
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicates_and_dangling_links() {
        let mut library = EffectLibrary::new();
        library.insert(GameplayEffectDef::instant("GE_A")).unwrap();
        assert_eq!(
            library.insert(GameplayEffectDef::instant("GE_A")),
            Err(LibraryError::Duplicate("GE_A".into()))
        );

        let err = EffectLibrary::from_defs([
            GameplayEffectDef::instant("GE_B").with_linked_effect("GE_Missing")
        ])
        .unwrap_err();
        assert_eq!(err.error_code(), "LIBRARY_UNKNOWN_REFERENCE");
    }

    #[test]
    fn rejects_link_cycles() {
        let err = EffectLibrary::from_defs([
            GameplayEffectDef::instant("GE_A").with_linked_effect("GE_B"),
            GameplayEffectDef::instant("GE_B").with_linked_effect("GE_A"),
        ])
        .unwrap_err();
        assert!(matches!(err, LibraryError::LinkCycle(_)));
    }

    #[test]
    fn rejects_periodic_instant() {
        let err = EffectLibrary::from_defs([GameplayEffectDef::instant("GE_Tick").with_period(1.0)])
            .unwrap_err();
        assert_eq!(err, LibraryError::PeriodicInstant("GE_Tick".into()));
        assert_eq!(err.to_string(), "GE_Tick is instant but declares a period");
    }
}
