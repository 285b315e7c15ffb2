//! Content factory for building effect system inputs from data files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gameplay_core::{
    AbilitySystemContext, AbilitySystemContextBuilder, EffectLibrary, GameplayConfig,
    NumericAttributeSet,
};

use crate::bundled;
use crate::loaders::{AttributeSetLoader, ConfigLoader, EffectLibraryLoader, LoadResult};

/// Loads all effect content from a data directory, or from the copies
/// embedded in this crate.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── config.toml
/// ├── effects.ron
/// └── attributes.ron
/// ```
///
/// A file missing from the directory falls back to its bundled copy.
pub struct ContentFactory {
    data_dir: Option<PathBuf>,
}

impl ContentFactory {
    /// Creates a new content factory pointing to a data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
        }
    }

    /// Uses only the embedded content.
    pub fn bundled() -> Self {
        Self { data_dir: None }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Load tunables from `config.toml`.
    pub fn load_config(&self) -> LoadResult<GameplayConfig> {
        match self.existing("config.toml") {
            Some(path) => ConfigLoader::load(&path),
            None => ConfigLoader::parse(bundled::CONFIG_TOML),
        }
    }

    /// Load and validate effect definitions from `effects.ron`.
    pub fn load_effects(&self) -> LoadResult<EffectLibrary> {
        match self.existing("effects.ron") {
            Some(path) => EffectLibraryLoader::load(&path),
            None => EffectLibraryLoader::parse(bundled::EFFECTS_RON),
        }
    }

    /// Load default attribute sets from `attributes.ron`.
    pub fn load_attribute_sets(&self) -> LoadResult<Vec<NumericAttributeSet>> {
        match self.existing("attributes.ron") {
            Some(path) => AttributeSetLoader::load(&path),
            None => AttributeSetLoader::parse(bundled::ATTRIBUTES_RON),
        }
    }

    /// Context builder preloaded with the config and effect library.
    /// Callers register calculations and cue handlers before building.
    pub fn context_builder(&self) -> LoadResult<AbilitySystemContextBuilder> {
        Ok(AbilitySystemContext::builder()
            .config(self.load_config()?)
            .library(self.load_effects()?))
    }

    pub fn build_context(&self) -> LoadResult<Arc<AbilitySystemContext>> {
        Ok(self.context_builder()?.build())
    }

    fn existing(&self, file: &str) -> Option<PathBuf> {
        let path = self.data_dir.as_ref()?.join(file);
        if path.exists() {
            Some(path)
        } else {
            tracing::debug!(
                target: "gameplay::content",
                file,
                "data file missing, using bundled copy"
            );
            None
        }
    }
}
