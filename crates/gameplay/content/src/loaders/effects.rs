//! Effect library loader.

use std::path::Path;

use gameplay_core::{EffectLibrary, GameplayEffectDef};

use crate::loaders::{LoadResult, read_file};

/// Loader for an [`EffectLibrary`] from RON files.
pub struct EffectLibraryLoader;

impl EffectLibraryLoader {
    /// Load and validate an effect library.
    ///
    /// RON format: `Vec<GameplayEffectDef>`. Fields left out take the
    /// definition defaults (instant, no modifiers, no stacking).
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, malformed RON, duplicate ids, dangling
    /// linked/overflow references and link cycles.
    pub fn load(path: &Path) -> LoadResult<EffectLibrary> {
        let content = read_file(path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Invalid effect library {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> LoadResult<EffectLibrary> {
        let defs: Vec<GameplayEffectDef> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse effect RON: {}", e))?;
        let count = defs.len();
        let library = EffectLibrary::from_defs(defs).map_err(|e| anyhow::anyhow!(e))?;

        tracing::debug!(target: "gameplay::content", effects = count, "effect library loaded");
        Ok(library)
    }
}
