//! Attribute set defaults loader.

use std::collections::BTreeSet;
use std::path::Path;

use gameplay_core::{AttributeSet, NumericAttributeSet};

use crate::loaders::{LoadResult, read_file};

/// Loader for default [`NumericAttributeSet`]s from RON files.
pub struct AttributeSetLoader;

impl AttributeSetLoader {
    /// RON format: `Vec<NumericAttributeSet>` with unique set ids.
    pub fn load(path: &Path) -> LoadResult<Vec<NumericAttributeSet>> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<Vec<NumericAttributeSet>> {
        let sets: Vec<NumericAttributeSet> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse attribute set RON: {}", e))?;

        let mut seen = BTreeSet::new();
        for set in &sets {
            if !seen.insert(set.id().clone()) {
                anyhow::bail!("attribute set {} is defined twice", set.id());
            }
        }
        Ok(sets)
    }
}
