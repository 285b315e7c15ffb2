//! Content loaders for reading effect data from files.
//!
//! Every loader has a `load` (file) and a `parse` (string) entry point; the
//! bundled defaults in [`crate::bundled`] go through `parse`.

pub mod attributes;
pub mod config;
pub mod effects;
pub mod factory;

pub use attributes::AttributeSetLoader;
pub use config::ConfigLoader;
pub use effects::EffectLibraryLoader;
pub use factory::ContentFactory;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
