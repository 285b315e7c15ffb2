//! Effect system configuration loader.

use std::path::Path;

use gameplay_core::GameplayConfig;

use crate::loaders::{LoadResult, read_file};

/// Loader for [`GameplayConfig`] from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> LoadResult<GameplayConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<GameplayConfig> {
        let config: GameplayConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;

        if config.min_duration <= 0.0 {
            anyhow::bail!(
                "min_duration must be positive, got {}",
                config.min_duration
            );
        }
        if config.max_settle_rounds == 0 {
            anyhow::bail!("max_settle_rounds must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ConfigLoader::parse("rng_seed = 9\n").unwrap();
        assert_eq!(config.rng_seed, 9);
        assert_eq!(config.max_settle_rounds, GameplayConfig::DEFAULT_MAX_SETTLE_ROUNDS);
    }

    #[test]
    fn rejects_non_positive_min_duration() {
        assert!(ConfigLoader::parse("min_duration = 0.0\n").is_err());
        assert!(ConfigLoader::parse("max_settle_rounds = 0\n").is_err());
    }

    #[test]
    fn bundled_config_parses() {
        let config = ConfigLoader::parse(crate::bundled::CONFIG_TOML).unwrap();
        assert_eq!(config.rng_seed, 1337);
    }
}
