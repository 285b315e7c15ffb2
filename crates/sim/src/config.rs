//! Runner settings from the environment (and `.env`).

use std::path::PathBuf;

/// Data directory overriding the bundled content.
const DATA_DIR_VAR: &str = "GAMEPLAY_DATA_DIR";
/// File receiving a copy of the log output.
const LOG_FILE_VAR: &str = "GAMEPLAY_LOG_FILE";
/// Filter used when `RUST_LOG` is unset.
const LOG_LEVEL_VAR: &str = "GAMEPLAY_LOG_LEVEL";

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub data_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl SimConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var_os(DATA_DIR_VAR).map(PathBuf::from),
            log_file: std::env::var_os(LOG_FILE_VAR).map(PathBuf::from),
            log_level: std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| "info".to_string()),
        }
    }
}
