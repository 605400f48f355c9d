mod loader;
mod types;
mod validate;

pub use loader::{config_paths_from_list, load_config, load_config_from_str, ConfigFormat};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration paths provided (use --config or CONFIG_PATH)")]
    NoConfigPaths,

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported configuration format (expected .toml, .yaml or .yml): {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
