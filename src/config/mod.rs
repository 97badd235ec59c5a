//! Configuration module
//!
//! Handles loading and saving benchmark configuration.

mod schema;

pub use schema::{Config, FilesConfig, HashingConfig, NetworkConfig, OracleConfig, OracleKind};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sha1bench")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load configuration from disk
pub fn load() -> Result<Config> {
    let path = config_path();

    if path.exists() {
        load_from(&path)
    } else {
        // Create default config
        let config = Config::default();
        save(&config, &path)?;
        Ok(config)
    }
}

/// Load an explicit configuration file
pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse config {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to disk
pub fn save(config: &Config, path: &Path) -> Result<()> {
    // Ensure config directory exists
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}
