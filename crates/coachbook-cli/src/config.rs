//! Configuration file management for coachbook.
//!
//! Provides a TOML-based config file at `~/.config/coachbook/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use coachbook_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the coachbook config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/coachbook` or
/// `~/.config/coachbook`, ignoring the platform-specific
/// `dirs::config_dir()` (which would be `~/Library/Application Support`
/// on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("coachbook");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("coachbook")
}

/// Return the path to the coachbook config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct CoachbookConfig {
    pub db_config: DbConfig,
}

impl CoachbookConfig {
    /// Resolve configuration using the chain:
    /// CLI flag > env var > config file > default.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        if let Some(url) = cli_db_url {
            return Ok(Self {
                db_config: DbConfig::new(url),
            });
        }

        if let Ok(url) = std::env::var("COACHBOOK_DATABASE_URL") {
            return Ok(Self {
                db_config: DbConfig::new(url),
            });
        }

        if let Ok(file) = load_config() {
            return Ok(Self {
                db_config: DbConfig::new(file.database.url),
            });
        }

        Ok(Self {
            db_config: DbConfig::new(DbConfig::DEFAULT_URL),
        })
    }
}
