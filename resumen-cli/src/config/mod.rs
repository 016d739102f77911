//! Run configuration
//!
//! Loaded once from TOML and handed to each component when it is built.
//! Every field has a default, so a missing or partial file is fine.

pub mod credentials;

pub use credentials::Credentials;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "resumen-cli";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub engine: EngineConfig,
    pub sheet: SheetConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Scripts and their spooled CSV outputs
    pub sql_dir: PathBuf,
    /// Where originals are copied before a sheet replacement
    pub backup_dir: PathBuf,
    /// Canonical intermediate store
    pub resumen_store: PathBuf,
    /// dotenv file with the SQL_* credentials
    pub env_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sql_dir: PathBuf::from("SQL_files"),
            backup_dir: PathBuf::from("Backup_files"),
            resumen_store: PathBuf::from("resumen.txt"),
            env_file: PathBuf::from("config").join(".env"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "sqlplus".to_string(),
            timeout_secs: 900,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub name: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            name: "Resumen".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    pub level: String,
    /// Optional file receiving a copy of every log line
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load from `explicit`, else from the user config directory, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `~/.config/resumen-cli/config.toml` (platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn catalog_path(&self) -> PathBuf {
        crate::filename::catalog::catalog_path(&self.paths.sql_dir)
    }
}
