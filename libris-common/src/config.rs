//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (handled by the service binary)
//! 2. Environment variable (`LIBRIS_ROOT_FOLDER`, then `LIBRIS_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default
//!
//! A missing or unreadable TOML file is never fatal: the resolver logs a
//! warning and falls through to the next source.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "libris.db";

/// Blob directory name inside the root folder
pub const BLOB_DIR_NAME: &str = "blobs";

/// Compiled-in defaults used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Generative provider section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AiProviderConfig {
    /// Bearer key for the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,
}

/// Enrichment pipeline section of the TOML file
///
/// Every field is optional; the service applies its own defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reanalyze_existing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter_credits: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_cost: Option<i64>,
}

/// Per-service TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ai: AiProviderConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_api_key: Option<String>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Path of the TOML file for a service (`~/.config/libris/<module>.toml`)
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("libris").join(format!("{}.toml", module_name)))
}

/// Load a TOML config file
///
/// Returns defaults when the file does not exist.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        debug!("Config file not found, using defaults: {}", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Resolves the root folder for a service
pub struct RootFolderResolver {
    module_name: String,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Resolve root folder from environment, TOML file, or compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Ok(path) = std::env::var("LIBRIS_ROOT_FOLDER") {
            return PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("LIBRIS_ROOT") {
            return PathBuf::from(path);
        }

        if let Some(config_path) = config_file_path(&self.module_name) {
            match load_toml_config(&config_path) {
                Ok(config) => {
                    if let Some(root) = config.root_folder {
                        return root;
                    }
                }
                Err(e) => {
                    warn!("Ignoring unreadable config file: {}", e);
                }
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the root folder layout
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and blob directory) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.blob_path())?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    pub fn blob_path(&self) -> PathBuf {
        self.root_folder.join(BLOB_DIR_NAME)
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/libris (or /var/lib/libris for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("libris"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/libris"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("libris"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/libris"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("libris"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\libris"))
    } else {
        PathBuf::from("./libris_data")
    }
}
