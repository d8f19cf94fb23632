//! Script system configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment: `VOID_BRIDGE_PLUGIN_DIRS` (platform path list) and
//!    `VOID_BRIDGE_STAGING_DIR`
//! 2. Config file passed to [`ScriptSystemConfig::load_from_file`]
//! 3. Defaults
//!
//! # Example Config File
//!
//! ```toml
//! plugin_directories = ["Scripts/Plugins"]
//! staging_directory = "Temp/Units"
//! unit_extensions = ["so", "dll", "dylib"]
//! recursive_scan = true
//! clear_staging_on_start = true
//!
//! [hot_reload]
//! enabled = true
//! debounce_ms = 500
//! ```

use crate::error::Result;
use crate::staging::default_unit_extensions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the plugin directories
pub const PLUGIN_DIRS_ENV: &str = "VOID_BRIDGE_PLUGIN_DIRS";

/// Environment variable overriding the staging directory
pub const STAGING_DIR_ENV: &str = "VOID_BRIDGE_STAGING_DIR";

/// Hot-reload settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotReloadSettings {
    /// Watch plugin directories for changed units
    pub enabled: bool,
    /// Quiet period before a change triggers a reload
    pub debounce_ms: u64,
}

impl HotReloadSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for HotReloadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
        }
    }
}

/// Script system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSystemConfig {
    /// Directories scanned by `load_plugins`
    pub plugin_directories: Vec<PathBuf>,
    /// Where units are shadow-copied before loading
    pub staging_directory: PathBuf,
    /// File extensions recognised as units
    pub unit_extensions: Vec<String>,
    /// Scan plugin directories recursively
    pub recursive_scan: bool,
    /// Empty the staging directory when the system starts
    pub clear_staging_on_start: bool,
    pub hot_reload: HotReloadSettings,
}

impl Default for ScriptSystemConfig {
    fn default() -> Self {
        Self {
            plugin_directories: vec![PathBuf::from("Scripts").join("Plugins")],
            staging_directory: std::env::temp_dir().join("void_bridge_units"),
            unit_extensions: default_unit_extensions(),
            recursive_scan: true,
            clear_staging_on_start: true,
            hot_reload: HotReloadSettings::default(),
        }
    }
}

impl ScriptSystemConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded script system config from {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(dirs) = std::env::var_os(PLUGIN_DIRS_ENV) {
            let dirs: Vec<PathBuf> = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !dirs.is_empty() {
                log::info!("Plugin directories from env: {:?}", dirs);
                self.plugin_directories = dirs;
            }
        }

        if let Some(dir) = std::env::var_os(STAGING_DIR_ENV) {
            if !dir.is_empty() {
                self.staging_directory = PathBuf::from(dir);
                log::info!("Staging directory from env: {}", self.staging_directory.display());
            }
        }
    }

    pub fn with_plugin_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_directories.push(dir.into());
        self
    }

    pub fn with_staging_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_directory = dir.into();
        self
    }
}
