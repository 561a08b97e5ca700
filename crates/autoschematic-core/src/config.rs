//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `config.yml` under the installation
//! root. Keys are kebab-case and every field has a default, so a partial
//! file (or an empty one) is valid. Out-of-range performance values are not
//! rejected here; they are clamped when a [`PasteOptions`] snapshot is taken.
//!
//! [`PasteOptions`]: crate::options::PasteOptions

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use autoschematic_types::BlockPos;
use serde::{Deserialize, Serialize};

/// File name of the configuration under the installation root.
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// Contents written when no configuration file exists yet.
pub const DEFAULT_CONFIG_YAML: &str = "\
# Structure pasted by the startup trigger, relative to the installation root.
schematic-file: schematics/spawn.schem
spawn-x: 0
spawn-y: 0
spawn-z: 0
load-on-startup: true
schematics-folder: schematics

performance:
  # Spread large pastes across ticks instead of applying them in one tick.
  async-operations: true
  # Units processed per tick by a chunked paste (minimum 100).
  max-blocks-per-tick: 1000
  skip-light-updates: true
  skip-physics: true
  # Structures larger than chunk-size^2 * 2 blocks are chunked (4-32).
  chunk-size: 16
  # Chunked pastes still running after this many seconds fail (10-300).
  timeout-seconds: 30
  ignore-air-blocks: true
";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    #[error("failed to access config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    /// Structure pasted by the startup trigger.
    #[serde(default = "default_schematic_file")]
    pub schematic_file: String,

    /// Startup paste X coordinate.
    #[serde(default)]
    pub spawn_x: i32,

    /// Startup paste Y coordinate.
    #[serde(default)]
    pub spawn_y: i32,

    /// Startup paste Z coordinate.
    #[serde(default)]
    pub spawn_z: i32,

    /// Whether the startup trigger fires.
    #[serde(default = "default_true")]
    pub load_on_startup: bool,

    /// Folder holding schematic files, relative to the installation root.
    #[serde(default = "default_schematics_folder")]
    pub schematics_folder: String,

    /// Paste tuning.
    #[serde(default)]
    pub performance: PerformanceConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            schematic_file: default_schematic_file(),
            spawn_x: 0,
            spawn_y: 0,
            spawn_z: 0,
            load_on_startup: true,
            schematics_folder: default_schematics_folder(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl PluginConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// The startup paste coordinate.
    pub const fn spawn_position(&self) -> BlockPos {
        BlockPos::new(self.spawn_x, self.spawn_y, self.spawn_z)
    }
}

/// Paste tuning parameters, as written in the file.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PerformanceConfig {
    /// Allow the chunked strategy.
    #[serde(default = "default_true")]
    pub async_operations: bool,

    /// Units processed per tick by a chunked paste.
    #[serde(default = "default_max_blocks_per_tick")]
    pub max_blocks_per_tick: u32,

    /// Forwarded to the world when a session opens.
    #[serde(default = "default_true")]
    pub skip_light_updates: bool,

    /// Forwarded to the world when a session opens.
    #[serde(default = "default_true")]
    pub skip_physics: bool,

    /// Chunk edge length used by the strategy threshold.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Chunked paste deadline in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,

    /// Leave existing blocks where the structure has air.
    #[serde(default = "default_true")]
    pub ignore_air_blocks: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            async_operations: true,
            max_blocks_per_tick: default_max_blocks_per_tick(),
            skip_light_updates: true,
            skip_physics: true,
            chunk_size: default_chunk_size(),
            timeout_seconds: default_timeout_seconds(),
            ignore_air_blocks: true,
        }
    }
}

/// Holds the live configuration and hands out immutable snapshots.
///
/// [`reload`](Self::reload) swaps the shared pointer; anyone holding an
/// older snapshot keeps seeing the values it was taken with.
#[derive(Debug)]
pub struct ConfigStore {
    root: PathBuf,
    current: RwLock<Arc<PluginConfig>>,
}

impl ConfigStore {
    /// Load `config.yml` from `root`, writing the default file first if it
    /// does not exist, and create the schematics folder.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be written, read, or
    /// parsed, or the schematics folder cannot be created.
    pub fn load_or_create(root: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(root)?;
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            std::fs::write(&path, DEFAULT_CONFIG_YAML)?;
            tracing::info!(path = %path.display(), "Wrote default configuration");
        }
        let config = PluginConfig::from_file(&path)?;
        std::fs::create_dir_all(root.join(&config.schematics_folder))?;
        Ok(Self {
            root: root.to_path_buf(),
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Wrap an already-built configuration (tests, embedding).
    pub fn from_config(root: &Path, config: PluginConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Installation root the configuration was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The current configuration.
    pub fn snapshot(&self) -> Arc<PluginConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Re-read `config.yml` and publish it as the current configuration.
    ///
    /// On error the previous configuration stays in effect.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn reload(&self) -> Result<Arc<PluginConfig>, ConfigError> {
        let config = Arc::new(PluginConfig::from_file(&self.root.join(CONFIG_FILE_NAME))?);
        std::fs::create_dir_all(self.root.join(&config.schematics_folder))?;
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&config);
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_schematic_file() -> String {
    "schematics/spawn.schem".to_owned()
}

fn default_schematics_folder() -> String {
    "schematics".to_owned()
}

const fn default_max_blocks_per_tick() -> u32 {
    1000
}

const fn default_chunk_size() -> u32 {
    16
}

const fn default_timeout_seconds() -> u32 {
    30
}

const fn default_true() -> bool {
    true
}
