//! Configuration loading for scterm.
//!
//! [`ConfigLoader::load()`] reads `config.toml` from the scterm configuration
//! directory (`$XDG_CONFIG_HOME/scterm` on Linux). A missing file is not an error:
//! the defaults are used instead. Every loaded configuration, including the
//! defaults, passes through [`ConfigLoader::validate_config`].

use std::fs;
use std::path::{Path, PathBuf};

use directories_next::BaseDirs;

use crate::config::ScTermConfig;
use crate::error::{ConfigError, CoreError};

const CONFIG_DIR_NAME: &str = "scterm";
const CONFIG_FILE_NAME: &str = "config.toml";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 2] = ["text", "json"];

/// Namespace for configuration loading.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates the configuration from the user configuration directory.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DirectoryUnavailable`] if no home directory can be resolved.
    /// - [`ConfigError::ReadError`] for I/O failures other than "not found".
    /// - [`ConfigError::ParseError`] / [`ConfigError::ValidationError`] for bad content.
    pub fn load() -> Result<ScTermConfig, CoreError> {
        let path = Self::default_config_path()?;
        match fs::read_to_string(&path) {
            Ok(content) => Self::load_from_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No configuration file at {:?}, using defaults", path);
                let config = ScTermConfig::default();
                Self::validate_config(&config)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadError { path, source: e }.into()),
        }
    }

    /// Loads and validates the configuration from an explicit file.
    pub fn load_from_path(path: &Path) -> Result<ScTermConfig, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::load_from_str(&content)
    }

    /// Parses and validates TOML content. Empty content yields the defaults.
    pub fn load_from_str(content: &str) -> Result<ScTermConfig, CoreError> {
        let config: ScTermConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// `<config dir>/scterm/config.toml`.
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let base = BaseDirs::new().ok_or_else(|| ConfigError::DirectoryUnavailable {
            dir_type: "config".to_string(),
        })?;
        Ok(base.config_dir().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Checks values that parse but cannot be used.
    pub fn validate_config(config: &ScTermConfig) -> Result<(), ConfigError> {
        let level = config.logging.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}",
                config.logging.level
            )));
        }

        let format = config.logging.format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log format: {}",
                config.logging.format
            )));
        }

        let window = &config.window;
        if window.default_width == 0 || window.default_height == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Default window size must be non-zero, got {}x{}",
                window.default_width, window.default_height
            )));
        }

        // shm_open(3) wants exactly one leading slash and no others.
        let name = &window.shm_name;
        if name.len() < 2 || !name.starts_with('/') || name[1..].contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "Invalid shared memory name: {:?}",
                name
            )));
        }

        Ok(())
    }
}
