//! Configuration data structures for scterm.
//!
//! These structs are populated by deserializing a TOML file. Missing fields fall back
//! to the functions in [`super::defaults`]; unknown fields are rejected via
//! `#[serde(deny_unknown_fields)]`.

use super::defaults;
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration settings for the logging subsystem.
///
/// ```
/// use scterm_core::config::LoggingConfig;
///
/// let log_config: LoggingConfig = toml::from_str(r#"
/// level = "debug"
/// format = "json"
/// "#).unwrap();
/// assert_eq!(log_config.level, "debug");
/// assert_eq!(log_config.file_path, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level: "trace", "debug", "info", "warn" or "error" (case-insensitive).
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
    /// Optional log file. `None` disables file logging.
    #[serde(default = "defaults::default_log_file_path")]
    pub file_path: Option<PathBuf>,
    /// "text" or "json".
    #[serde(default = "defaults::default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        defaults::default_logging_config()
    }
}

/// Settings for the single top-level window the backend negotiates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    /// Width adopted when the compositor proposes `0`.
    #[serde(default = "defaults::default_window_width")]
    pub default_width: u32,
    /// Height adopted when the compositor proposes `0`.
    #[serde(default = "defaults::default_window_height")]
    pub default_height: u32,
    /// Fill color of each new window buffer, `0xAARRGGBB`.
    #[serde(default = "defaults::default_background")]
    pub background: u32,
    #[serde(default = "defaults::default_window_title")]
    pub title: String,
    #[serde(default = "defaults::default_app_id")]
    pub app_id: String,
    /// POSIX shared-memory base name, must look like `/name`.
    #[serde(default = "defaults::default_shm_name")]
    pub shm_name: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        defaults::default_window_config()
    }
}

/// Settings for the Vulkan context created on top of the window surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RendererConfig {
    #[serde(default = "defaults::default_application_name")]
    pub application_name: String,
    /// Request `VK_LAYER_KHRONOS_validation` and a debug messenger when available.
    #[serde(default = "defaults::default_validation_layers")]
    pub validation_layers: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        defaults::default_renderer_config()
    }
}

/// Root configuration structure.
///
/// ```
/// use scterm_core::config::ScTermConfig;
///
/// let config: ScTermConfig = toml::from_str(r#"
/// [window]
/// default_width = 1024
/// "#).unwrap();
/// assert_eq!(config.window.default_width, 1024);
/// assert_eq!(config.window.default_height, 320);
/// assert_eq!(config.logging.level, "info");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScTermConfig {
    #[serde(default = "defaults::default_logging_config")]
    pub logging: LoggingConfig,
    #[serde(default = "defaults::default_window_config")]
    pub window: WindowConfig,
    #[serde(default = "defaults::default_renderer_config")]
    pub renderer: RendererConfig,
}
