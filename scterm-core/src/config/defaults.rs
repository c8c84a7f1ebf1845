//! Default configuration values for scterm.
//!
//! These functions are used by `serde`'s `default` attribute in the configuration
//! structures when a field is not present in the configuration file.

use super::types::{LoggingConfig, RendererConfig, WindowConfig};
use std::path::PathBuf;

/// Width used when the compositor proposes `0` ("no preference").
pub const DEFAULT_WINDOW_WIDTH: u32 = 640;
/// Height used when the compositor proposes `0` ("no preference").
pub const DEFAULT_WINDOW_HEIGHT: u32 = 320;
/// Background fill of every freshly allocated window buffer, as `0xAARRGGBB`.
pub const DEFAULT_BACKGROUND: u32 = 0xe028_2a36;

pub(super) fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        file_path: default_log_file_path(),
        format: default_log_format(),
    }
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_log_file_path() -> Option<PathBuf> {
    None
}

pub(super) fn default_log_format() -> String {
    "text".to_string()
}

pub(super) fn default_window_config() -> WindowConfig {
    WindowConfig {
        default_width: default_window_width(),
        default_height: default_window_height(),
        background: default_background(),
        title: default_window_title(),
        app_id: default_app_id(),
        shm_name: default_shm_name(),
    }
}

pub(super) fn default_window_width() -> u32 {
    DEFAULT_WINDOW_WIDTH
}

pub(super) fn default_window_height() -> u32 {
    DEFAULT_WINDOW_HEIGHT
}

pub(super) fn default_background() -> u32 {
    DEFAULT_BACKGROUND
}

pub(super) fn default_window_title() -> String {
    "scterm".to_string()
}

pub(super) fn default_app_id() -> String {
    "scterm".to_string()
}

/// Base name of the POSIX shared-memory object backing window buffers.
/// The backend appends the process id before opening it.
pub(super) fn default_shm_name() -> String {
    "/scterm".to_string()
}

pub(super) fn default_renderer_config() -> RendererConfig {
    RendererConfig {
        application_name: default_application_name(),
        validation_layers: default_validation_layers(),
    }
}

pub(super) fn default_application_name() -> String {
    "scterm".to_string()
}

pub(super) fn default_validation_layers() -> bool {
    false
}
