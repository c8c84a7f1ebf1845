//! # scterm core library (`scterm-core`)
//!
//! Shared infrastructure for the scterm crates:
//!
//! - **Error Handling**: [`CoreError`] with the more specific [`ConfigError`].
//! - **Configuration Management**: TOML-backed [`ScTermConfig`] loaded through
//!   [`ConfigLoader`], with defaults for every field and a validation pass.
//! - **Logging**: `tracing` subscribers configured from [`LoggingConfig`], plus a
//!   minimal stderr logger for early startup and tests.
//!
//! ```rust,ignore
//! use scterm_core::config::ConfigLoader;
//! use scterm_core::logging::{init_logging, init_minimal_logging};
//!
//! fn main() -> Result<(), scterm_core::CoreError> {
//!     init_minimal_logging();
//!     let config = ConfigLoader::load()?;
//!     init_logging(&config.logging, true)?;
//!     tracing::info!("scterm core initialized");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigLoader, LoggingConfig, RendererConfig, ScTermConfig, WindowConfig};
pub use error::{ConfigError, CoreError};
pub use logging::{init_logging, init_minimal_logging};
