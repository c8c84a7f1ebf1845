//! Configuration management for scterm.
//!
//! - [`types`]: the schema ([`ScTermConfig`], [`LoggingConfig`], [`WindowConfig`],
//!   [`RendererConfig`]).
//! - [`defaults`]: default values applied to missing fields.
//! - [`loader`]: [`ConfigLoader`], which reads TOML and validates the result.

pub mod defaults;
pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{LoggingConfig, RendererConfig, ScTermConfig, WindowConfig};
