//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the controller's TOML file, falls back to
//! defaults when it does not exist yet, and writes it back on request.

pub mod config;

pub use config::{config_file_path, load_config, save_config, AppConfig, ConfigError};
