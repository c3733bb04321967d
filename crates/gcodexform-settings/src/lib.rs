//! gcodexform Settings Crate
//!
//! Loads, validates, and saves the pipeline and logging configuration.

pub mod config;
pub mod error;

pub use config::{Config, ConfigFormat, LoggingSettings, CONFIG_FILE_NAME};
pub use error::{SettingsError, SettingsResult};
