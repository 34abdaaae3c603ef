//! Configuration management for mircam.
//!
//! This module handles loading and saving application configuration from TOML
//! files. Configuration is stored in the user's config directory.

pub mod file;

pub use file::{get_config_path, CaptureConfig, MeterConfig, MircamConfig, OutputConfig};
