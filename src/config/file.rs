//! Configuration file management for mircam.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::meter::MeterVariant;

/// Capture device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `mircam list-devices`
    /// - device name from `mircam list-devices`
    #[serde(default = "default_audio_device")]
    pub audio_device: String,
    /// Camera device identity (e.g. /dev/video0 on Linux, an index elsewhere)
    #[serde(default = "crate::capture::default_video_device")]
    pub video_device: String,
    /// Preferred capture width; the device may deliver something close instead
    #[serde(default = "default_width")]
    pub width: u32,
    /// Preferred capture height
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_audio_device() -> String {
    "default".to_string()
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            audio_device: default_audio_device(),
            video_device: crate::capture::default_video_device(),
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Where saved recordings land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for saved recordings. Defaults to the platform video
    /// directory, falling back to the home directory.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

fn default_output_directory() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

/// Level meter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Analysis profile: "mirror" (responsive peak) or "mictest" (smoothed mean)
    #[serde(default)]
    pub variant: MeterVariant,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MircamConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub meter: MeterConfig,
}

impl MircamConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        let config_content = fs::read_to_string(&config_path)?;
        let config: MircamConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults when no file exists yet.
    /// A malformed file is still an error.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::debug!("No config file; using defaults");
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(&config_path)?;
        let config: MircamConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Retrieves the path to the config file, creating the directory if needed.
///
/// # Errors
/// - If the config directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let config_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    let config_path = config_dir
        .join(".config")
        .join("mircam")
        .join("mircam.toml");

    std::fs::create_dir_all(config_path.parent().unwrap())?;

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = MircamConfig::default();
        assert_eq!(config.capture.audio_device, "default");
        assert_eq!(config.capture.width, 1280);
        assert_eq!(config.capture.height, 720);
        assert_eq!(config.meter.variant, MeterVariant::Mirror);
    }

    #[test]
    fn empty_toml_deserializes_to_defaults() {
        let config: MircamConfig = toml::from_str("").unwrap();
        assert_eq!(config.capture.audio_device, "default");
        assert_eq!(config.meter.variant, MeterVariant::Mirror);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: MircamConfig = toml::from_str(
            r#"
            [capture]
            audio_device = "USB Microphone"

            [meter]
            variant = "mictest"
            "#,
        )
        .unwrap();
        assert_eq!(config.capture.audio_device, "USB Microphone");
        assert_eq!(config.capture.width, 1280);
        assert_eq!(config.meter.variant, MeterVariant::MicTest);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = MircamConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: MircamConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.capture.video_device, config.capture.video_device);
    }
}
