//! List available capture devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::capture::{default_video_device, suppress_alsa_warnings};

/// Lists audio input devices and the candidate camera devices on the system.
///
/// # Errors
/// - If the audio host cannot be initialized
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let (host, devices) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let device_iter = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?;

        // Skip devices that fail the name query rather than aborting.
        let devices: Vec<cpal::Device> =
            device_iter.filter(|d| d.name().is_ok()).collect();

        Ok((host, devices))
    })?;

    println!();
    println!("Audio input devices:");
    println!();

    if devices.is_empty() {
        println!("  (none found)");
    }

    let default_device = host.default_input_device().and_then(|d| d.name().ok());

    for (index, device) in devices.iter().enumerate() {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let default_indicator = if default_device.as_ref() == Some(&device_name) {
            " [DEFAULT]"
        } else {
            ""
        };

        let config_info = match device.default_input_config() {
            Ok(config) => format!(
                " ({}Hz, {} channels)",
                config.sample_rate().0,
                config.channels()
            ),
            Err(_) => " (configuration unavailable)".to_string(),
        };

        println!("  ID: {index}");
        println!("    Name: {device_name}{default_indicator}");
        println!("    Config:{config_info}");
        println!();
    }

    println!("Video devices:");
    println!();
    for camera in enumerate_cameras() {
        println!("  {camera}");
    }
    println!();
    println!("Set devices in ~/.config/mircam/mircam.toml under [capture].");

    Ok(())
}

/// Best-effort camera enumeration. On Linux the v4l2 device files can be
/// listed directly; elsewhere only the default index is reported.
fn enumerate_cameras() -> Vec<String> {
    if cfg!(target_os = "linux") {
        let mut cameras: Vec<String> = (0..10)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| std::path::Path::new(path).exists())
            .collect();
        if cameras.is_empty() {
            cameras.push("(no /dev/video* devices found)".to_string());
        }
        cameras
    } else {
        vec![format!(
            "{} (platform default; additional cameras use higher indices)",
            default_video_device()
        )]
    }
}
