//! Audio input device acquisition.
//!
//! Resolves the configured audio device (default, name, or numeric index)
//! through cpal, suppressing ALSA library noise on Linux while the host is
//! probed.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Resolves an audio input device from its configured spec.
///
/// `"default"` selects the system default input; otherwise the spec is tried
/// as a numeric index and then as a device name.
///
/// # Errors
/// - If no device matches the spec
/// - If device enumeration fails
pub fn acquire_input_device(spec: &str) -> Result<cpal::Device> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();

        if spec == "default" {
            return host
                .default_input_device()
                .ok_or_else(|| anyhow!("No audio input device available"));
        }

        if let Ok(index) = spec.parse::<usize>() {
            let devices: Vec<_> = host
                .input_devices()
                .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
                .collect();
            let count = devices.len();
            return devices.into_iter().nth(index).ok_or_else(|| {
                anyhow!(
                    "Audio device index {index} is out of range (0-{})",
                    count.saturating_sub(1)
                )
            });
        }

        let devices = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;
        for device in devices {
            if device.name().is_ok_and(|name| name == spec) {
                return Ok(device);
            }
        }

        Err(anyhow!(
            "Audio input device '{spec}' not found. Use 'mircam list-devices' to see available devices."
        ))
    })
}

/// Resolves the configured audio spec to a concrete device name for the
/// encoding subsystem.
///
/// The config accepts `"default"`, a numeric index, or a device name; ffmpeg
/// accepts only device names. cpal's ALSA host reports PCM identifiers as
/// device names, so resolving through it yields a string ffmpeg's alsa input
/// understands. Unresolvable specs fall back to the system default with a
/// logged warning rather than failing recording setup.
pub fn encoder_audio_device(spec: &str) -> String {
    if spec == "default" {
        return spec.to_string();
    }
    match acquire_input_device(spec) {
        Ok(device) => match device.name() {
            Ok(name) => return name,
            Err(e) => {
                tracing::warn!("Audio device '{spec}' has no usable name ({e}); using default");
            }
        },
        Err(e) => {
            tracing::warn!("Could not resolve audio device '{spec}' for the encoder ({e}); using default");
        }
    }
    "default".to_string()
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library
/// warnings on Linux. A no-op on other platforms.
#[cfg(target_os = "linux")]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms no stderr suppression is needed.
#[cfg(not(target_os = "linux"))]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

/// Mixes an interleaved multi-channel callback buffer down to mono samples.
pub fn mixdown_to_mono(data: &[i16], num_channels: usize, out: &mut Vec<i16>) {
    match num_channels {
        0 => {}
        1 => out.extend_from_slice(data),
        2 => {
            for chunk in data.chunks_exact(2) {
                let left = i32::from(chunk[0]);
                let right = i32::from(chunk[1]);
                out.push(((left + right) / 2) as i16);
            }
        }
        n => {
            for chunk in data.chunks_exact(n) {
                let sum: i32 = chunk.iter().map(|s| i32::from(*s)).sum();
                out.push((sum / n as i32) as i16);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passes_through() {
        let mut out = Vec::new();
        mixdown_to_mono(&[1, 2, 3], 1, &mut out);
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn stereo_averages_pairs() {
        let mut out = Vec::new();
        mixdown_to_mono(&[100, 200, -100, 100], 2, &mut out);
        assert_eq!(out, vec![150, 0]);
    }

    #[test]
    fn multichannel_averages_all_channels() {
        let mut out = Vec::new();
        mixdown_to_mono(&[30, 60, 90, 0, 0, 3], 3, &mut out);
        assert_eq!(out, vec![60, 1]);
    }

    #[test]
    fn encoder_audio_device_passes_default_through() {
        assert_eq!(encoder_audio_device("default"), "default");
    }

    #[test]
    fn unresolvable_audio_spec_falls_back_to_default() {
        // Whether or not the host has audio devices, a name that matches
        // nothing must resolve to the default rather than reach the encoder.
        assert_eq!(
            encoder_audio_device("no-such-capture-device-a1b2c3"),
            "default"
        );
    }
}
