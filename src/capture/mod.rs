//! Capture session: acquisition and ownership of the live device stream.
//!
//! The session requests a combined audio+video stream once, binds it to the
//! mirrored preview, and owns its teardown. The audio branch runs through
//! cpal with a mono mixdown into a bounded ring for the level meter and an
//! optional tap for the WAV fallback encoder; the video branch is an opaque
//! device identity consumed by the encoding subsystem. Device failure is
//! terminal for the session: no retry, the whole interactive surface is
//! replaced by an error message.

pub mod device;

pub use device::{
    acquire_input_device, encoder_audio_device, mixdown_to_mono, suppress_alsa_warnings,
};

use cpal::traits::{DeviceTrait, StreamTrait};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Shared mono sample ring read by the level meter each frame.
pub type SharedSamples = Arc<Mutex<Vec<i16>>>;

/// Optional recording tap: armed by the WAV fallback encoder for the span of
/// a recording, fed by the capture callback.
pub type RecordTap = Arc<Mutex<Option<Vec<i16>>>>;

/// How many seconds of audio the meter ring retains.
const RING_SECONDS: u32 = 2;

/// Permission denied or no matching device. Fatal to the session.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no matching capture device: {0}")]
    NoDevice(String),
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),
    #[error("device configuration failed: {0}")]
    Config(String),
    #[error("failed to open capture stream: {0}")]
    Stream(String),
}

/// Capability request for the combined stream.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Audio device spec: "default", a name, or a numeric index.
    pub audio_device: String,
    /// Video device identity (e.g. /dev/video0, or an avfoundation index).
    pub video_device: String,
    /// Resolution hint; the device may deliver something close instead.
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            audio_device: "default".to_string(),
            video_device: default_video_device(),
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Platform default for the user-facing camera.
pub fn default_video_device() -> String {
    if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        "0".to_string()
    } else {
        "/dev/video0".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One track of the device stream.
#[derive(Debug)]
pub struct MediaTrack {
    pub kind: TrackKind,
    pub label: String,
    live: bool,
}

impl MediaTrack {
    fn new(kind: TrackKind, label: String) -> Self {
        Self {
            kind,
            label,
            live: true,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }
}

/// Opaque handle to the live audio+video tracks.
///
/// Owned exclusively by the capture session; destroyed by stopping every
/// track, exactly once, idempotently.
pub struct DeviceStream {
    tracks: Vec<MediaTrack>,
    stream: Option<cpal::Stream>,
    samples: SharedSamples,
    record_tap: RecordTap,
    sample_rate: u32,
    video_device: String,
}

impl DeviceStream {
    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Meter-facing handle onto the audio branch.
    pub fn samples(&self) -> SharedSamples {
        Arc::clone(&self.samples)
    }

    /// Recording tap for the WAV fallback encoder.
    pub fn record_tap(&self) -> RecordTap {
        Arc::clone(&self.record_tap)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn video_device(&self) -> &str {
        &self.video_device
    }

    /// Stops every track. Safe to call more than once; only the first call
    /// releases the underlying audio stream.
    pub fn stop_tracks(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("Audio capture stream released");
        }
        for track in &mut self.tracks {
            if track.live {
                track.live = false;
                tracing::debug!("Track stopped: {:?} ({})", track.kind, track.label);
            }
        }
    }

    /// Builds a stream without hardware for state-machine tests.
    #[cfg(test)]
    pub(crate) fn detached(sample_rate: u32) -> Self {
        Self {
            tracks: vec![
                MediaTrack::new(TrackKind::Audio, "test audio".to_string()),
                MediaTrack::new(TrackKind::Video, "test video".to_string()),
            ],
            stream: None,
            samples: Arc::new(Mutex::new(Vec::new())),
            record_tap: Arc::new(Mutex::new(None)),
            sample_rate,
            video_device: "test".to_string(),
        }
    }
}

/// Preview binding details surfaced to the UI.
#[derive(Debug, Clone)]
pub struct PreviewInfo {
    pub video_label: String,
    pub audio_label: String,
    pub width: u32,
    pub height: u32,
    /// Preview is mirrored horizontally for the mirror viewing experience.
    pub mirrored: bool,
}

/// Owner of the live device stream for one interactive session.
pub struct CaptureSession {
    stream: DeviceStream,
    preview: PreviewInfo,
    closed: bool,
}

impl CaptureSession {
    /// Acquires the combined audio+video stream and binds the preview.
    ///
    /// # Errors
    /// - [`DeviceError`] when permission is denied or no matching device
    ///   exists; the failure is terminal for the session
    pub fn open(request: &CaptureRequest) -> Result<Self, DeviceError> {
        probe_video_device(&request.video_device)?;

        let device = acquire_input_device(&request.audio_device)
            .map_err(|e| classify_device_error(&e))?;

        let audio_label = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Capture audio device: {audio_label}");

        let config = device
            .default_input_config()
            .map_err(|e| DeviceError::Config(e.to_string()))?;
        let sample_rate = config.sample_rate().0;
        let num_channels = config.channels() as usize;
        tracing::debug!("Audio configuration: {sample_rate}Hz, {num_channels} channels");

        let samples: SharedSamples = Arc::new(Mutex::new(Vec::new()));
        let record_tap: RecordTap = Arc::new(Mutex::new(None));

        let ring = Arc::clone(&samples);
        let tap = Arc::clone(&record_tap);
        let ring_capacity = (sample_rate * RING_SECONDS) as usize;

        let stream = device
            .build_input_stream(
                &config.into(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let mut mono = Vec::with_capacity(data.len() / num_channels.max(1));
                    mixdown_to_mono(data, num_channels, &mut mono);

                    if let Ok(mut buffer) = ring.lock() {
                        buffer.extend_from_slice(&mono);
                        if buffer.len() > ring_capacity {
                            let excess = buffer.len() - ring_capacity;
                            buffer.drain(..excess);
                        }
                    }
                    if let Ok(mut tap) = tap.lock() {
                        if let Some(sink) = tap.as_mut() {
                            sink.extend_from_slice(&mono);
                        }
                    }
                },
                |err| {
                    tracing::error!("Audio capture stream error: {err}");
                },
                None,
            )
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        let preview = PreviewInfo {
            video_label: request.video_device.clone(),
            audio_label: audio_label.clone(),
            width: request.ideal_width,
            height: request.ideal_height,
            mirrored: true,
        };

        let stream = DeviceStream {
            tracks: vec![
                MediaTrack::new(TrackKind::Audio, audio_label),
                MediaTrack::new(TrackKind::Video, request.video_device.clone()),
            ],
            stream: Some(stream),
            samples,
            record_tap,
            sample_rate,
            video_device: request.video_device.clone(),
        };

        tracing::info!(
            "Capture session opened: {}x{} hint, mirrored preview bound",
            request.ideal_width,
            request.ideal_height
        );
        Ok(Self {
            stream,
            preview,
            closed: false,
        })
    }

    pub fn stream(&self) -> &DeviceStream {
        &self.stream
    }

    pub fn preview(&self) -> &PreviewInfo {
        &self.preview
    }

    /// Stops every track exactly once. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.stream.stop_tracks();
        self.closed = true;
        tracing::info!("Capture session closed");
    }

    #[cfg(test)]
    pub(crate) fn detached(sample_rate: u32) -> Self {
        Self {
            stream: DeviceStream::detached(sample_rate),
            preview: PreviewInfo {
                video_label: "test".to_string(),
                audio_label: "test".to_string(),
                width: 1280,
                height: 720,
                mirrored: true,
            },
            closed: false,
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Verifies the configured camera device exists where that can be checked.
fn probe_video_device(spec: &str) -> Result<(), DeviceError> {
    // Only device-file platforms can be probed without opening the camera.
    if cfg!(target_os = "linux") && !Path::new(spec).exists() {
        return Err(DeviceError::NoDevice(format!(
            "video device {spec} does not exist"
        )));
    }
    Ok(())
}

/// Sorts an acquisition failure into the device error taxonomy.
fn classify_device_error(err: &anyhow::Error) -> DeviceError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") {
        DeviceError::PermissionDenied(message)
    } else {
        DeviceError::NoDevice(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_carries_resolution_hint() {
        let request = CaptureRequest::default();
        assert_eq!(request.ideal_width, 1280);
        assert_eq!(request.ideal_height, 720);
        assert_eq!(request.audio_device, "default");
    }

    #[test]
    fn stop_tracks_is_idempotent() {
        let mut stream = DeviceStream::detached(16000);
        assert!(stream.is_live());

        stream.stop_tracks();
        assert!(!stream.is_live());
        stream.stop_tracks();
        assert!(!stream.is_live());
    }

    #[test]
    fn close_is_idempotent_and_kills_liveness() {
        let mut session = CaptureSession::detached(16000);
        assert!(session.stream().is_live());
        session.close();
        session.close();
        assert!(!session.stream().is_live());
    }

    #[test]
    fn permission_failures_classify_as_denied() {
        let err = anyhow::anyhow!("Access denied by system policy");
        assert!(matches!(
            classify_device_error(&err),
            DeviceError::PermissionDenied(_)
        ));

        let err = anyhow::anyhow!("No audio input device available");
        assert!(matches!(classify_device_error(&err), DeviceError::NoDevice(_)));
    }

    #[test]
    fn preview_is_mirrored() {
        let session = CaptureSession::detached(16000);
        assert!(session.preview().mirrored);
    }
}
