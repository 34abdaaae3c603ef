//! Interactive capture-and-record session.
//!
//! Opens the device stream, wires up the level meter and recorder, and runs
//! the TUI loop until the user quits. Supports an external stop trigger via
//! the SIGUSR1 signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::artifact::{play_artifact, save_artifact};
use crate::config::MircamConfig;
use crate::capture::{encoder_audio_device, CaptureRequest, CaptureSession};
use crate::recorder::{
    find_ffmpeg, negotiate, FfmpegEncoder, FfmpegSupport, MediaEncoder, Recorder, WavEncoder,
    FORMAT_CANDIDATES,
};
use crate::session::{RecordingState, SessionController};
use crate::ui::{ErrorScreen, RecordingScreen, SessionCommand, SessionView};

/// Runs the interactive recording session.
///
/// # Errors
/// - If configuration cannot be loaded
/// - If the device stream cannot be acquired
/// - If the terminal UI fails
pub async fn handle_record() -> Result<(), anyhow::Error> {
    tracing::info!("=== mircam session started ===");

    let config = match MircamConfig::load_or_default() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let error_message = format!(
                "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/mircam/mircam.toml file and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    tracing::info!(
        "Configuration loaded: audio={}, video={}, {}x{}",
        config.capture.audio_device,
        config.capture.video_device,
        config.capture.width,
        config.capture.height
    );

    let request = CaptureRequest {
        audio_device: config.capture.audio_device.clone(),
        video_device: config.capture.video_device.clone(),
        ideal_width: config.capture.width,
        ideal_height: config.capture.height,
    };

    // Device failure is terminal: the whole interactive surface becomes the
    // error message, no retry.
    let capture = match CaptureSession::open(&request) {
        Ok(capture) => capture,
        Err(e) => {
            tracing::error!("Failed to open capture session: {e}");
            let error_message = format!(
                "Device Error:\n\n{e}\n\nCheck camera and microphone permissions and that no other application is using the devices."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(anyhow::anyhow!("Device error: {e}"));
        }
    };

    let recorder = build_recorder(&config, &capture);
    let mut session = SessionController::new(capture, recorder, config.meter.variant);

    let mut screen = RecordingScreen::new()
        .map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    let external_stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&external_stop))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    let mut status: Option<String> = None;

    tracing::debug!("Entering session loop. Space/r records, p plays, s saves, q quits.");
    loop {
        if external_stop.swap(false, Ordering::Relaxed) {
            if session.state() == RecordingState::Recording {
                tracing::info!("Received SIGUSR1: stopping recording via external trigger");
                session.stop_recording();
            } else {
                tracing::debug!("Received SIGUSR1 while idle; ignoring");
            }
        }

        session.pump();

        match screen.handle_input() {
            Ok(SessionCommand::Continue) => {}
            Ok(SessionCommand::ToggleRecording) => match session.state() {
                RecordingState::Idle => {
                    status = None;
                    session.start_recording();
                }
                RecordingState::Recording => session.stop_recording(),
            },
            Ok(SessionCommand::Play) => {
                if let Some(artifact) = session.artifact() {
                    match play_artifact(session.artifact_store(), artifact) {
                        Ok(()) => status = Some("Playing...".to_string()),
                        Err(e) => {
                            tracing::warn!("Playback failed: {e}");
                            status = Some(format!("Playback failed: {e}"));
                        }
                    }
                }
            }
            Ok(SessionCommand::Save) => {
                if let (Some(artifact), Some(extension)) =
                    (session.artifact(), session.artifact_extension())
                {
                    match save_artifact(
                        session.artifact_store(),
                        artifact,
                        &config.output.directory,
                        extension,
                    ) {
                        Ok(path) => status = Some(format!("Saved to {}", path.display())),
                        Err(e) => {
                            tracing::warn!("Save failed: {e}");
                            status = Some(format!("Save failed: {e}"));
                        }
                    }
                }
            }
            Ok(SessionCommand::Quit) => break,
            Err(e) => {
                tracing::error!("Input handling error: {e}");
                session.teardown();
                return Err(anyhow::anyhow!("Input handling error: {e}"));
            }
        }

        let view = SessionView {
            state: session.state(),
            level: session.level(),
            elapsed: session.elapsed(),
            preview: session.capture().preview(),
            artifact: session.artifact(),
            recorder_available: session.recorder_available(),
            status: status.as_deref(),
        };
        screen
            .render(&view)
            .map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;
    }

    session.teardown();
    screen
        .cleanup()
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;

    tracing::info!("=== mircam session exited ===");
    Ok(())
}

/// Sets up the recording path: ffmpeg when available, the audio-only WAV
/// fallback when it is not, `None` when no candidate format is supported.
/// A `None` recorder leaves preview and metering fully usable.
fn build_recorder(
    config: &MircamConfig,
    capture: &CaptureSession,
) -> Option<Recorder<Box<dyn MediaEncoder>>> {
    let ffmpeg = match find_ffmpeg() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("ffmpeg not found ({e}); falling back to audio-only WAV");
            return wav_fallback(capture);
        }
    };

    let support = match FfmpegSupport::detect(&ffmpeg) {
        Ok(support) => support,
        Err(e) => {
            tracing::warn!("ffmpeg capability probe failed ({e}); falling back to audio-only WAV");
            return wav_fallback(capture);
        }
    };

    match negotiate(&support) {
        Ok(format) if format.video_codec.is_none() => {
            // Only the audio-only candidate survived; the in-process WAV
            // encoder serves it without spawning ffmpeg.
            tracing::warn!("No usable video encoder; recording audio only");
            wav_fallback(capture)
        }
        Ok(format) => {
            // The config spec (default/index/name) must become a device name
            // before ffmpeg sees it.
            let audio_device = encoder_audio_device(&config.capture.audio_device);
            let encoder: Box<dyn MediaEncoder> = Box::new(FfmpegEncoder::new(
                ffmpeg,
                audio_device,
                capture.stream().video_device().to_string(),
                config.capture.width,
                config.capture.height,
            ));
            Some(Recorder::new(encoder, format))
        }
        Err(e) => {
            tracing::warn!("Recording disabled: {e}");
            None
        }
    }
}

fn wav_fallback(capture: &CaptureSession) -> Option<Recorder<Box<dyn MediaEncoder>>> {
    let format = FORMAT_CANDIDATES.iter().find(|f| f.container == "wav")?;
    let encoder: Box<dyn MediaEncoder> = Box::new(WavEncoder::new(
        capture.stream().record_tap(),
        capture.stream().sample_rate(),
    ));
    Some(Recorder::new(encoder, format))
}
