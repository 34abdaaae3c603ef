//! Session orchestration.
//!
//! The session controller composes the capture session, level meter,
//! recorder, timer, and artifact store. It mediates every recording state
//! transition and guarantees ordered teardown of every acquired resource:
//! device tracks first, then the analysis context, the meter loop, the
//! artifact reference, and finally the timer tick. Tracks must stop before
//! the analysis context closes so no frame operates on a dead source.

pub mod timer;

pub use timer::{format_elapsed, RecordingTimer};

use std::sync::{Arc, Mutex};

use crate::artifact::{Artifact, ArtifactStore};
use crate::capture::CaptureSession;
use crate::meter::{AnalysisContext, LevelMeter, MeterVariant};
use crate::recorder::{MediaEncoder, Recorder, RecorderState};

/// UI-facing recording state. Recorder/device failures are reported but do
/// not get a state of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// Composes the capture-and-record pipeline for one interactive session.
pub struct SessionController<E: MediaEncoder> {
    capture: CaptureSession,
    analysis: Arc<Mutex<AnalysisContext>>,
    meter: LevelMeter,
    /// None when format negotiation failed; recording stays unavailable but
    /// the rest of the session works.
    recorder: Option<Recorder<E>>,
    timer: RecordingTimer,
    store: ArtifactStore,
    artifact: Option<Artifact>,
    state: RecordingState,
    torn_down: bool,
}

impl<E: MediaEncoder> SessionController<E> {
    /// Wires the meter onto the capture session's audio branch and takes
    /// ownership of the recorder (if one could be set up) and the artifact
    /// store.
    pub fn new(
        capture: CaptureSession,
        recorder: Option<Recorder<E>>,
        variant: MeterVariant,
    ) -> Self {
        let analysis = Arc::new(Mutex::new(AnalysisContext::new(variant)));
        let meter = LevelMeter::spawn(
            capture.stream().samples(),
            Arc::clone(&analysis),
            variant,
        );

        if recorder.is_none() {
            tracing::warn!("No recorder available; session runs preview and metering only");
        }

        Self {
            capture,
            analysis,
            meter,
            recorder,
            timer: RecordingTimer::new(),
            store: ArtifactStore::new(),
            artifact: None,
            state: RecordingState::Idle,
            torn_down: false,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Most recent level scalar published by the meter loop.
    pub fn level(&self) -> u8 {
        self.meter.level()
    }

    pub fn elapsed(&self) -> u64 {
        self.timer.elapsed()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    pub fn recorder_available(&self) -> bool {
        self.recorder.is_some()
    }

    /// Saved-file extension for the negotiated format, if recording is set up.
    pub fn artifact_extension(&self) -> Option<&'static str> {
        self.recorder.as_ref().map(|r| r.format().extension)
    }

    /// Begins a recording. Never fails: when the recorder or device stream is
    /// unavailable, or a recording is already running, this logs and returns.
    pub fn start_recording(&mut self) {
        if self.state == RecordingState::Recording {
            tracing::debug!("start_recording ignored: already recording");
            return;
        }
        if !self.capture.stream().is_live() {
            tracing::warn!("start_recording ignored: device stream is not live");
            return;
        }
        let Some(recorder) = self.recorder.as_mut() else {
            tracing::warn!("start_recording ignored: no recorder available");
            return;
        };
        // The previous recording may still be finalizing; starting now would
        // tick the timer with no encoder running. Wait for the completion
        // event to be pumped.
        if recorder.state() != RecorderState::Stopped {
            tracing::warn!(
                "start_recording ignored: encoder is {:?}",
                recorder.state()
            );
            return;
        }

        // A new recording clears the previous artifact and its reference.
        if let Some(old) = self.artifact.take() {
            self.store.revoke(old.reference());
        }

        if let Err(e) = recorder.start() {
            tracing::error!("Failed to start recording: {e}");
            return;
        }

        self.timer.start();
        self.state = RecordingState::Recording;
    }

    /// Stops the active recording. A no-op when already idle. The UI leaves
    /// the Recording state immediately; artifact assembly waits for the
    /// encoder's completion event observed by [`SessionController::pump`].
    pub fn stop_recording(&mut self) {
        if self.state != RecordingState::Recording {
            tracing::debug!("stop_recording ignored: not recording");
            return;
        }

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop();
        }
        self.timer.stop();
        self.state = RecordingState::Idle;
    }

    /// Drives the recorder's event pump. On completion with at least one
    /// fragment, assembles and publishes the artifact; an empty completion
    /// leaves the previous artifact (if any) in place.
    pub fn pump(&mut self) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        let Some(completed) = recorder.pump() else {
            return;
        };

        if completed.is_empty() {
            tracing::info!("Recording completed without data; no artifact produced");
            return;
        }

        let artifact = self.store.publish(completed.fragments);
        self.artifact = Some(artifact);
    }

    /// Tears down every acquired resource in order: device tracks, analysis
    /// context, meter loop, artifact reference, timer tick. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        self.capture.close();
        if let Ok(mut ctx) = self.analysis.lock() {
            ctx.close();
        }
        self.meter.cancel();
        // Revoking everything covers the current reference too.
        self.artifact = None;
        self.store.revoke_all();
        self.timer.stop();

        self.torn_down = true;
        tracing::info!("Session torn down");
    }
}

impl<E: MediaEncoder> Drop for SessionController<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::encoder::testing::ScriptedEncoder;
    use crate::recorder::{Fragment, FORMAT_CANDIDATES};

    fn controller_with_fragments(
        fragments: Vec<Fragment>,
    ) -> SessionController<ScriptedEncoder> {
        let capture = CaptureSession::detached(16000);
        let recorder = Recorder::new(ScriptedEncoder::new(fragments), &FORMAT_CANDIDATES[0]);
        SessionController::new(capture, Some(recorder), MeterVariant::Mirror)
    }

    fn fragment(size: usize) -> Fragment {
        Fragment::new(vec![7; size], "video/webm;codecs=vp9,opus")
    }

    #[tokio::test]
    async fn full_recording_produces_one_artifact() {
        let mut session = controller_with_fragments(vec![
            fragment(10),
            fragment(20),
            fragment(15),
        ]);

        session.start_recording();
        assert_eq!(session.state(), RecordingState::Recording);

        session.stop_recording();
        assert_eq!(session.state(), RecordingState::Idle);

        session.pump();
        let artifact = session.artifact().expect("artifact");
        assert_eq!(artifact.size(), 45);
        assert_eq!(artifact.mime(), "video/webm;codecs=vp9,opus");

        session.teardown();
    }

    #[tokio::test]
    async fn empty_recording_produces_no_artifact() {
        let mut session = controller_with_fragments(vec![]);

        session.start_recording();
        session.stop_recording();
        session.pump();
        assert!(session.artifact().is_none());

        session.teardown();
    }

    #[tokio::test]
    async fn stop_while_idle_keeps_existing_artifact() {
        let mut session = controller_with_fragments(vec![fragment(5)]);

        session.start_recording();
        session.stop_recording();
        session.pump();
        assert!(session.artifact().is_some());
        let reference = session.artifact().unwrap().reference().clone();

        session.stop_recording();
        session.pump();
        assert_eq!(session.artifact().unwrap().reference(), &reference);

        session.teardown();
    }

    #[tokio::test]
    async fn start_without_recorder_is_a_noop() {
        let capture = CaptureSession::detached(16000);
        let mut session: SessionController<ScriptedEncoder> =
            SessionController::new(capture, None, MeterVariant::Mirror);

        session.start_recording();
        assert_eq!(session.state(), RecordingState::Idle);
        assert!(!session.recorder_available());

        session.teardown();
    }

    #[tokio::test]
    async fn start_without_live_stream_is_a_noop() {
        let mut session = controller_with_fragments(vec![fragment(1)]);
        session.capture.close();

        session.start_recording();
        assert_eq!(session.state(), RecordingState::Idle);

        session.teardown();
    }

    #[tokio::test]
    async fn restart_while_encoder_finalizing_is_a_noop() {
        let mut session = controller_with_fragments(vec![fragment(4)]);

        session.start_recording();
        session.stop_recording();

        // The completion event has not been pumped yet; the encoder is still
        // finalizing. Starting now must not tick the timer or revoke anything.
        session.start_recording();
        assert_eq!(session.state(), RecordingState::Idle);
        assert!(!session.timer.is_running());

        session.pump();
        let artifact = session.artifact().expect("artifact");
        assert_eq!(artifact.size(), 4);

        // Once the encoder has completed, recording works again.
        session.start_recording();
        assert_eq!(session.state(), RecordingState::Recording);

        session.teardown();
    }

    #[tokio::test]
    async fn second_recording_revokes_previous_reference() {
        let mut session = controller_with_fragments(vec![fragment(3)]);

        session.start_recording();
        session.stop_recording();
        session.pump();
        let first = session.artifact().unwrap().reference().clone();
        assert!(session.artifact_store().resolve(&first).is_some());

        session.start_recording();
        assert!(session.artifact_store().resolve(&first).is_none());
        session.stop_recording();
        session.pump();

        let second = session.artifact().unwrap().reference().clone();
        assert_ne!(first, second);
        assert_eq!(session.artifact_store().live_count(), 1);

        session.teardown();
    }

    #[tokio::test]
    async fn teardown_revokes_artifact_and_is_idempotent() {
        let mut session = controller_with_fragments(vec![fragment(2)]);

        session.start_recording();
        session.stop_recording();
        session.pump();
        let reference = session.artifact().unwrap().reference().clone();

        session.teardown();
        assert!(session.artifact_store().resolve(&reference).is_none());
        assert!(!session.capture().stream().is_live());
        assert_eq!(session.level(), 0);

        session.teardown();
    }
}
