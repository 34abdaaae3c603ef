//! Recording state machine.
//!
//! Wraps an encoder into a start/stop/data-emit lifecycle that accumulates
//! binary fragments in arrival order. Stop is asynchronous: `stop()` moves to
//! `Stopping` and signals the encoder; only the encoder's single completion
//! event moves to `Stopped` and hands the buffered fragments to the caller.
//! This keeps "caller believes stopped" and "fragments still arriving" from
//! racing.

pub mod encoder;
pub mod ffmpeg;
pub mod format;
pub mod wav;

pub use encoder::{EncoderEvent, FfmpegEncoder, Fragment, MediaEncoder};
pub use ffmpeg::{find_ffmpeg, find_tool, FfmpegSupport};
pub use format::{negotiate, FormatSupport, MediaFormat, UnsupportedFormatError, FORMAT_CANDIDATES};
pub use wav::WavEncoder;

use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

/// Interval at which the encoding subsystem emits fragments. Bounds memory
/// growth per fragment and keeps partial data recoverable.
pub const FRAGMENT_TIME_SLICE: Duration = Duration::from_millis(100);

/// Recorder lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Stopped,
    Active,
    /// Stop was requested; fragments may still arrive until the encoder's
    /// completion event fires.
    Stopping,
}

/// Ordered sequence of encoded fragments for the recording in progress.
///
/// Append-only while a recording is active, cleared at the start of each new
/// recording, consumed exactly once at completion. Empty fragments are
/// discarded silently on append.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    fragments: Vec<Fragment>,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment, dropping empty ones.
    pub fn push(&mut self, fragment: Fragment) {
        if fragment.is_empty() {
            return;
        }
        self.fragments.push(fragment);
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Total byte size across all fragments.
    pub fn total_bytes(&self) -> usize {
        self.fragments.iter().map(Fragment::len).sum()
    }

    /// Consumes the buffer, yielding the fragments in arrival order.
    pub fn take(&mut self) -> Vec<Fragment> {
        std::mem::take(&mut self.fragments)
    }
}

/// A finished recording handed over on the completion event.
#[derive(Debug)]
pub struct CompletedRecording {
    pub fragments: Vec<Fragment>,
}

impl CompletedRecording {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Start/stop/data-emit state machine over an encoding subsystem.
pub struct Recorder<E: MediaEncoder> {
    encoder: E,
    format: &'static MediaFormat,
    state: RecorderState,
    buffer: FragmentBuffer,
    events: Option<UnboundedReceiver<EncoderEvent>>,
}

impl<E: MediaEncoder> Recorder<E> {
    /// Creates a recorder around an already-negotiated format.
    pub fn new(encoder: E, format: &'static MediaFormat) -> Self {
        Self {
            encoder,
            format,
            state: RecorderState::Stopped,
            buffer: FragmentBuffer::new(),
            events: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn format(&self) -> &'static MediaFormat {
        self.format
    }

    /// Number of fragments buffered for the recording in progress.
    pub fn fragment_count(&self) -> usize {
        self.buffer.len()
    }

    /// Starts a new recording. Valid only from `Stopped`; any other state is
    /// a logged no-op that leaves the fragment buffer untouched.
    ///
    /// # Errors
    /// - If the encoder fails to start; the recorder stays `Stopped`
    pub fn start(&mut self) -> Result<()> {
        if self.state != RecorderState::Stopped {
            tracing::warn!("start() ignored: recorder is {:?}", self.state);
            return Ok(());
        }

        self.buffer.clear();
        let (tx, rx) = mpsc::unbounded_channel();
        self.encoder.start(self.format, FRAGMENT_TIME_SLICE, tx)?;
        self.events = Some(rx);
        self.state = RecorderState::Active;
        tracing::info!("Recording started ({})", self.format.id);
        Ok(())
    }

    /// Requests a stop. Valid only from `Active`; otherwise a logged no-op.
    /// The transition to `Stopped` happens when the completion event is
    /// observed by [`Recorder::pump`], not when this call returns.
    pub fn stop(&mut self) {
        if self.state != RecorderState::Active {
            tracing::debug!("stop() ignored: recorder is {:?}", self.state);
            return;
        }

        self.state = RecorderState::Stopping;
        if let Err(e) = self.encoder.finalize() {
            // Finalize could not be signalled; complete with what we have.
            tracing::error!("Encoder finalize failed: {e}");
        }
        tracing::info!("Recording stopping, awaiting encoder completion");
    }

    /// Drains pending encoder events. Non-empty fragments are appended in
    /// arrival order; the single completion event (while `Stopping`) returns
    /// the buffered fragments and moves to `Stopped`.
    pub fn pump(&mut self) -> Option<CompletedRecording> {
        let events = self.events.as_mut()?;

        loop {
            match events.try_recv() {
                Ok(EncoderEvent::Fragment(fragment)) => {
                    if self.state == RecorderState::Stopped {
                        tracing::debug!("Dropping fragment after completion");
                        continue;
                    }
                    self.buffer.push(fragment);
                }
                Ok(EncoderEvent::Completed) => {
                    if self.state != RecorderState::Stopping {
                        tracing::warn!(
                            "Completion event while {:?}; treating recording as ended",
                            self.state
                        );
                    }
                    self.state = RecorderState::Stopped;
                    self.events = None;
                    let fragments = self.buffer.take();
                    tracing::info!(
                        "Recording completed: {} fragments, {} bytes",
                        fragments.len(),
                        fragments.iter().map(Fragment::len).sum::<usize>()
                    );
                    return Some(CompletedRecording { fragments });
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    // Encoder went away without completing; treat as degraded
                    // completion so the session is not stuck in Stopping.
                    tracing::warn!("Encoder channel closed without completion event");
                    self.state = RecorderState::Stopped;
                    self.events = None;
                    let fragments = self.buffer.take();
                    return Some(CompletedRecording { fragments });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::encoder::testing::ScriptedEncoder;
    use super::*;

    fn test_format() -> &'static MediaFormat {
        &FORMAT_CANDIDATES[0]
    }

    fn fragment(size: usize) -> Fragment {
        Fragment::new(vec![0xAB; size], "video/webm;codecs=vp9,opus")
    }

    #[test]
    fn fragments_buffered_in_arrival_order() {
        let encoder = ScriptedEncoder::new(vec![fragment(10), fragment(20), fragment(15)]);
        let mut recorder = Recorder::new(encoder, test_format());

        recorder.start().unwrap();
        assert_eq!(recorder.state(), RecorderState::Active);
        assert!(recorder.pump().is_none());
        assert_eq!(recorder.fragment_count(), 3);

        recorder.stop();
        assert_eq!(recorder.state(), RecorderState::Stopping);

        let completed = recorder.pump().expect("completion");
        assert_eq!(recorder.state(), RecorderState::Stopped);
        let sizes: Vec<usize> = completed.fragments.iter().map(Fragment::len).collect();
        assert_eq!(sizes, vec![10, 20, 15]);
    }

    #[test]
    fn empty_fragments_are_discarded() {
        let encoder = ScriptedEncoder::new(vec![fragment(0), fragment(5), fragment(0)]);
        let mut recorder = Recorder::new(encoder, test_format());

        recorder.start().unwrap();
        recorder.pump();
        assert_eq!(recorder.fragment_count(), 1);
    }

    #[test]
    fn start_while_active_is_a_noop() {
        let encoder = ScriptedEncoder::new(vec![fragment(10)]);
        let mut recorder = Recorder::new(encoder, test_format());

        recorder.start().unwrap();
        recorder.pump();
        assert_eq!(recorder.fragment_count(), 1);

        // Second start must not clear the buffer or restart the encoder.
        recorder.start().unwrap();
        assert_eq!(recorder.fragment_count(), 1);
        assert_eq!(recorder.state(), RecorderState::Active);
    }

    #[test]
    fn stop_while_stopped_is_a_noop() {
        let encoder = ScriptedEncoder::new(vec![]);
        let mut recorder = Recorder::new(encoder, test_format());

        recorder.stop();
        assert_eq!(recorder.state(), RecorderState::Stopped);
        assert!(recorder.pump().is_none());
    }

    #[test]
    fn completion_with_no_fragments_is_degraded_success() {
        let encoder = ScriptedEncoder::new(vec![]);
        let mut recorder = Recorder::new(encoder, test_format());

        recorder.start().unwrap();
        recorder.stop();
        let completed = recorder.pump().expect("completion");
        assert!(completed.is_empty());
        assert_eq!(recorder.state(), RecorderState::Stopped);
    }

    #[test]
    fn new_recording_clears_previous_buffer() {
        let encoder = ScriptedEncoder::new(vec![fragment(8)]);
        let mut recorder = Recorder::new(encoder, test_format());

        recorder.start().unwrap();
        recorder.stop();
        assert!(!recorder.pump().unwrap().is_empty());

        recorder.start().unwrap();
        // Scripted encoder replays its fragment on every start; the buffer
        // must contain only the new recording's data.
        recorder.pump();
        assert_eq!(recorder.fragment_count(), 1);
    }

    #[test]
    fn buffer_totals_track_fragment_sizes() {
        let mut buffer = FragmentBuffer::new();
        buffer.push(fragment(10));
        buffer.push(fragment(20));
        buffer.push(fragment(15));
        assert_eq!(buffer.total_bytes(), 45);
        assert_eq!(buffer.len(), 3);

        let taken = buffer.take();
        assert_eq!(taken.len(), 3);
        assert!(buffer.is_empty());
    }
}
