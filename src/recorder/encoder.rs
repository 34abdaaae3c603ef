//! Encoding subsystem seam.
//!
//! The recorder drives an encoder through a narrow interface: start it with a
//! negotiated format and a fragment time slice, receive fragments and exactly
//! one completion event over a channel, and ask it to finalize. The
//! production implementation muxes the capture devices through an ffmpeg
//! child process and slices its output at the time-slice cadence.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedSender;

use super::format::MediaFormat;

/// One chunk of encoded media data emitted during active recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub data: Vec<u8>,
    pub mime: String,
}

impl Fragment {
    pub fn new(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            data,
            mime: mime.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Event emitted by the encoding subsystem.
#[derive(Debug)]
pub enum EncoderEvent {
    /// A data slice arrived. May be empty on a quiet time slice.
    Fragment(Fragment),
    /// The encoder finalized. Emitted exactly once, after the terminal
    /// fragment flush.
    Completed,
}

/// Interface between the recorder state machine and the encoding subsystem.
pub trait MediaEncoder: Send {
    /// Begins encoding, emitting events on the given channel. Fragments
    /// arrive at the time-slice cadence in strict order.
    ///
    /// # Errors
    /// - If the encoding process cannot be started
    fn start(
        &mut self,
        format: &'static MediaFormat,
        time_slice: Duration,
        events: UnboundedSender<EncoderEvent>,
    ) -> Result<()>;

    /// Signals the encoder to finalize. Triggers one terminal fragment flush
    /// followed by one `Completed` event, delivered asynchronously.
    ///
    /// # Errors
    /// - If the finalize signal cannot be delivered
    fn finalize(&mut self) -> Result<()>;
}

impl MediaEncoder for Box<dyn MediaEncoder> {
    fn start(
        &mut self,
        format: &'static MediaFormat,
        time_slice: Duration,
        events: UnboundedSender<EncoderEvent>,
    ) -> Result<()> {
        (**self).start(format, time_slice, events)
    }

    fn finalize(&mut self) -> Result<()> {
        (**self).finalize()
    }
}

/// ffmpeg-backed audio+video encoder.
///
/// Spawns ffmpeg reading the session's capture devices directly and muxing to
/// stdout; a reader task slices the output stream into fragments. Finalizing
/// sends ffmpeg its graceful quit command, which flushes the muxer and closes
/// the pipe, producing the terminal fragment and the completion event.
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    audio_device: String,
    video_device: String,
    width: u32,
    height: u32,
    child: Option<tokio::process::Child>,
}

impl FfmpegEncoder {
    pub fn new(
        ffmpeg: PathBuf,
        audio_device: String,
        video_device: String,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            ffmpeg,
            audio_device,
            video_device,
            width,
            height,
            child: None,
        }
    }

    /// Platform-specific capture input arguments.
    fn input_args(&self) -> Vec<String> {
        let size = format!("{}x{}", self.width, self.height);
        if cfg!(target_os = "macos") {
            // avfoundation takes "video:audio" device indices in one input.
            vec![
                "-f".into(),
                "avfoundation".into(),
                "-framerate".into(),
                "30".into(),
                "-video_size".into(),
                size,
                "-i".into(),
                format!("{}:{}", self.video_device, self.audio_device),
            ]
        } else {
            vec![
                "-f".into(),
                "v4l2".into(),
                "-framerate".into(),
                "30".into(),
                "-video_size".into(),
                size,
                "-i".into(),
                self.video_device.clone(),
                "-f".into(),
                "alsa".into(),
                "-i".into(),
                self.audio_device.clone(),
            ]
        }
    }
}

impl MediaEncoder for FfmpegEncoder {
    fn start(
        &mut self,
        format: &'static MediaFormat,
        time_slice: Duration,
        events: UnboundedSender<EncoderEvent>,
    ) -> Result<()> {
        if self.child.is_some() {
            return Err(anyhow!("Encoder already running"));
        }

        let mut cmd = tokio::process::Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error"]);
        cmd.args(self.input_args());
        if let Some(codec) = format.video_codec {
            cmd.args(["-c:v", codec]);
        }
        if let Some(codec) = format.audio_codec {
            cmd.args(["-c:a", codec]);
        }
        cmd.args(format.extra_args);
        cmd.args(["-f", format.container, "pipe:1"]);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn ffmpeg: {e}"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout not captured"))?;

        tracing::info!(
            "Encoder started: {} ({}) slicing every {}ms",
            format.id,
            format.mime,
            time_slice.as_millis()
        );

        let mime = format.mime.to_string();
        tokio::spawn(read_fragments(stdout, mime, time_slice, events));

        self.child = Some(child);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| anyhow!("Encoder not running"))?;

        let stdin = child.stdin.take();
        tokio::spawn(async move {
            // 'q' asks ffmpeg to stop reading inputs and flush the muxer.
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(b"q").await {
                    tracing::debug!("Failed to send quit to ffmpeg: {e}");
                }
            }
            match child.wait().await {
                Ok(status) => tracing::debug!("ffmpeg exited: {status}"),
                Err(e) => tracing::warn!("Failed to reap ffmpeg: {e}"),
            }
        });
        Ok(())
    }
}

/// Slices the encoder's output stream into fragments at the time-slice
/// cadence. End of stream flushes the residue as the terminal fragment and
/// emits the single completion event.
async fn read_fragments(
    mut stdout: tokio::process::ChildStdout,
    mime: String,
    time_slice: Duration,
    events: UnboundedSender<EncoderEvent>,
) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];
    let mut ticker = tokio::time::interval(time_slice);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    tracing::warn!("Encoder output read failed: {e}");
                    break;
                }
            },
            _ = ticker.tick() => {
                let slice = std::mem::take(&mut pending);
                if events
                    .send(EncoderEvent::Fragment(Fragment::new(slice, mime.clone())))
                    .is_err()
                {
                    // Recorder went away; nothing left to deliver to.
                    return;
                }
            }
        }
    }

    let _ = events.send(EncoderEvent::Fragment(Fragment::new(
        std::mem::take(&mut pending),
        mime.clone(),
    )));
    let _ = events.send(EncoderEvent::Completed);
    tracing::debug!("Encoder output stream ended");
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Test encoder that replays a scripted fragment sequence on start and
    /// completes on finalize.
    pub(crate) struct ScriptedEncoder {
        pub fragments: Vec<Fragment>,
        events: Option<UnboundedSender<EncoderEvent>>,
        pub started: usize,
        pub finalized: usize,
    }

    impl ScriptedEncoder {
        pub(crate) fn new(fragments: Vec<Fragment>) -> Self {
            Self {
                fragments,
                events: None,
                started: 0,
                finalized: 0,
            }
        }
    }

    impl MediaEncoder for ScriptedEncoder {
        fn start(
            &mut self,
            _format: &'static MediaFormat,
            _time_slice: Duration,
            events: UnboundedSender<EncoderEvent>,
        ) -> Result<()> {
            self.started += 1;
            for fragment in self.fragments.clone() {
                let _ = events.send(EncoderEvent::Fragment(fragment));
            }
            self.events = Some(events);
            Ok(())
        }

        fn finalize(&mut self) -> Result<()> {
            self.finalized += 1;
            if let Some(events) = &self.events {
                // Terminal flush, then exactly one completion.
                let _ = events.send(EncoderEvent::Fragment(Fragment::new(vec![], "test")));
                let _ = events.send(EncoderEvent::Completed);
            }
            Ok(())
        }
    }
}
