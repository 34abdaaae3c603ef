//! Audio-only WAV fallback encoder.
//!
//! Used when no muxing video format is available. Taps the capture session's
//! audio branch while active, emits heartbeat fragments at the time-slice
//! cadence, and encodes the accumulated PCM samples to an in-memory WAV on
//! finalize (the terminal fragment carries the whole file).

use anyhow::{anyhow, Result};
use hound::WavWriter;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use super::encoder::{EncoderEvent, Fragment, MediaEncoder};
use super::format::MediaFormat;
use crate::capture::RecordTap;

pub struct WavEncoder {
    tap: RecordTap,
    sample_rate: u32,
    running: Option<Arc<AtomicBool>>,
    events: Option<UnboundedSender<EncoderEvent>>,
    mime: &'static str,
}

impl WavEncoder {
    pub fn new(tap: RecordTap, sample_rate: u32) -> Self {
        Self {
            tap,
            sample_rate,
            running: None,
            events: None,
            mime: "audio/wav",
        }
    }

    /// Encodes mono i16 PCM samples into an in-memory WAV file.
    fn encode(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for sample in samples {
                writer.write_sample(*sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

impl MediaEncoder for WavEncoder {
    fn start(
        &mut self,
        format: &'static MediaFormat,
        time_slice: Duration,
        events: UnboundedSender<EncoderEvent>,
    ) -> Result<()> {
        if self.running.is_some() {
            return Err(anyhow!("Encoder already running"));
        }

        self.mime = format.mime;

        // Arm the tap: the capture callback mirrors samples into it from now on.
        match self.tap.lock() {
            Ok(mut tap) => *tap = Some(Vec::new()),
            Err(_) => return Err(anyhow!("Capture tap poisoned")),
        }

        let running = Arc::new(AtomicBool::new(true));
        let heartbeat = Arc::clone(&running);
        let tick_events = events.clone();
        let mime = format.mime.to_string();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(time_slice);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !heartbeat.load(Ordering::Relaxed) {
                    break;
                }
                // Data only materializes at finalize; ticks keep the
                // fragment cadence observable.
                if tick_events
                    .send(EncoderEvent::Fragment(Fragment::new(vec![], mime.clone())))
                    .is_err()
                {
                    break;
                }
            }
        });

        tracing::info!("WAV fallback encoder started ({}Hz mono)", self.sample_rate);
        self.running = Some(running);
        self.events = Some(events);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let running = self
            .running
            .take()
            .ok_or_else(|| anyhow!("Encoder not running"))?;
        running.store(false, Ordering::Relaxed);

        let samples = match self.tap.lock() {
            Ok(mut tap) => tap.take().unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        let events = self
            .events
            .take()
            .ok_or_else(|| anyhow!("Encoder event channel missing"))?;

        if samples.is_empty() {
            tracing::warn!("WAV encoder finalized with no samples captured");
            let _ = events.send(EncoderEvent::Completed);
            return Ok(());
        }

        let data = Self::encode(&samples, self.sample_rate)?;
        tracing::info!(
            "WAV encoder finalized: {} samples, {} bytes",
            samples.len(),
            data.len()
        );
        let _ = events.send(EncoderEvent::Fragment(Fragment::new(data, self.mime)));
        let _ = events.send(EncoderEvent::Completed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::format::FORMAT_CANDIDATES;
    use tokio::sync::mpsc::unbounded_channel;

    fn wav_format() -> &'static MediaFormat {
        FORMAT_CANDIDATES
            .iter()
            .find(|f| f.container == "wav")
            .unwrap()
    }

    #[tokio::test]
    async fn terminal_fragment_is_a_riff_file() {
        let tap: RecordTap = Arc::new(Mutex::new(None));
        let mut encoder = WavEncoder::new(Arc::clone(&tap), 16000);
        let (tx, mut rx) = unbounded_channel();

        encoder
            .start(wav_format(), Duration::from_millis(100), tx)
            .unwrap();

        // The armed tap receives samples the way the capture callback would.
        tap.lock()
            .unwrap()
            .as_mut()
            .unwrap()
            .extend_from_slice(&[100i16, -100, 200, -200]);

        encoder.finalize().unwrap();

        let mut terminal = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                EncoderEvent::Fragment(f) if !f.is_empty() => terminal = Some(f),
                EncoderEvent::Fragment(_) => {}
                EncoderEvent::Completed => break,
            }
        }

        let fragment = terminal.expect("terminal fragment");
        assert_eq!(fragment.mime, "audio/wav");
        assert_eq!(&fragment.data[0..4], b"RIFF");
        assert_eq!(&fragment.data[8..12], b"WAVE");
    }

    #[tokio::test]
    async fn no_samples_completes_without_fragment() {
        let tap: RecordTap = Arc::new(Mutex::new(None));
        let mut encoder = WavEncoder::new(tap, 16000);
        let (tx, mut rx) = unbounded_channel();

        encoder
            .start(wav_format(), Duration::from_millis(100), tx)
            .unwrap();
        encoder.finalize().unwrap();

        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                EncoderEvent::Fragment(f) => assert!(f.is_empty()),
                EncoderEvent::Completed => completed = true,
            }
        }
        assert!(completed);
    }
}
