//! Live audio level metering.
//!
//! Runs a per-frame analysis loop over the capture session's audio branch for
//! the lifetime of the session, independent of recording state. Each frame
//! reads the current byte frequency bins, reduces them to one scalar, and
//! publishes it; consumers always observe the most recent sample, never a
//! queue. The loop checks an owned cancellation flag before every reschedule
//! so no callback fires after the session tears down.

pub mod analysis;
pub mod ladder;

pub use analysis::{AnalysisContext, MeterVariant};
pub use ladder::{lit_cells, lit_count, CELL_COUNT, LEVEL_THRESHOLDS};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::capture::SharedSamples;

/// Animation-frame cadence of the metering loop.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Handle to the autonomous level metering loop.
///
/// The loop owns nothing but shared handles; dropping the `LevelMeter`
/// cancels it.
pub struct LevelMeter {
    level: Arc<AtomicU8>,
    cancel: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl LevelMeter {
    /// Spawns the metering loop over the given audio sample buffer.
    ///
    /// The analysis context is shared with the session controller, which
    /// closes it on teardown; a closed context produces silent frames and the
    /// cancellation flag stops the loop from rescheduling.
    pub fn spawn(
        samples: SharedSamples,
        analysis: Arc<Mutex<AnalysisContext>>,
        variant: MeterVariant,
    ) -> Self {
        let level = Arc::new(AtomicU8::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        let level_out = Arc::clone(&level);
        let cancel_flag = Arc::clone(&cancel);
        let handle = tokio::spawn(async move {
            tracing::debug!("Level meter loop started ({variant})");
            loop {
                if cancel_flag.load(Ordering::Relaxed) {
                    break;
                }

                let window = samples.lock().map(|buffer| buffer.clone()).ok();
                let Some(window) = window else {
                    // Poisoned capture buffer: skip the frame.
                    tokio::time::sleep(FRAME_INTERVAL).await;
                    continue;
                };
                let frame = match analysis.lock() {
                    Ok(mut ctx) => Some(ctx.byte_frequency_data(&window)),
                    Err(_) => None,
                };

                if let Some(bins) = frame {
                    level_out.store(variant.reduce(&bins), Ordering::Relaxed);
                }

                tokio::time::sleep(FRAME_INTERVAL).await;
            }
            tracing::debug!("Level meter loop stopped");
        });

        Self {
            level,
            cancel,
            handle: Some(handle),
        }
    }

    /// Most recently published level scalar (0-255).
    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    /// Cancels the loop. The flag is checked before every reschedule, so no
    /// further frame runs after the in-flight one completes. Idempotent.
    pub fn cancel(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for LevelMeter {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn meter_publishes_zero_for_silence() {
        let samples: SharedSamples = Arc::new(Mutex::new(vec![0i16; 512]));
        let analysis = Arc::new(Mutex::new(AnalysisContext::new(MeterVariant::Mirror)));
        let mut meter = LevelMeter::spawn(samples, analysis, MeterVariant::Mirror);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(meter.level(), 0);
        meter.cancel();
    }

    #[tokio::test]
    async fn cancelled_meter_stops_publishing() {
        let samples: SharedSamples = Arc::new(Mutex::new(Vec::new()));
        let analysis = Arc::new(Mutex::new(AnalysisContext::new(MeterVariant::Mirror)));
        let mut meter = LevelMeter::spawn(Arc::clone(&samples), analysis, MeterVariant::Mirror);

        meter.cancel();
        meter.cancel(); // idempotent

        // Feed loud samples after cancellation; the level must stay at rest.
        {
            let mut buffer = samples.lock().unwrap();
            buffer.extend(std::iter::repeat(i16::MAX).take(512));
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(meter.level(), 0);
    }
}
