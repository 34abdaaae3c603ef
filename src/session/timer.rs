//! Recording duration timer.
//!
//! Counts elapsed whole seconds while a recording is active. The tick task
//! checks its running flag after every sleep, so once `stop()` returns no
//! further increment can land. Display formatting is zero-padded `MM:SS` and
//! simply keeps growing past 99 minutes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Formats elapsed seconds as zero-padded `MM:SS`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Wall-clock second counter for the active recording.
pub struct RecordingTimer {
    seconds: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl RecordingTimer {
    pub fn new() -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Resets to zero and begins ticking once per wall-clock second.
    /// Restarting an already running timer resets the count.
    pub fn start(&mut self) {
        self.stop();
        self.seconds.store(0, Ordering::Relaxed);
        self.running.store(true, Ordering::Relaxed);

        let seconds = Arc::clone(&self.seconds);
        let running = Arc::clone(&self.running);
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + Duration::from_secs(1),
                Duration::from_secs(1),
            );
            loop {
                ticker.tick().await;
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                seconds.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    /// Stops ticking. No residual tick can fire after this returns: the flag
    /// flips first and the task is aborted outright. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Elapsed whole seconds of the current (or last) recording.
    pub fn elapsed(&self) -> u64 {
        self.seconds.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Default for RecordingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
