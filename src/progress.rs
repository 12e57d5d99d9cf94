use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::model::{DownloadResult, ProgressEvent, WorkerEvent};

/// Share of overall progress a single stream download is mapped into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressBand {
    pub start: f32,
    pub end: f32,
}

impl ProgressBand {
    /// Whole download phase; 0-10 is resolving, 90-100 is merge/finalize.
    pub const DOWNLOAD: ProgressBand = ProgressBand::new(10.0, 90.0);
    pub const VIDEO: ProgressBand = ProgressBand::new(10.0, 60.0);
    pub const AUDIO_AFTER_VIDEO: ProgressBand = ProgressBand::new(60.0, 90.0);

    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Maps a stream-local percentage (0-100) into this band.
    pub fn map(&self, percent: f32) -> f32 {
        let p = percent.clamp(0.0, 100.0);
        self.start + (self.end - self.start) * p / 100.0
    }
}

/// Percentage of a stream already on disk, from the chunk callback's view.
pub fn stream_percent(total: u64, bytes_remaining: u64) -> Option<f32> {
    if total == 0 {
        return None;
    }
    let downloaded = total.saturating_sub(bytes_remaining);
    Some((downloaded as f64 / total as f64 * 100.0) as f32)
}

/// Worker-side end of the progress channel.
///
/// Progress is dropped once the token is cancelled and never moves backwards.
/// The final result always goes out, so the UI sees exactly one.
pub struct ProgressReporter {
    tx: UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
    last_bits: AtomicU32,
}

impl ProgressReporter {
    pub fn new(tx: UnboundedSender<WorkerEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            last_bits: AtomicU32::new(0f32.to_bits()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn progress(&self, percent: f32, message: impl Into<String>) {
        if self.is_cancelled() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        let last = f32::from_bits(self.last_bits.load(Ordering::Relaxed));
        if percent < last {
            return;
        }
        self.last_bits.store(percent.to_bits(), Ordering::Relaxed);
        // UI may already be gone
        let _ = self.tx.send(WorkerEvent::Progress(ProgressEvent {
            percent,
            message: message.into(),
        }));
    }

    pub fn finish(&self, result: DownloadResult) {
        let _ = self.tx.send(WorkerEvent::Finished(result));
    }
}
