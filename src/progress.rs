//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a run,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`]
//! for progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framecut::{ExtractOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.stage);
//!         }
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// Which extraction strategy produced a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtractionStage {
    /// Frames committed from the external batch extractor.
    FastPath,
    /// Frames decoded sequentially in-process.
    Fallback,
}

/// A snapshot of extraction progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled by
/// [`ExtractOptions::with_batch_size`](crate::ExtractOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Strategy currently running.
    pub stage: ExtractionStage,
    /// Frames handled so far (written or failed).
    pub current: u64,
    /// Frames that need handling in this run.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The frame index most recently handled. `None` for updates not tied to
    /// a frame: the start of a fast-path batch and the final report.
    pub current_frame: Option<u64>,
}

/// Trait for receiving progress updates during extraction.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// run. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during a run.
    fn on_progress(&self, info: &ProgressInfo);
}

pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone it and call [`cancel`](CancellationToken::cancel) from any thread
/// (or a Ctrl-C handler). The extractor checks it before every batch and
/// every decoded target frame.
///
/// # Example
///
/// ```
/// use framecut::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks progress timing across both strategies and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: Option<u64>, batch_size: u64) -> Self {
        Self {
            callback,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one handled frame and fire the callback if the batch threshold
    /// is reached.
    pub(crate) fn advance(&mut self, stage: ExtractionStage, frame_index: u64) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(stage, Some(frame_index));
            self.items_since_last_report = 0;
        }
    }

    /// Emit an update without advancing, before work that reports nothing
    /// until it ends.
    pub(crate) fn announce(&self, stage: ExtractionStage) {
        self.report(stage, None);
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self, stage: ExtractionStage) {
        self.report(stage, None);
    }

    fn report(&self, stage: ExtractionStage, frame_index: Option<u64>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);

        let estimated_remaining = if self.current > 0 {
            self.total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                elapsed.mul_f64(remaining as f64 / self.current as f64)
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            stage,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame_index,
        });
    }
}
