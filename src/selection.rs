//! Frame selection.
//!
//! Maps [`VideoMetadata`] and an [`ExtractionSpec`] to the ordered list of
//! frame indices to extract. Everything here is pure arithmetic: no I/O, no
//! randomness, and the same inputs always give the same indices.
//!
//! # Rounding
//!
//! This is the only place where seconds become frames:
//!
//! | Quantity | Rule |
//! |----------|------|
//! | window start | `floor(start_time * fps)` |
//! | window end (exclusive) | `ceil(end_time * fps)` |
//! | step for [`IntervalMode::Seconds`] | `round(seconds * fps)`, at least 1 |
//!
//! Before a rule is applied, a product within `1e-9` of an integer is snapped
//! to that integer, so `0.1 * 30.0` (`3.0000000000000004`) counts as exactly
//! 3 frames.
//!
//! # Example
//!
//! ```
//! use framecut::{ExtractionSpec, IntervalMode, VideoMetadata, select_frames};
//!
//! let metadata = VideoMetadata::new(300, 30.0)?;
//! let spec = ExtractionSpec::builder("frames")
//!     .interval(IntervalMode::frames(10)?)
//!     .build()?;
//!
//! let frames = select_frames(&metadata, &spec);
//! assert_eq!(frames.len(), 30);
//! assert_eq!(frames[1], 10);
//! # Ok::<(), framecut::FramecutError>(())
//! ```

use std::time::Duration;

use crate::{
    config::{ExtractionSpec, IntervalMode},
    metadata::VideoMetadata,
};

const SNAP_EPSILON: f64 = 1e-9;

/// A half-open range of frame indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    /// First frame index in the window.
    pub start: u64,
    /// One past the last frame index in the window.
    pub end: u64,
}

impl FrameWindow {
    /// Resolve a window from optional bounds in seconds.
    ///
    /// Bounds are clamped to `[0, frame_count]`. A window whose start is at
    /// or after its end is empty, which is not an error.
    pub fn from_times(
        metadata: &VideoMetadata,
        start_time: Option<f64>,
        end_time: Option<f64>,
    ) -> Self {
        let fps = metadata.frames_per_second;
        let start = start_time.map(|seconds| to_frames(snap(seconds * fps).floor()));
        let end = end_time.map(|seconds| to_frames(snap(seconds * fps).ceil()));
        Self::clamped(metadata.frame_count, start, end)
    }

    /// Resolve the window described by `spec`.
    ///
    /// A time bound wins over a frame bound on the same side.
    pub fn from_spec(metadata: &VideoMetadata, spec: &ExtractionSpec) -> Self {
        let from_times = Self::from_times(metadata, spec.start_time(), spec.end_time());

        let start = match spec.start_time() {
            Some(_) => Some(from_times.start),
            None => spec.start_frame(),
        };
        let end = match spec.end_time() {
            Some(_) => Some(from_times.end),
            None => spec.end_frame(),
        };

        Self::clamped(metadata.frame_count, start, end)
    }

    fn clamped(frame_count: u64, start: Option<u64>, end: Option<u64>) -> Self {
        Self {
            start: start.unwrap_or(0).min(frame_count),
            end: end.unwrap_or(frame_count).min(frame_count),
        }
    }

    /// Whether the window selects nothing.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Number of frames in the window.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Indices `start, start + step, …` strictly below `end`.
    ///
    /// A `step` of zero is treated as 1.
    pub fn indices(&self, step: u64) -> impl Iterator<Item = u64> + use<> {
        let step = step.max(1);
        let end = self.end;
        std::iter::successors((!self.is_empty()).then_some(self.start), move |&current| {
            current.checked_add(step).filter(|&next| next < end)
        })
    }
}

/// Frame step for an interval at the given frame rate. Never zero.
pub fn frame_step(interval: IntervalMode, frames_per_second: f64) -> u64 {
    match interval {
        IntervalMode::Frames(n) => n.get(),
        IntervalMode::Seconds(seconds) => to_frames(snap(seconds * frames_per_second).round()).max(1),
    }
}

/// Compute the ordered, duplicate-free frame indices to extract.
pub fn select_frames(metadata: &VideoMetadata, spec: &ExtractionSpec) -> Vec<u64> {
    let window = FrameWindow::from_spec(metadata, spec);
    let step = frame_step(spec.interval(), metadata.frames_per_second);
    window.indices(step).collect()
}

/// One frame to extract, with the position it occupies in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    /// Index of the frame in the source video.
    pub frame_index: u64,
    /// 1-based position in the selected sequence; drives the file name.
    pub sequence_number: u64,
    /// Presentation time of the frame, `frame_index / fps`.
    pub timestamp: Duration,
}

/// Pair each selected index with its sequence number and timestamp.
///
/// Sequence numbers are assigned over the full selection, before any
/// filtering, so a resumed run with the same options reuses the same names.
pub fn plan_targets(metadata: &VideoMetadata, frame_indices: &[u64]) -> Vec<FrameTarget> {
    frame_indices
        .iter()
        .zip(1_u64..)
        .map(|(&frame_index, sequence_number)| FrameTarget {
            frame_index,
            sequence_number,
            timestamp: metadata.timestamp_of(frame_index),
        })
        .collect()
}

/// Short tag describing the interval of `spec`, used in default folder
/// names.
pub fn selection_label(spec: &ExtractionSpec) -> String {
    interval_label(spec.interval())
}

/// Short tag describing an interval, e.g. `every_frame` or `2s_interval`.
pub fn interval_label(interval: IntervalMode) -> String {
    match interval {
        IntervalMode::Frames(n) if n.get() == 1 => "every_frame".to_string(),
        IntervalMode::Frames(n) => format!("{n}_frames_interval"),
        IntervalMode::Seconds(seconds) => format!("{seconds}s_interval"),
    }
}

fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        value
    }
}

/// Saturating float-to-frame conversion; negatives and NaN become 0.
fn to_frames(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value as u64
    }
}
