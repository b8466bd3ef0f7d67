//! Error types for the `framecut` crate.
//!
//! This module defines [`FramecutError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context to
//! diagnose the problem (file paths, frame indices, upstream messages)
//! without additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framecut` operations.
///
/// Validation and metadata errors ([`InvalidSpec`](FramecutError::InvalidSpec),
/// [`VideoUnreadable`](FramecutError::VideoUnreadable)) abort a run before any
/// frame is touched. Per-frame errors
/// ([`FrameExtractionFailed`](FramecutError::FrameExtractionFailed),
/// [`WriteError`](FramecutError::WriteError)) are collected into the
/// [`ExtractionReport`](crate::ExtractionReport) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramecutError {
    /// The video could not be opened, has no video stream, or uses an
    /// unsupported container.
    #[error("Failed to read video at {path}: {reason}")]
    VideoUnreadable {
        /// Path that was passed to [`VideoMetadata::read`](crate::VideoMetadata::read).
        path: PathBuf,
        /// Underlying reason the read failed.
        reason: String,
    },

    /// The extraction options are conflicting or out of range.
    #[error("Invalid extraction options: {0}")]
    InvalidSpec(String),

    /// Metadata values that cannot describe a real video (e.g. zero fps).
    #[error("Invalid video metadata: {0}")]
    InvalidMetadata(String),

    /// The external multimedia tool used by the fast path is missing or
    /// cannot be started.
    #[error("External tool `{tool}` is unavailable: {reason}")]
    ExternalToolUnavailable {
        /// Program name or path that was probed.
        tool: String,
        /// Why the probe failed.
        reason: String,
    },

    /// A single frame (or a batch of frames on the fast path) could not be
    /// extracted.
    #[error("Failed to extract frame {frame_index}: {reason}")]
    FrameExtractionFailed {
        /// Index of the frame that failed. For batch failures this is the
        /// first index of the batch.
        frame_index: u64,
        /// Description of the failure.
        reason: String,
    },

    /// An output image could not be written.
    #[error("Failed to write {path}: {reason}")]
    WriteError {
        /// Final output path of the image.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// An I/O error occurred outside of a specific frame write.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for FramecutError {
    fn from(error: FfmpegError) -> Self {
        FramecutError::FfmpegError(error.to_string())
    }
}

impl FramecutError {
    /// Whether this error is scoped to a single frame and should be recorded
    /// rather than abort the run.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            FramecutError::FrameExtractionFailed { .. } | FramecutError::WriteError { .. }
        )
    }
}
