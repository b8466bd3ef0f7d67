//! Extraction parameters and operational options.
//!
//! [`ExtractionSpec`] describes *what* to extract: the time window, the
//! interval between frames, and how the output looks. It is validated once by
//! [`ExtractionSpecBuilder::build`] and immutable afterwards.
//!
//! [`ExtractOptions`] describes *how* a run behaves operationally: progress
//! reporting, cancellation, and whether the fast path may be used.
//!
//! # Example
//!
//! ```
//! use framecut::{ExtractionSpec, ImageFormat, IntervalMode};
//!
//! let spec = ExtractionSpec::builder("frames")
//!     .start_time(10.0)
//!     .end_time(20.0)
//!     .interval(IntervalMode::seconds(2.0)?)
//!     .image_format(ImageFormat::Png)
//!     .build()?;
//! assert_eq!(spec.image_format(), ImageFormat::Png);
//! # Ok::<(), framecut::FramecutError>(())
//! ```

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    num::NonZeroU64,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use crate::{
    error::FramecutError,
    progress::{CancellationToken, NoOpProgress, ProgressCallback},
};

/// Spacing between selected frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalMode {
    /// Every Nth frame.
    Frames(NonZeroU64),
    /// One frame every `s` seconds. Always finite and positive.
    Seconds(f64),
}

impl IntervalMode {
    /// Every Nth frame.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::InvalidSpec`] if `n` is zero.
    pub fn frames(n: u64) -> Result<Self, FramecutError> {
        NonZeroU64::new(n)
            .map(IntervalMode::Frames)
            .ok_or_else(|| FramecutError::InvalidSpec("frame interval must be at least 1".into()))
    }

    /// One frame every `seconds` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::InvalidSpec`] if `seconds` is not a finite
    /// positive number.
    pub fn seconds(seconds: f64) -> Result<Self, FramecutError> {
        if seconds.is_finite() && seconds > 0.0 {
            Ok(IntervalMode::Seconds(seconds))
        } else {
            Err(FramecutError::InvalidSpec(format!(
                "seconds interval must be greater than 0, got {seconds}"
            )))
        }
    }
}

impl Default for IntervalMode {
    /// Every frame.
    fn default() -> Self {
        IntervalMode::Frames(NonZeroU64::MIN)
    }
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// JPEG (`.jpg`). The default.
    #[default]
    Jpg,
    /// PNG (`.png`).
    Png,
    /// WebP (`.webp`).
    Webp,
    /// Windows bitmap (`.bmp`).
    Bmp,
    /// TIFF (`.tiff`).
    Tiff,
}

impl ImageFormat {
    /// Every supported format, in CLI order.
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Jpg,
        ImageFormat::Png,
        ImageFormat::Webp,
        ImageFormat::Bmp,
        ImageFormat::Tiff,
    ];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = FramecutError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            "bmp" => Ok(ImageFormat::Bmp),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            other => Err(FramecutError::InvalidSpec(format!(
                "unsupported image format: {other}"
            ))),
        }
    }
}

/// Validated extraction parameters for one run.
///
/// Construct through [`ExtractionSpec::builder`]. Time bounds take precedence
/// over frame bounds on the same side of the window; `end_frame` is
/// exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSpec {
    start_time: Option<f64>,
    end_time: Option<f64>,
    start_frame: Option<u64>,
    end_frame: Option<u64>,
    interval: IntervalMode,
    image_format: ImageFormat,
    lossless: bool,
    output_dir: PathBuf,
    timestamped: bool,
    overwrite: bool,
}

impl ExtractionSpec {
    /// Start building a spec that writes into `output_dir`.
    pub fn builder<P: Into<PathBuf>>(output_dir: P) -> ExtractionSpecBuilder {
        ExtractionSpecBuilder {
            spec: ExtractionSpec {
                start_time: None,
                end_time: None,
                start_frame: None,
                end_frame: None,
                interval: IntervalMode::default(),
                image_format: ImageFormat::default(),
                lossless: false,
                output_dir: output_dir.into(),
                timestamped: false,
                overwrite: false,
            },
        }
    }

    /// Window start in seconds, if given.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Window end in seconds, if given.
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    /// Window start as a frame index, if given.
    pub fn start_frame(&self) -> Option<u64> {
        self.start_frame
    }

    /// Exclusive window end as a frame index, if given.
    pub fn end_frame(&self) -> Option<u64> {
        self.end_frame
    }

    /// Spacing between selected frames.
    pub fn interval(&self) -> IntervalMode {
        self.interval
    }

    /// Output image format.
    pub fn image_format(&self) -> ImageFormat {
        self.image_format
    }

    /// Whether encoders should favour quality over size.
    pub fn lossless(&self) -> bool {
        self.lossless
    }

    /// Base output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether frames go into a timestamped subdirectory of
    /// [`output_dir`](ExtractionSpec::output_dir).
    pub fn timestamped(&self) -> bool {
        self.timestamped
    }

    /// Whether existing output files are replaced instead of skipped.
    pub fn overwrite(&self) -> bool {
        self.overwrite
    }
}

/// Builder for [`ExtractionSpec`].
#[derive(Debug, Clone)]
#[must_use]
pub struct ExtractionSpecBuilder {
    spec: ExtractionSpec,
}

impl ExtractionSpecBuilder {
    /// Window start in seconds.
    pub fn start_time(mut self, seconds: f64) -> Self {
        self.spec.start_time = Some(seconds);
        self
    }

    /// Window end in seconds.
    pub fn end_time(mut self, seconds: f64) -> Self {
        self.spec.end_time = Some(seconds);
        self
    }

    /// Window start as a frame index. Ignored when a start time is set.
    pub fn start_frame(mut self, frame: u64) -> Self {
        self.spec.start_frame = Some(frame);
        self
    }

    /// Exclusive window end as a frame index. Ignored when an end time is set.
    pub fn end_frame(mut self, frame: u64) -> Self {
        self.spec.end_frame = Some(frame);
        self
    }

    /// Spacing between frames. Defaults to every frame.
    pub fn interval(mut self, interval: IntervalMode) -> Self {
        self.spec.interval = interval;
        self
    }

    /// Output image format. Defaults to JPEG.
    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.spec.image_format = format;
        self
    }

    /// Favour quality over file size.
    pub fn lossless(mut self, lossless: bool) -> Self {
        self.spec.lossless = lossless;
        self
    }

    /// Write into a timestamped subdirectory.
    pub fn timestamped(mut self, timestamped: bool) -> Self {
        self.spec.timestamped = timestamped;
        self
    }

    /// Replace existing output files instead of skipping them.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.spec.overwrite = overwrite;
        self
    }

    /// Validate and produce the spec.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::InvalidSpec`] if a time bound is negative or
    /// not finite, if the end of the window precedes its start, if the
    /// interval is out of range, or if the output directory is empty.
    pub fn build(self) -> Result<ExtractionSpec, FramecutError> {
        let spec = self.spec;

        for (name, value) in [("start_time", spec.start_time), ("end_time", spec.end_time)] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(FramecutError::InvalidSpec(format!(
                        "{name} must be a non-negative number of seconds, got {value}"
                    )));
                }
            }
        }

        if let (Some(start), Some(end)) = (spec.start_time, spec.end_time) {
            if end < start {
                return Err(FramecutError::InvalidSpec(format!(
                    "end_time ({end}s) is before start_time ({start}s)"
                )));
            }
        }

        if spec.start_time.is_none() && spec.end_time.is_none() {
            if let (Some(start), Some(end)) = (spec.start_frame, spec.end_frame) {
                if end < start {
                    return Err(FramecutError::InvalidSpec(format!(
                        "end_frame ({end}) is before start_frame ({start})"
                    )));
                }
            }
        }

        // Variants can be built directly, bypassing the checked constructors.
        match spec.interval {
            IntervalMode::Frames(n) => {
                IntervalMode::frames(n.get())?;
            }
            IntervalMode::Seconds(s) => {
                IntervalMode::seconds(s)?;
            }
        }

        if spec.output_dir.as_os_str().is_empty() {
            return Err(FramecutError::InvalidSpec(
                "output directory must not be empty".into(),
            ));
        }

        Ok(spec)
    }
}

/// Operational settings for an extraction run.
///
/// All fields have defaults: no progress callback, no cancellation, progress
/// reported on every frame, fast path enabled.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
    /// Whether the external batch extractor may be tried first.
    pub(crate) use_fast_path: bool,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("use_fast_path", &self.use_fast_path)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
            use_fast_path: true,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the run stops between frames (or
    /// batches) and lists the untouched indices in
    /// [`ExtractionReport::cancelled`](crate::ExtractionReport).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Allow or forbid the external batch extractor.
    #[must_use]
    pub fn with_fast_path(mut self, enabled: bool) -> Self {
        self.use_fast_path = enabled;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
