//! # framecut
//!
//! Extract still frames from a video at a fixed frame or time interval and
//! write them as numbered image files.
//!
//! `framecut` selects frames with pure arithmetic over the video's metadata,
//! skips frames already extracted by an earlier run, and writes the rest
//! through one of two strategies:
//!
//! - a **fast path** that asks an external `ffmpeg` process for a whole batch
//!   of frames at once, and
//! - a **fallback** that decodes the video in-process with
//!   [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) and writes the
//!   targeted frames with the [`image`] crate.
//!
//! Both produce the same file names: `frame_0001.jpg`, `frame_0002.jpg`, …,
//! numbered by position in the selection.
//!
//! ## Quick Start
//!
//! ```no_run
//! use framecut::{ExtractOptions, ExtractionSpec, FrameExtractor, ImageFormat, IntervalMode};
//!
//! let extractor = FrameExtractor::open("input.mp4")?;
//! let spec = ExtractionSpec::builder("frames")
//!     .start_time(10.0)
//!     .end_time(20.0)
//!     .interval(IntervalMode::seconds(2.0)?)
//!     .image_format(ImageFormat::Png)
//!     .build()?;
//!
//! let report = extractor.run(&spec, &ExtractOptions::new())?;
//! for file in &report.written {
//!     println!("{} <- frame {}", file.path.display(), file.source_frame_index);
//! }
//! # Ok::<(), framecut::FramecutError>(())
//! ```
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build the crate. The
//! `ffmpeg` executable is optional: without it every frame goes through the
//! fallback.

pub mod batch;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod metadata;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod selection;
pub mod sequential;

pub use batch::{BatchFrameExtractor, BatchRequest, FfmpegCli, MAX_TERMS_PER_BATCH};
pub use config::{ExtractOptions, ExtractionSpec, ExtractionSpecBuilder, ImageFormat, IntervalMode};
pub use discovery::{
    SUPPORTED_VIDEO_EXTENSIONS, default_output_dir, find_video, is_supported_video,
};
pub use error::FramecutError;
pub use extractor::{ExtractionReport, FrameExtractor, FrameFailure};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use metadata::{FrameCountSource, VideoMetadata};
pub use output::{OutputFile, OutputLayout, OutputWriter};
pub use progress::{CancellationToken, ExtractionStage, ProgressCallback, ProgressInfo};
pub use scanner::{OutputScanner, ScanResult};
pub use selection::{
    FrameTarget, FrameWindow, interval_label, plan_targets, select_frames, selection_label,
};
pub use sequential::{DecodedFrames, FfmpegSource, FrameSource};
