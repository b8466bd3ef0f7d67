//! Video metadata.
//!
//! [`VideoMetadata`] is read once per run from the opened source and is
//! immutable afterwards. Everything downstream (frame selection, timestamps
//! for the fast path) is arithmetic over these values.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{codec::context::Context as CodecContext, format::context::Input, media::Type};

use crate::{discovery::is_supported_video, error::FramecutError};

/// How [`VideoMetadata::frame_count`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountSource {
    /// The container declared the number of frames.
    Container,
    /// Estimated as `floor(duration * fps)` because the container did not
    /// declare a count.
    Estimated,
    /// Counted by walking every video packet in the file.
    Scanned,
    /// Supplied directly through [`VideoMetadata::new`].
    Provided,
}

/// Metadata for the video stream being extracted.
///
/// # Example
///
/// ```no_run
/// use framecut::VideoMetadata;
///
/// let metadata = VideoMetadata::read("input.mp4")?;
/// println!("{} frames @ {:.3} fps", metadata.frame_count, metadata.frames_per_second);
/// # Ok::<(), framecut::FramecutError>(())
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Total number of frames in the stream.
    pub frame_count: u64,
    /// Frames per second. Always finite and positive.
    pub frames_per_second: f64,
    /// Frame width in pixels (0 when unknown).
    pub width: u32,
    /// Frame height in pixels (0 when unknown).
    pub height: u32,
    /// Codec name (e.g. `"h264"`), or `"unknown"`.
    pub codec: String,
    /// Where `frame_count` came from.
    pub frame_count_source: FrameCountSource,
}

impl VideoMetadata {
    /// Build metadata from known values.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::InvalidMetadata`] if `frames_per_second` is
    /// not a finite positive number.
    pub fn new(frame_count: u64, frames_per_second: f64) -> Result<Self, FramecutError> {
        if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
            return Err(FramecutError::InvalidMetadata(format!(
                "frame rate must be positive, got {frames_per_second}"
            )));
        }

        Ok(Self {
            frame_count,
            frames_per_second,
            width: 0,
            height: 0,
            codec: "unknown".to_string(),
            frame_count_source: FrameCountSource::Provided,
        })
    }

    /// Open a video file and read its metadata.
    ///
    /// The demuxer is dropped before this function returns, on success and
    /// on failure alike.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::VideoUnreadable`] if the container is not one
    /// of the supported extensions, the file cannot be opened, it has no
    /// video stream, or its frame rate cannot be determined.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, FramecutError> {
        let path = path.as_ref();
        let unreadable = |reason: String| FramecutError::VideoUnreadable {
            path: path.to_path_buf(),
            reason,
        };

        if !is_supported_video(path) {
            return Err(unreadable("unsupported container extension".to_string()));
        }

        ffmpeg_next::init()
            .map_err(|error| unreadable(format!("FFmpeg initialisation failed: {error}")))?;

        let mut input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unreadable(error.to_string()))?;

        let probe = probe_video_stream(&input_context, path)?;

        let (frame_count, frame_count_source) = if probe.declared_frames > 0 {
            (probe.declared_frames as u64, FrameCountSource::Container)
        } else if let Some(duration) = probe.duration {
            let estimate = (duration.as_secs_f64() * probe.frames_per_second).floor() as u64;
            log::warn!(
                "container does not declare a frame count, estimated {estimate} from duration {duration:?}"
            );
            (estimate, FrameCountSource::Estimated)
        } else {
            let scanned = count_video_packets(&mut input_context, probe.stream_index);
            log::warn!("no frame count or duration available, scanned {scanned} packets");
            (scanned, FrameCountSource::Scanned)
        };

        log::debug!(
            "{}: {frame_count} frames ({frame_count_source:?}) @ {:.3} fps, {}x{} [{}]",
            path.display(),
            probe.frames_per_second,
            probe.width,
            probe.height,
            probe.codec,
        );

        Ok(Self {
            frame_count,
            frames_per_second: probe.frames_per_second,
            width: probe.width,
            height: probe.height,
            codec: probe.codec,
            frame_count_source,
        })
    }

    /// Duration of the stream, `frame_count / fps`, saturating at
    /// [`Duration::MAX`].
    pub fn duration(&self) -> Duration {
        seconds_to_duration(self.frame_count as f64 / self.frames_per_second)
    }

    /// Presentation time of a frame index, `index / fps`, saturating at
    /// [`Duration::MAX`].
    pub fn timestamp_of(&self, frame_index: u64) -> Duration {
        seconds_to_duration(frame_index as f64 / self.frames_per_second)
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

/// Values read from the best video stream while the demuxer is borrowed.
struct StreamProbe {
    stream_index: usize,
    frames_per_second: f64,
    declared_frames: i64,
    duration: Option<Duration>,
    width: u32,
    height: u32,
    codec: String,
}

fn probe_video_stream(input_context: &Input, path: &Path) -> Result<StreamProbe, FramecutError> {
    let unreadable = |reason: String| FramecutError::VideoUnreadable {
        path: PathBuf::from(path),
        reason,
    };

    let stream = input_context
        .streams()
        .best(Type::Video)
        .ok_or_else(|| unreadable("no video stream found".to_string()))?;

    let frames_per_second = rational_to_f64(stream.avg_frame_rate())
        .or_else(|| rational_to_f64(stream.rate()))
        .ok_or_else(|| unreadable("could not determine frame rate".to_string()))?;

    let time_base = stream.time_base();
    let stream_duration = if stream.duration() > 0 && time_base.denominator() != 0 {
        Some(Duration::from_secs_f64(
            stream.duration() as f64 * time_base.numerator() as f64
                / time_base.denominator() as f64,
        ))
    } else {
        None
    };
    // Container duration is in AV_TIME_BASE (microseconds).
    let container_duration =
        (input_context.duration() > 0).then(|| Duration::from_micros(input_context.duration() as u64));

    let decoder_context = CodecContext::from_parameters(stream.parameters())
        .map_err(|error| unreadable(format!("failed to read codec parameters: {error}")))?;
    let decoder = decoder_context
        .decoder()
        .video()
        .map_err(|error| unreadable(format!("failed to create video decoder: {error}")))?;

    let codec = decoder
        .codec()
        .map(|codec| codec.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(StreamProbe {
        stream_index: stream.index(),
        frames_per_second,
        declared_frames: stream.frames(),
        duration: stream_duration.or(container_duration),
        width: decoder.width(),
        height: decoder.height(),
        codec,
    })
}

fn rational_to_f64(rational: ffmpeg_next::Rational) -> Option<f64> {
    if rational.numerator() <= 0 || rational.denominator() <= 0 {
        return None;
    }
    let value = rational.numerator() as f64 / rational.denominator() as f64;
    value.is_finite().then_some(value)
}

fn count_video_packets(input_context: &mut Input, stream_index: usize) -> u64 {
    input_context
        .packets()
        .filter(|(stream, _)| stream.index() == stream_index)
        .count() as u64
}
