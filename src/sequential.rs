//! Fallback path: in-process sequential decoding.
//!
//! A [`FrameSource`] yields every frame of the video in decode order, counting
//! from 0. The orchestrator numbers them as they arrive, renders only the
//! targets, and stops once the last target has gone by. Frames are decoded
//! lazily, one [`next()`](Iterator::next) at a time, so memory use does not
//! depend on the length of the video.
//!
//! [`FfmpegSource`] is the real implementation on top of the FFmpeg libraries.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::error::FramecutError;

/// Something that can decode a video frame by frame.
pub trait FrameSource {
    /// A decoded frame, not yet converted to an image.
    type Frame;
    /// Iterator over every frame in decode order.
    type Frames: Iterator<Item = Result<Self::Frame, FramecutError>>;

    /// Start decoding from the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::VideoUnreadable`] if the video cannot be
    /// opened for decoding.
    fn open(&self) -> Result<Self::Frames, FramecutError>;

    /// Convert a decoded frame into an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel conversion fails.
    fn render(&self, frame: &Self::Frame) -> Result<DynamicImage, FramecutError>;
}

/// [`FrameSource`] backed by the FFmpeg libraries.
///
/// The RGB scaler is created on the first [`render`](FrameSource::render)
/// call and reused while the frame geometry stays the same.
pub struct FfmpegSource {
    path: PathBuf,
    scaler: RefCell<Option<ScalerState>>,
}

struct ScalerState {
    context: ScalingContext,
    format: Pixel,
    width: u32,
    height: u32,
}

impl FfmpegSource {
    /// Decode the video at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            scaler: RefCell::new(None),
        }
    }

    /// Path of the video being decoded.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FfmpegSource {
    type Frame = VideoFrame;
    type Frames = DecodedFrames;

    fn open(&self) -> Result<DecodedFrames, FramecutError> {
        DecodedFrames::open(&self.path)
    }

    fn render(&self, frame: &VideoFrame) -> Result<DynamicImage, FramecutError> {
        let (width, height, format) = (frame.width(), frame.height(), frame.format());
        let mut slot = self.scaler.borrow_mut();

        let stale = slot.as_ref().is_none_or(|state| {
            state.format != format || state.width != width || state.height != height
        });
        if stale {
            let context = ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            *slot = Some(ScalerState {
                context,
                format,
                width,
                height,
            });
        }

        let Some(state) = slot.as_mut() else {
            return Err(FramecutError::FfmpegError("scaler unavailable".to_string()));
        };

        let mut rgb_frame = VideoFrame::empty();
        state.context.run(frame, &mut rgb_frame)?;

        let buffer = frame_to_rgb_buffer(&rgb_frame, width, height);
        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            FramecutError::FfmpegError("decoded frame has an unexpected size".to_string())
        })?;
        Ok(DynamicImage::ImageRgb8(image))
    }
}

/// Lazy iterator over every decoded frame of a video.
///
/// Owns its demuxer and decoder; both are released when it is dropped.
pub struct DecodedFrames {
    input_context: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    eof_sent: bool,
    done: bool,
}

impl DecodedFrames {
    fn open(path: &Path) -> Result<Self, FramecutError> {
        let unreadable = |reason: String| FramecutError::VideoUnreadable {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| unreadable(format!("FFmpeg initialisation failed: {error}")))?;
        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unreadable(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unreadable("no video stream found".to_string()))?;
        let stream_index = stream.index();
        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unreadable(format!("failed to create video decoder: {error}")))?;

        Ok(Self {
            input_context,
            decoder,
            stream_index,
            eof_sent: false,
            done: false,
        })
    }
}

impl Iterator for DecodedFrames {
    type Item = Result<VideoFrame, FramecutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let mut decoded = VideoFrame::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Some(Ok(decoded));
            }

            if self.eof_sent {
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            // A corrupt packet costs the frames in it, not the run.
                            log::debug!("decoder rejected packet: {error}");
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        self.done = true;
                        return Some(Err(error.into()));
                    }
                    self.eof_sent = true;
                }
                Err(_) => {
                    // Non-fatal read error, try the next packet.
                }
            }
        }
    }
}

/// Copy an RGB24 frame into a tightly packed buffer, dropping row padding.
fn frame_to_rgb_buffer(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;
    let rows = height as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * rows].to_vec()
    } else {
        data.chunks(stride)
            .take(rows)
            .flat_map(|row| &row[..row_bytes])
            .copied()
            .collect()
    }
}
