//! Output naming and atomic image writes.
//!
//! Every output file is named `frame_<NNNN>.<ext>`, where `NNNN` is the
//! target's zero-padded sequence number. A file either appears complete at its
//! final path or not at all: images are encoded into a temporary file in the
//! same directory and then moved into place.

use std::{
    fmt::Display,
    fs,
    io::{self, BufWriter, Seek, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, TimeZone};
use image::{
    DynamicImage, ImageError,
    codecs::{
        bmp::BmpEncoder,
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilterType, PngEncoder},
        tiff::TiffEncoder,
        webp::WebPEncoder,
    },
};

use crate::{
    config::{ExtractionSpec, ImageFormat},
    error::FramecutError,
    selection::FrameTarget,
};

/// Prefix shared by every output file name.
pub const FILE_PREFIX: &str = "frame_";

const TIMESTAMP_FOLDER_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const JPEG_QUALITY: u8 = 95;
const JPEG_QUALITY_LOSSLESS: u8 = 100;

/// Where output files go and what they are called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    directory: PathBuf,
    format: ImageFormat,
}

impl OutputLayout {
    /// A layout writing `format` images directly into `directory`.
    pub fn new<P: Into<PathBuf>>(directory: P, format: ImageFormat) -> Self {
        Self {
            directory: directory.into(),
            format,
        }
    }

    /// The layout described by `spec`, using the current local time for the
    /// timestamped subdirectory when one is requested.
    pub fn resolve(spec: &ExtractionSpec) -> Self {
        Self::resolve_at(spec, Local::now())
    }

    /// Like [`resolve`](OutputLayout::resolve) with an explicit clock reading.
    pub fn resolve_at<Tz: TimeZone>(spec: &ExtractionSpec, now: DateTime<Tz>) -> Self
    where
        Tz::Offset: Display,
    {
        let directory = if spec.timestamped() {
            spec.output_dir()
                .join(now.format(TIMESTAMP_FOLDER_FORMAT).to_string())
        } else {
            spec.output_dir().to_path_buf()
        };
        Self::new(directory, spec.image_format())
    }

    /// Directory the images are written into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Output image format.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// File name for a sequence number, e.g. `frame_0007.jpg`.
    pub fn file_name(&self, sequence_number: u64) -> String {
        format!(
            "{FILE_PREFIX}{sequence_number:04}.{}",
            self.format.extension()
        )
    }

    /// Full path for a sequence number.
    pub fn path(&self, sequence_number: u64) -> PathBuf {
        self.directory.join(self.file_name(sequence_number))
    }

    /// Inverse of [`file_name`](OutputLayout::file_name): the sequence number
    /// encoded in a name produced by this layout, if any.
    pub fn parse_sequence_number(&self, file_name: &str) -> Option<u64> {
        let digits = file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(self.format.extension())?
            .strip_suffix('.')?;
        if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Create the output directory (and parents) if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::WriteError`] if the directory cannot be
    /// created.
    pub fn ensure_directory(&self) -> Result<(), FramecutError> {
        fs::create_dir_all(&self.directory).map_err(|error| FramecutError::WriteError {
            path: self.directory.clone(),
            reason: format!("could not create output directory: {error}"),
        })
    }
}

/// An image that was written to its final location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Final path of the image.
    pub path: PathBuf,
    /// Sequence number encoded in the file name.
    pub sequence_number: u64,
    /// Index of the source frame in the video.
    pub source_frame_index: u64,
}

/// Writes frames into an [`OutputLayout`].
///
/// Existing files are never replaced unless `overwrite` is set; attempting to
/// do so is a [`FramecutError::WriteError`].
#[derive(Debug, Clone)]
pub struct OutputWriter {
    layout: OutputLayout,
    lossless: bool,
    overwrite: bool,
}

impl OutputWriter {
    /// Create a writer.
    pub fn new(layout: OutputLayout, lossless: bool, overwrite: bool) -> Self {
        Self {
            layout,
            lossless,
            overwrite,
        }
    }

    /// The layout this writer targets.
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Whether encoders favour quality over size.
    pub fn lossless(&self) -> bool {
        self.lossless
    }

    /// Encode `image` and move it into place for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::WriteError`] if the final path already exists
    /// (and `overwrite` is off), or if encoding or persisting fails. No
    /// partial file is left at the final path in either case.
    pub fn write(
        &self,
        image: &DynamicImage,
        target: &FrameTarget,
    ) -> Result<OutputFile, FramecutError> {
        let path = self.claim(target)?;
        let write_error = |reason: String| FramecutError::WriteError {
            path: path.clone(),
            reason,
        };

        let mut temporary = tempfile::Builder::new()
            .prefix(".framecut-")
            .suffix(".part")
            .tempfile_in(self.layout.directory())
            .map_err(|error| write_error(format!("could not create temporary file: {error}")))?;

        {
            let mut writer = BufWriter::new(temporary.as_file_mut());
            encode_image(image, self.layout.format(), self.lossless, &mut writer)
                .map_err(|error| write_error(format!("encoding failed: {error}")))?;
            writer
                .flush()
                .map_err(|error| write_error(format!("flush failed: {error}")))?;
        }

        let persisted = if self.overwrite {
            temporary.persist(&path)
        } else {
            temporary.persist_noclobber(&path)
        };
        persisted.map_err(|error| write_error(error.error.to_string()))?;

        Ok(self.output_file(path, target))
    }

    /// Move a file produced by the fast path into place for `target`.
    ///
    /// `staged` must live on the same filesystem as the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::WriteError`] under the same conditions as
    /// [`write`](OutputWriter::write).
    pub fn commit_staged(
        &self,
        staged: &Path,
        target: &FrameTarget,
    ) -> Result<OutputFile, FramecutError> {
        let path = self.claim(target)?;
        move_staged(staged, &path, self.overwrite).map_err(|error| FramecutError::WriteError {
            path: path.clone(),
            reason: format!("could not move staged frame into place: {error}"),
        })?;
        Ok(self.output_file(path, target))
    }

    fn claim(&self, target: &FrameTarget) -> Result<PathBuf, FramecutError> {
        let path = self.layout.path(target.sequence_number);
        if !self.overwrite && fs::symlink_metadata(&path).is_ok() {
            return Err(FramecutError::WriteError {
                path,
                reason: "file already exists".to_string(),
            });
        }
        Ok(path)
    }

    fn output_file(&self, path: PathBuf, target: &FrameTarget) -> OutputFile {
        log::debug!(
            "frame {} -> {}",
            target.frame_index,
            path.display()
        );
        OutputFile {
            path,
            sequence_number: target.sequence_number,
            source_frame_index: target.frame_index,
        }
    }
}

/// Rename `staged` to `path`. Without `overwrite` the rename fails if
/// `path` appeared since it was claimed.
fn move_staged(staged: &Path, path: &Path, overwrite: bool) -> io::Result<()> {
    let staged = tempfile::TempPath::from_path(staged);
    let persisted = if overwrite {
        staged.persist(path)
    } else {
        staged.persist_noclobber(path)
    };
    persisted.map_err(|error| error.error)
}

fn encode_image<W: Write + Seek>(
    image: &DynamicImage,
    format: ImageFormat,
    lossless: bool,
    writer: &mut W,
) -> Result<(), ImageError> {
    match format {
        ImageFormat::Jpg => {
            let quality = if lossless {
                JPEG_QUALITY_LOSSLESS
            } else {
                JPEG_QUALITY
            };
            let encoder = JpegEncoder::new_with_quality(writer, quality);
            // JPEG has no alpha channel.
            if image.color().has_alpha() {
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            } else {
                image.write_with_encoder(encoder)
            }
        }
        ImageFormat::Png => {
            let compression = if lossless {
                CompressionType::Best
            } else {
                CompressionType::Default
            };
            image.write_with_encoder(PngEncoder::new_with_quality(
                writer,
                compression,
                PngFilterType::Adaptive,
            ))
        }
        // The only WebP encoder available is lossless.
        ImageFormat::Webp => image.write_with_encoder(WebPEncoder::new_lossless(writer)),
        ImageFormat::Bmp => image.write_with_encoder(BmpEncoder::new(writer)),
        ImageFormat::Tiff => image.write_with_encoder(TiffEncoder::new(writer)),
    }
}
