//! Fast path: batched extraction through an external `ffmpeg` process.
//!
//! The fast path is modelled as a capability, [`BatchFrameExtractor`], so the
//! orchestrator can run against a real `ffmpeg` binary ([`FfmpegCli`]) or a
//! test double. An implementation receives a [`BatchRequest`] and must write
//! exactly one image per target into the request's staging directory; the
//! orchestrator then moves those files to their final names.
//!
//! [`FfmpegCli`] selects frames with a single `select` filter expression per
//! batch instead of spawning a process per frame. Selected indices are
//! compressed into arithmetic progressions first, so a regular stride over the
//! whole video is one term and one process.

use std::{
    ffi::OsString,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::{config::ImageFormat, error::FramecutError, selection::FrameTarget};

/// Upper bound on progression terms in one `select` expression.
pub const MAX_TERMS_PER_BATCH: usize = 64;

const STDERR_TAIL_BYTES: usize = 2048;

/// Frames to extract in one external invocation.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    /// Source video.
    pub video_path: &'a Path,
    /// Targets in ascending frame order.
    pub targets: &'a [FrameTarget],
    /// Output image format.
    pub format: ImageFormat,
    /// Favour quality over size.
    pub lossless: bool,
    /// Empty directory to write images into.
    pub staging_dir: &'a Path,
}

/// A tool that can write many selected frames to image files in one go.
pub trait BatchFrameExtractor {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Check that the tool can run at all.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::ExternalToolUnavailable`] if it cannot.
    fn probe(&self) -> Result<(), FramecutError>;

    /// Write one image per target into `request.staging_dir` and return their
    /// paths in target order.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::ExternalToolUnavailable`] if the tool cannot be
    /// started, or [`FramecutError::FrameExtractionFailed`] if it ran and
    /// failed.
    fn extract_batch(&self, request: &BatchRequest<'_>) -> Result<Vec<PathBuf>, FramecutError>;
}

/// `first, first + step, …, last` as one filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progression {
    /// First index.
    pub first: u64,
    /// Last index (inclusive).
    pub last: u64,
    /// Distance between consecutive indices; 1 for a single index.
    pub step: u64,
    /// Number of indices covered.
    pub len: usize,
}

impl Progression {
    fn single(index: u64) -> Self {
        Self {
            first: index,
            last: index,
            step: 1,
            len: 1,
        }
    }

    /// The term as an FFmpeg expression over the frame counter `n`.
    pub fn to_expression(&self) -> String {
        if self.len == 1 {
            format!("eq(n\\,{})", self.first)
        } else if self.step == 1 {
            format!("between(n\\,{}\\,{})", self.first, self.last)
        } else {
            format!(
                "between(n\\,{first}\\,{last})*not(mod(n-{first}\\,{step}))",
                first = self.first,
                last = self.last,
                step = self.step,
            )
        }
    }
}

/// Greedily split ascending `indices` into maximal arithmetic progressions.
pub fn compress_progressions(indices: &[u64]) -> Vec<Progression> {
    let mut progressions: Vec<Progression> = Vec::new();

    for &index in indices {
        match progressions.last_mut() {
            Some(run) if run.len == 1 && index > run.last => {
                run.step = index - run.last;
                run.last = index;
                run.len = 2;
            }
            Some(run) if run.len > 1 && index.checked_sub(run.last) == Some(run.step) => {
                run.last = index;
                run.len += 1;
            }
            _ => progressions.push(Progression::single(index)),
        }
    }

    progressions
}

/// Split targets into batches of at most [`MAX_TERMS_PER_BATCH`] terms.
pub fn plan_batches(targets: &[FrameTarget]) -> Vec<&[FrameTarget]> {
    let indices: Vec<u64> = targets.iter().map(|target| target.frame_index).collect();
    let progressions = compress_progressions(&indices);

    let mut batches = Vec::new();
    let mut offset = 0;
    for chunk in progressions.chunks(MAX_TERMS_PER_BATCH) {
        let len: usize = chunk.iter().map(|progression| progression.len).sum();
        batches.push(&targets[offset..offset + len]);
        offset += len;
    }
    batches
}

/// The `select` filter for a batch of targets.
pub fn select_filter(targets: &[FrameTarget]) -> String {
    let indices: Vec<u64> = targets.iter().map(|target| target.frame_index).collect();
    let expression = compress_progressions(&indices)
        .iter()
        .map(Progression::to_expression)
        .collect::<Vec<_>>()
        .join("+");
    format!("select='{expression}'")
}

/// Fast path backed by the `ffmpeg` command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegCli {
    program: PathBuf,
}

impl Default for FfmpegCli {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegCli {
    /// Use `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific `ffmpeg` executable.
    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for one batch invocation.
    pub fn arguments(&self, request: &BatchRequest<'_>) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = ["-nostdin", "-hide_banner", "-loglevel", "error", "-n"]
            .into_iter()
            .map(OsString::from)
            .collect();

        arguments.push("-i".into());
        arguments.push(request.video_path.into());
        arguments.push("-vf".into());
        arguments.push(select_filter(request.targets).into());
        arguments.push("-fps_mode".into());
        arguments.push("vfr".into());
        arguments.push("-frames:v".into());
        arguments.push(request.targets.len().to_string().into());

        let quality: &[&str] = match (request.format, request.lossless) {
            (ImageFormat::Jpg, true) => &["-q:v", "1", "-pix_fmt", "yuvj420p"],
            (ImageFormat::Jpg, false) => &["-q:v", "2", "-pix_fmt", "yuvj420p"],
            (ImageFormat::Png, true) => &["-compression_level", "100"],
            (ImageFormat::Webp, _) => &["-lossless", "1"],
            (ImageFormat::Png, false) | (ImageFormat::Bmp, _) | (ImageFormat::Tiff, _) => &[],
        };
        arguments.extend(quality.iter().map(OsString::from));

        arguments.push(
            request
                .staging_dir
                .join(format!("%08d.{}", request.format.extension()))
                .into(),
        );
        arguments
    }

    fn unavailable(&self, reason: String) -> FramecutError {
        FramecutError::ExternalToolUnavailable {
            tool: self.program.display().to_string(),
            reason,
        }
    }
}

impl BatchFrameExtractor for FfmpegCli {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn probe(&self) -> Result<(), FramecutError> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|error| self.unavailable(error.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(self.unavailable(format!("`-version` exited with {status}")))
        }
    }

    fn extract_batch(&self, request: &BatchRequest<'_>) -> Result<Vec<PathBuf>, FramecutError> {
        let Some(first) = request.targets.first() else {
            return Ok(Vec::new());
        };

        let arguments = self.arguments(request);
        log::debug!("running {} {:?}", self.program.display(), arguments);

        let output = Command::new(&self.program)
            .args(&arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|error| match error.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    self.unavailable(error.to_string())
                }
                _ => FramecutError::FrameExtractionFailed {
                    frame_index: first.frame_index,
                    reason: format!("could not run ffmpeg: {error}"),
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail_start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
            let tail = stderr.get(tail_start..).unwrap_or(&*stderr).trim();
            return Err(FramecutError::FrameExtractionFailed {
                frame_index: first.frame_index,
                reason: format!("ffmpeg exited with {}: {tail}", output.status),
            });
        }

        staged_images(request.staging_dir, request.format)
    }
}

/// Images in `directory` with `format`'s extension, sorted by name.
pub fn staged_images(directory: &Path, format: ImageFormat) -> Result<Vec<PathBuf>, FramecutError> {
    let mut staged: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|extension| extension == format.extension())
        })
        .collect();
    staged.sort();
    Ok(staged)
}
