//! Extraction orchestration.
//!
//! [`FrameExtractor`] ties the pieces together for one video: it selects the
//! frames, skips those already on disk, tries the batch fast path, and hands
//! whatever is left to the sequential fallback. Per-frame failures never stop
//! a run; they are collected in the [`ExtractionReport`].
//!
//! # Example
//!
//! ```no_run
//! use framecut::{ExtractOptions, ExtractionSpec, FrameExtractor, IntervalMode};
//!
//! let extractor = FrameExtractor::open("input.mp4")?;
//! let spec = ExtractionSpec::builder("frames")
//!     .interval(IntervalMode::seconds(1.0)?)
//!     .build()?;
//!
//! let report = extractor.run(&spec, &ExtractOptions::new())?;
//! println!("wrote {} frames", report.written.len());
//! # Ok::<(), framecut::FramecutError>(())
//! ```

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crate::{
    batch::{BatchFrameExtractor, BatchRequest, FfmpegCli, plan_batches},
    config::{ExtractOptions, ExtractionSpec},
    error::FramecutError,
    metadata::VideoMetadata,
    output::{OutputFile, OutputLayout, OutputWriter},
    progress::{ExtractionStage, ProgressTracker},
    scanner::OutputScanner,
    selection::{FrameTarget, plan_targets, select_frames},
    sequential::{FfmpegSource, FrameSource},
};

/// A target that could not be extracted.
#[derive(Debug)]
pub struct FrameFailure {
    /// Index of the source frame.
    pub frame_index: u64,
    /// Sequence number the frame would have been written under.
    pub sequence_number: u64,
    /// What went wrong.
    pub error: FramecutError,
}

/// Outcome of [`FrameExtractor::run`].
#[derive(Debug)]
pub struct ExtractionReport {
    /// Directory the frames were written into.
    pub output_dir: PathBuf,
    /// Number of frames selected.
    pub selected: usize,
    /// Selected frames that were already on disk and left alone.
    pub skipped_existing: usize,
    /// Files written in this run, ordered by sequence number.
    pub written: Vec<OutputFile>,
    /// Frames that failed, ordered by sequence number.
    pub failures: Vec<FrameFailure>,
    /// Frame indices left untouched because the run was cancelled.
    pub cancelled: Vec<u64>,
    /// Whether the batch extractor was used for at least one batch.
    pub fast_path_used: bool,
    /// Whether the sequential decoder was used.
    pub fallback_used: bool,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl ExtractionReport {
    fn new(output_dir: PathBuf, selected: usize) -> Self {
        Self {
            output_dir,
            selected,
            skipped_existing: 0,
            written: Vec::new(),
            failures: Vec::new(),
            cancelled: Vec::new(),
            fast_path_used: false,
            fallback_used: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the run counts as a success.
    ///
    /// True when at least one frame was written, or when nothing needed
    /// writing in the first place.
    pub fn exit_ok(&self) -> bool {
        !self.written.is_empty() || (self.failures.is_empty() && self.cancelled.is_empty())
    }

    /// Whether every selected frame is now on disk.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_empty()
    }

    /// Source indices of the failed frames.
    pub fn failed_indices(&self) -> Vec<u64> {
        self.failures.iter().map(|failure| failure.frame_index).collect()
    }
}

/// Extracts frames from one video.
///
/// `B` is the fast path and `S` the fallback. [`FrameExtractor::open`] wires
/// up the FFmpeg-backed implementations of both.
pub struct FrameExtractor<B, S> {
    video_path: PathBuf,
    metadata: VideoMetadata,
    batch: B,
    source: S,
}

impl FrameExtractor<FfmpegCli, FfmpegSource> {
    /// Read the metadata of `path` and prepare to extract from it with
    /// `ffmpeg` on `PATH` and the in-process decoder.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::VideoUnreadable`] if the metadata cannot be
    /// read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramecutError> {
        let path = path.as_ref();
        let metadata = VideoMetadata::read(path)?;
        Ok(Self::new(path, metadata, FfmpegCli::new(), FfmpegSource::new(path)))
    }
}

impl<B: BatchFrameExtractor, S: FrameSource> FrameExtractor<B, S> {
    /// Assemble an extractor from its parts.
    pub fn new<P: Into<PathBuf>>(video_path: P, metadata: VideoMetadata, batch: B, source: S) -> Self {
        Self {
            video_path: video_path.into(),
            metadata,
            batch,
            source,
        }
    }

    /// Metadata of the video.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path of the video.
    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    /// The fast-path extractor.
    pub fn batch(&self) -> &B {
        &self.batch
    }

    /// The fallback decoder.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Extract the frames described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`FramecutError::WriteError`] if the output directory cannot
    /// be created or the very first write fails. Every other per-frame
    /// problem ends up in [`ExtractionReport::failures`].
    pub fn run(
        &self,
        spec: &ExtractionSpec,
        options: &ExtractOptions,
    ) -> Result<ExtractionReport, FramecutError> {
        let started = Instant::now();
        let selected = select_frames(&self.metadata, spec);
        let targets = plan_targets(&self.metadata, &selected);
        let layout = OutputLayout::resolve(spec);
        let mut report = ExtractionReport::new(layout.directory().to_path_buf(), targets.len());

        if targets.is_empty() {
            log::warn!("the requested window selects no frames");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        let pending = if spec.overwrite() {
            targets
        } else {
            let scan = OutputScanner::new(&layout).filter(&targets);
            report.skipped_existing = scan.existing.len();
            scan.pending
        };

        if pending.is_empty() {
            log::info!("all {} selected frames already extracted", report.selected);
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        layout.ensure_directory()?;
        log::info!(
            "extracting {} of {} frames from {} into {}",
            pending.len(),
            report.selected,
            self.video_path.display(),
            layout.directory().display()
        );

        let mut run = Run {
            writer: OutputWriter::new(layout, spec.lossless(), spec.overwrite()),
            tracker: ProgressTracker::new(
                options.progress.clone(),
                Some(pending.len() as u64),
                options.batch_size,
            ),
            options,
            report,
            attempts: 0,
            cancelled: false,
        };

        let leftovers = if options.use_fast_path {
            self.fast_path(&mut run, &pending)?
        } else {
            pending
        };
        self.fallback(&mut run, &leftovers)?;

        let stage = if run.report.fallback_used {
            ExtractionStage::Fallback
        } else {
            ExtractionStage::FastPath
        };
        run.tracker.finish(stage);

        let mut report = run.report;
        report.written.sort_by_key(|file| file.sequence_number);
        report.failures.sort_by_key(|failure| failure.sequence_number);
        report.cancelled.sort_unstable();
        report.elapsed = started.elapsed();

        log::info!(
            "wrote {} frame(s), {} failed, {} cancelled, {} already present ({:.2?})",
            report.written.len(),
            report.failures.len(),
            report.cancelled.len(),
            report.skipped_existing,
            report.elapsed
        );
        Ok(report)
    }

    /// Run every batch through the fast path and return the targets it did
    /// not produce.
    fn fast_path(
        &self,
        run: &mut Run<'_>,
        pending: &[FrameTarget],
    ) -> Result<Vec<FrameTarget>, FramecutError> {
        if let Err(error) = self.batch.probe() {
            log::info!("{error}; decoding in-process instead");
            return Ok(pending.to_vec());
        }

        let mut leftovers = Vec::new();
        let batches = plan_batches(pending);
        log::debug!("{} batch(es) for {}", batches.len(), self.batch.name());

        for (position, batch) in batches.iter().enumerate() {
            if run.check_cancelled() {
                for rest in &batches[position..] {
                    run.cancel(rest);
                }
                break;
            }

            let staging = match tempfile::Builder::new()
                .prefix(".framecut-staging-")
                .tempdir_in(run.writer.layout().directory())
            {
                Ok(staging) => staging,
                Err(error) => {
                    log::warn!("could not create staging directory: {error}");
                    leftovers.extend_from_slice(batch);
                    continue;
                }
            };

            let request = BatchRequest {
                video_path: &self.video_path,
                targets: batch,
                format: run.writer.layout().format(),
                lossless: run.writer.lossless(),
                staging_dir: staging.path(),
            };
            run.report.fast_path_used = true;
            // Nothing is committed until the tool exits.
            run.tracker.announce(ExtractionStage::FastPath);

            match self.batch.extract_batch(&request) {
                Ok(staged) if staged.len() == batch.len() => {
                    for (path, target) in staged.iter().zip(batch.iter()) {
                        let outcome = run.writer.commit_staged(path, target);
                        run.record(ExtractionStage::FastPath, target, outcome)?;
                    }
                }
                Ok(staged) => {
                    log::warn!(
                        "{} produced {} of {} frames; retrying the batch in-process",
                        self.batch.name(),
                        staged.len(),
                        batch.len()
                    );
                    leftovers.extend_from_slice(batch);
                }
                Err(error) => {
                    log::warn!("{error}; retrying the batch in-process");
                    leftovers.extend_from_slice(batch);
                }
            }
        }

        Ok(leftovers)
    }

    /// Decode the video from the start and write every target in `targets`.
    fn fallback(&self, run: &mut Run<'_>, targets: &[FrameTarget]) -> Result<(), FramecutError> {
        let Some(last) = targets.last().map(|target| target.frame_index) else {
            return Ok(());
        };
        if run.check_cancelled() {
            run.cancel(targets);
            return Ok(());
        }

        run.report.fallback_used = true;
        let frames = match self.source.open() {
            Ok(frames) => frames,
            Err(error) => {
                log::warn!("in-process decoding unavailable: {error}");
                let reason = error.to_string();
                for target in targets {
                    run.record(
                        ExtractionStage::Fallback,
                        target,
                        Err(extraction_failed(target, &reason)),
                    )?;
                }
                return Ok(());
            }
        };

        let slot_of = |index: u64| {
            targets
                .binary_search_by_key(&index, |target| target.frame_index)
                .ok()
        };
        let decoded = frames
            .enumerate()
            .map(|(position, frame)| (position as u64, frame))
            .take_while(|(index, _)| *index <= last)
            .filter(|(index, frame)| frame.is_err() || slot_of(*index).is_some());

        let mut next_slot = 0;
        let mut stream_error = None;
        for (index, frame) in decoded {
            let frame = match frame {
                Ok(frame) => frame,
                Err(error) => {
                    stream_error = Some(error.to_string());
                    break;
                }
            };
            let Some(slot) = slot_of(index) else {
                continue;
            };
            if run.check_cancelled() {
                run.cancel(&targets[slot..]);
                return Ok(());
            }

            let target = &targets[slot];
            let outcome = self
                .source
                .render(&frame)
                .map_err(|error| as_frame_error(target, error))
                .and_then(|image| run.writer.write(&image, target));
            run.record(ExtractionStage::Fallback, target, outcome)?;
            next_slot = slot + 1;
        }

        let reason = stream_error
            .unwrap_or_else(|| "video ended before this frame was decoded".to_string());
        for target in &targets[next_slot..] {
            run.record(
                ExtractionStage::Fallback,
                target,
                Err(extraction_failed(target, &reason)),
            )?;
        }
        Ok(())
    }
}

/// Mutable state of one [`FrameExtractor::run`] call.
struct Run<'a> {
    writer: OutputWriter,
    tracker: ProgressTracker,
    options: &'a ExtractOptions,
    report: ExtractionReport,
    attempts: u64,
    cancelled: bool,
}

impl Run<'_> {
    /// Book the outcome of one target.
    ///
    /// A [`FramecutError::WriteError`] on the very first attempt is returned
    /// instead of recorded: the directory is unusable.
    fn record(
        &mut self,
        stage: ExtractionStage,
        target: &FrameTarget,
        outcome: Result<OutputFile, FramecutError>,
    ) -> Result<(), FramecutError> {
        let first_attempt = self.attempts == 0;
        self.attempts += 1;

        match outcome {
            Ok(file) => self.report.written.push(file),
            Err(error @ FramecutError::WriteError { .. }) if first_attempt => return Err(error),
            Err(error) => {
                log::warn!("{error}");
                self.report.failures.push(FrameFailure {
                    frame_index: target.frame_index,
                    sequence_number: target.sequence_number,
                    error,
                });
            }
        }

        self.tracker.advance(stage, target.frame_index);
        Ok(())
    }

    fn check_cancelled(&mut self) -> bool {
        if !self.cancelled && self.options.is_cancelled() {
            log::warn!("cancelled, stopping before the next frame");
            self.cancelled = true;
        }
        self.cancelled
    }

    fn cancel(&mut self, targets: &[FrameTarget]) {
        self.report
            .cancelled
            .extend(targets.iter().map(|target| target.frame_index));
    }
}

fn extraction_failed(target: &FrameTarget, reason: &str) -> FramecutError {
    FramecutError::FrameExtractionFailed {
        frame_index: target.frame_index,
        reason: reason.to_string(),
    }
}

fn as_frame_error(target: &FrameTarget, error: FramecutError) -> FramecutError {
    if error.is_per_frame() {
        error
    } else {
        extraction_failed(target, &error.to_string())
    }
}
