//! Progress and cancellation integration tests.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use framecut::{
    BatchFrameExtractor, BatchRequest, CancellationToken, ExtractOptions, ExtractionSpec,
    ExtractionStage, FrameExtractor, FrameSource, FramecutError, ImageFormat, IntervalMode,
    ProgressCallback, ProgressInfo, VideoMetadata,
};
use image::{DynamicImage, RgbImage};

struct NoBatch;

impl BatchFrameExtractor for NoBatch {
    fn name(&self) -> &str {
        "none"
    }

    fn probe(&self) -> Result<(), FramecutError> {
        Err(FramecutError::ExternalToolUnavailable {
            tool: "none".to_string(),
            reason: "disabled in tests".to_string(),
        })
    }

    fn extract_batch(&self, _request: &BatchRequest<'_>) -> Result<Vec<PathBuf>, FramecutError> {
        unreachable!("probe always fails")
    }
}

/// Batch tool that stages one blank image per target.
struct BlankBatch;

impl BatchFrameExtractor for BlankBatch {
    fn name(&self) -> &str {
        "blank"
    }

    fn probe(&self) -> Result<(), FramecutError> {
        Ok(())
    }

    fn extract_batch(&self, request: &BatchRequest<'_>) -> Result<Vec<PathBuf>, FramecutError> {
        (1..=request.targets.len())
            .map(|position| -> Result<PathBuf, FramecutError> {
                let path = request
                    .staging_dir
                    .join(format!("{position:08}.{}", request.format.extension()));
                RgbImage::new(4, 4).save(&path)?;
                Ok(path)
            })
            .collect()
    }
}

struct BlankSource(u64);

impl FrameSource for BlankSource {
    type Frame = ();
    type Frames = std::vec::IntoIter<Result<(), FramecutError>>;

    fn open(&self) -> Result<Self::Frames, FramecutError> {
        Ok((0..self.0).map(|_| Ok(())).collect::<Vec<_>>().into_iter())
    }

    fn render(&self, _frame: &()) -> Result<DynamicImage, FramecutError> {
        Ok(DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
    }
}

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

fn extract_with(options: &ExtractOptions) -> framecut::ExtractionReport {
    let dir = tempfile::tempdir().unwrap();
    let spec = ExtractionSpec::builder(dir.path().join("frames"))
        .interval(IntervalMode::frames(2).unwrap())
        .image_format(ImageFormat::Bmp)
        .build()
        .unwrap();
    let extractor = FrameExtractor::new(
        "video.mp4",
        VideoMetadata::new(20, 10.0).unwrap(),
        NoBatch,
        BlankSource(20),
    );
    extractor.run(&spec, options).unwrap()
}

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    assert!(!CancellationToken::new().is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    token.cancel();
    assert!(clone.is_cancelled());
}

// ── ProgressInfo ───────────────────────────────────────────────────

#[test]
fn progress_reported_for_every_frame() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let report = extract_with(&ExtractOptions::new().with_progress(recorder.clone()));
    assert_eq!(report.written.len(), 10);

    let infos = recorder.infos.lock().unwrap();
    // One update per frame plus the final one.
    assert_eq!(infos.len(), 11);
    assert!(infos.iter().all(|info| info.stage == ExtractionStage::Fallback));
    assert!(infos.iter().all(|info| info.total == Some(10)));
    for window in infos.windows(2) {
        assert!(window[1].current >= window[0].current);
    }
    let last = infos.last().unwrap();
    assert_eq!(last.current, 10);
    assert_eq!(last.percentage, Some(100.0));
}

#[test]
fn progress_batch_size_reduces_callbacks() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    extract_with(
        &ExtractOptions::new()
            .with_progress(recorder.clone())
            .with_batch_size(5),
    );

    let infos = recorder.infos.lock().unwrap();
    let currents: Vec<u64> = infos.iter().map(|info| info.current).collect();
    assert_eq!(currents, vec![5, 10, 10]);
}

#[test]
fn progress_current_frame_tracks_source_index() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    extract_with(&ExtractOptions::new().with_progress(recorder.clone()));

    let infos = recorder.infos.lock().unwrap();
    assert_eq!(infos[0].current_frame, Some(0));
    assert_eq!(infos[1].current_frame, Some(2));
}

#[test]
fn fast_path_reports_before_the_batch_runs() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let dir = tempfile::tempdir().unwrap();
    let spec = ExtractionSpec::builder(dir.path().join("frames"))
        .interval(IntervalMode::frames(2).unwrap())
        .image_format(ImageFormat::Bmp)
        .build()
        .unwrap();
    let extractor = FrameExtractor::new(
        "video.mp4",
        VideoMetadata::new(20, 10.0).unwrap(),
        BlankBatch,
        BlankSource(20),
    );

    let report = extractor
        .run(&spec, &ExtractOptions::new().with_progress(recorder.clone()))
        .unwrap();
    assert!(report.fast_path_used);
    assert_eq!(report.written.len(), 10);

    let infos = recorder.infos.lock().unwrap();
    let first = &infos[0];
    assert_eq!(first.stage, ExtractionStage::FastPath);
    assert_eq!(first.current, 0);
    assert_eq!(first.total, Some(10));
    assert_eq!(first.current_frame, None);
    assert_eq!(infos.last().unwrap().current, 10);
}
