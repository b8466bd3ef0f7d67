//! Existing-output detection tests.

use std::fs;

use framecut::{
    ExtractionSpec, ImageFormat, IntervalMode, OutputLayout, OutputScanner, VideoMetadata,
    plan_targets, select_frames,
};

fn targets(count: u64) -> Vec<framecut::FrameTarget> {
    let metadata = VideoMetadata::new(count, 10.0).unwrap();
    let spec = ExtractionSpec::builder("unused")
        .interval(IntervalMode::frames(1).unwrap())
        .build()
        .unwrap();
    plan_targets(&metadata, &select_frames(&metadata, &spec))
}

#[test]
fn missing_directory_means_nothing_extracted() {
    let dir = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(dir.path().join("absent"), ImageFormat::Jpg);

    let scan = OutputScanner::new(&layout).filter(&targets(5));

    assert_eq!(scan.pending.len(), 5);
    assert!(scan.existing.is_empty());
}

#[test]
fn present_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(dir.path(), ImageFormat::Png);
    fs::write(layout.path(2), b"x").unwrap();
    fs::write(layout.path(4), b"x").unwrap();

    let scan = OutputScanner::new(&layout).filter(&targets(5));

    let pending: Vec<u64> = scan.pending.iter().map(|t| t.sequence_number).collect();
    let existing: Vec<u64> = scan.existing.iter().map(|t| t.sequence_number).collect();
    assert_eq!(pending, vec![1, 3, 5]);
    assert_eq!(existing, vec![2, 4]);
}

#[test]
fn other_formats_and_temporaries_do_not_count() {
    let dir = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(dir.path(), ImageFormat::Png);
    fs::write(dir.path().join("frame_0001.jpg"), b"x").unwrap();
    fs::write(dir.path().join(".framecut-abc123.part"), b"x").unwrap();
    fs::create_dir(dir.path().join("frame_0002.png")).unwrap();

    let scan = OutputScanner::new(&layout).filter(&targets(3));

    assert_eq!(scan.pending.len(), 3);
}

#[test]
fn stray_numbered_files_are_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(dir.path(), ImageFormat::Png);
    fs::write(layout.path(1), b"x").unwrap();
    fs::write(layout.path(99), b"x").unwrap();

    let scanner = OutputScanner::new(&layout);
    let scan = scanner.filter(&targets(3));

    assert_eq!(scan.existing.len(), 1);
    assert_eq!(scan.pending.len(), 2);
    assert!(scanner.is_extracted(&scan.existing[0]));
}
