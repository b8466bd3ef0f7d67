//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::path::Path;

use framecut::{FramecutError, FrameExtractor, VideoMetadata};

#[test]
fn open_nonexistent_file() {
    let result = VideoMetadata::read("this_file_does_not_exist.mp4");

    match result {
        Err(FramecutError::VideoUnreadable { path, .. }) => {
            assert_eq!(path, Path::new("this_file_does_not_exist.mp4"));
        }
        other => panic!("Expected VideoUnreadable, got: {other:?}"),
    }
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FrameExtractor::open(&invalid_file_path);
    assert!(matches!(result, Err(FramecutError::VideoUnreadable { .. })));
}

#[test]
fn unsupported_container_is_rejected_before_opening() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let webm = temporary_directory.path().join("clip.webm");
    std::fs::write(&webm, b"").expect("Failed to write file");

    let error = VideoMetadata::read(&webm).unwrap_err();
    let error_message = error.to_string();
    assert!(
        error_message.contains("unsupported container"),
        "Error message should mention the container: {error_message}",
    );
}

#[test]
fn zero_frame_rate_is_invalid_metadata() {
    assert!(matches!(
        VideoMetadata::new(100, 0.0),
        Err(FramecutError::InvalidMetadata(_))
    ));
    assert!(matches!(
        VideoMetadata::new(100, f64::NAN),
        Err(FramecutError::InvalidMetadata(_))
    ));
}

#[test]
fn per_frame_errors_are_classified() {
    let write = FramecutError::WriteError {
        path: "frame_0001.jpg".into(),
        reason: "disk full".to_string(),
    };
    let extract = FramecutError::FrameExtractionFailed {
        frame_index: 7,
        reason: "corrupt".to_string(),
    };
    let spec = FramecutError::InvalidSpec("bad".to_string());

    assert!(write.is_per_frame());
    assert!(extract.is_per_frame());
    assert!(!spec.is_per_frame());
    assert_eq!(extract.to_string(), "Failed to extract frame 7: corrupt");
}
