//! Frame selection properties.

use framecut::{
    ExtractionSpec, FrameWindow, IntervalMode, VideoMetadata, interval_label, plan_targets,
    select_frames, selection_label,
};

fn metadata(frame_count: u64, fps: f64) -> VideoMetadata {
    VideoMetadata::new(frame_count, fps).expect("valid metadata")
}

fn spec() -> framecut::ExtractionSpecBuilder {
    ExtractionSpec::builder("frames")
}

// ── Intervals ──────────────────────────────────────────────────────

#[test]
fn every_tenth_frame_of_ten_seconds() {
    let spec = spec().interval(IntervalMode::frames(10).unwrap()).build().unwrap();
    let frames = select_frames(&metadata(300, 30.0), &spec);

    assert_eq!(frames.len(), 30);
    assert_eq!(frames.first(), Some(&0));
    assert_eq!(frames.last(), Some(&290));
    assert!(frames.windows(2).all(|pair| pair[1] - pair[0] == 10));
}

#[test]
fn default_interval_selects_every_frame() {
    let spec = spec().build().unwrap();
    let frames = select_frames(&metadata(48, 24.0), &spec);
    assert_eq!(frames, (0..48).collect::<Vec<_>>());
}

#[test]
fn seconds_interval_inside_window() {
    let spec = spec()
        .start_time(10.0)
        .end_time(20.0)
        .interval(IntervalMode::seconds(2.0).unwrap())
        .build()
        .unwrap();
    let frames = select_frames(&metadata(1000, 25.0), &spec);
    assert_eq!(frames, vec![250, 300, 350, 400, 450]);
}

#[test]
fn fractional_frame_rate_rounds_step() {
    let spec = spec()
        .interval(IntervalMode::seconds(1.0).unwrap())
        .build()
        .unwrap();
    let frames = select_frames(&metadata(120, 29.97), &spec);
    assert_eq!(frames, vec![0, 30, 60, 90]);
}

#[test]
fn tiny_seconds_interval_falls_back_to_every_frame() {
    let spec = spec()
        .interval(IntervalMode::seconds(0.001).unwrap())
        .build()
        .unwrap();
    assert_eq!(select_frames(&metadata(10, 25.0), &spec).len(), 10);
}

// ── Windows ────────────────────────────────────────────────────────

#[test]
fn degenerate_window_is_empty() {
    let spec = spec().start_time(5.0).end_time(5.0).build().unwrap();
    assert!(select_frames(&metadata(300, 30.0), &spec).is_empty());

    let window = FrameWindow::from_times(&metadata(300, 30.0), Some(8.0), Some(3.0));
    assert!(window.is_empty());
}

#[test]
fn window_past_end_of_video_is_empty() {
    let spec = spec().start_time(60.0).build().unwrap();
    assert!(select_frames(&metadata(300, 30.0), &spec).is_empty());
}

#[test]
fn end_time_is_clamped_to_video_length() {
    let spec = spec()
        .end_time(1_000.0)
        .interval(IntervalMode::frames(100).unwrap())
        .build()
        .unwrap();
    assert_eq!(select_frames(&metadata(300, 30.0), &spec), vec![0, 100, 200]);
}

#[test]
fn frame_bounds_are_half_open() {
    let spec = spec()
        .start_frame(10)
        .end_frame(40)
        .interval(IntervalMode::frames(10).unwrap())
        .build()
        .unwrap();
    assert_eq!(select_frames(&metadata(300, 30.0), &spec), vec![10, 20, 30]);
}

#[test]
fn time_bounds_override_frame_bounds() {
    let spec = spec()
        .start_frame(0)
        .start_time(2.0)
        .end_frame(300)
        .end_time(3.0)
        .interval(IntervalMode::frames(15).unwrap())
        .build()
        .unwrap();
    assert_eq!(select_frames(&metadata(300, 30.0), &spec), vec![60, 75]);
}

#[test]
fn selection_is_deterministic() {
    let spec = spec()
        .start_time(1.3)
        .end_time(7.7)
        .interval(IntervalMode::seconds(0.4).unwrap())
        .build()
        .unwrap();
    let meta = metadata(500, 23.976);
    assert_eq!(select_frames(&meta, &spec), select_frames(&meta, &spec));
}

// ── Targets and labels ─────────────────────────────────────────────

#[test]
fn targets_are_numbered_without_gaps() {
    let meta = metadata(300, 30.0);
    let spec = spec().interval(IntervalMode::frames(7).unwrap()).build().unwrap();
    let targets = plan_targets(&meta, &select_frames(&meta, &spec));

    for (position, target) in targets.iter().enumerate() {
        assert_eq!(target.sequence_number, position as u64 + 1);
        assert_eq!(target.frame_index, position as u64 * 7);
    }
}

#[test]
fn labels_describe_the_interval() {
    assert_eq!(selection_label(&spec().build().unwrap()), "every_frame");
    assert_eq!(
        interval_label(IntervalMode::frames(5).unwrap()),
        "5_frames_interval"
    );
    assert_eq!(interval_label(IntervalMode::seconds(2.5).unwrap()), "2.5s_interval");
}
