use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tristack_common::error::CompositionError;
use tristack_composer::{InspectError, MediaInspector, TimelineComposer};
use tristack_timeline_model::{
    ClipBatch, FrameSize, LayoutConfig, MediaHeader, TrackId, VideoTrackInfo,
};

/// In-memory inspector keyed by file name.
#[derive(Default)]
struct FakeInspector {
    headers: HashMap<PathBuf, MediaHeader>,
    calls: AtomicUsize,
}

impl FakeInspector {
    fn with(mut self, name: &str, header: MediaHeader) -> Self {
        self.headers.insert(PathBuf::from(name), header);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MediaInspector for FakeInspector {
    fn inspect(&self, path: &Path) -> Result<MediaHeader, InspectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.headers
            .get(path)
            .cloned()
            .ok_or_else(|| InspectError::NotFound(path.to_path_buf()))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn video(duration: f64) -> MediaHeader {
    MediaHeader {
        duration_secs: duration,
        video_tracks: vec![VideoTrackInfo {
            stream_index: 0,
            codec: "h264".into(),
            size: FrameSize::LANDSCAPE_1080P,
            frame_rate: 30.0,
            duration_secs: Some(duration),
        }],
        has_audio: true,
    }
}

fn audio_only(duration: f64) -> MediaHeader {
    MediaHeader {
        duration_secs: duration,
        video_tracks: Vec::new(),
        has_audio: true,
    }
}

fn batch() -> ClipBatch {
    ClipBatch::from_paths(["a.mp4", "b.mp4", "c.mp4"]).unwrap()
}

#[test]
fn composes_three_layers_stacked_top_to_bottom() {
    let inspector = FakeInspector::default()
        .with("a.mp4", video(5.0))
        .with("b.mp4", video(5.0))
        .with("c.mp4", video(5.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());

    let spec = composer.compose(&batch()).unwrap();

    assert_eq!(spec.frame(), FrameSize::PORTRAIT_1080P);
    assert_eq!(spec.fps(), 30);
    assert_eq!(spec.timeline().len(), 3);
    assert_eq!(spec.layers().len(), 3);

    let offsets: Vec<f64> = spec.layers().iter().map(|l| l.transform.ty).collect();
    assert!(offsets.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(offsets, [0.0, 640.0, 1280.0]);

    for (i, layer) in spec.layers().iter().enumerate() {
        assert_eq!(layer.band_index, i);
        let track = spec.timeline().track(layer.track_id).unwrap();
        assert_eq!(track.clip_index, i);
    }
}

#[test]
fn legacy_layout_uses_original_offsets() {
    let inspector = FakeInspector::default()
        .with("a.mp4", video(3.0))
        .with("b.mp4", video(3.0))
        .with("c.mp4", video(3.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::legacy());

    let spec = composer.compose(&batch()).unwrap();
    let offsets: Vec<f64> = spec.layers().iter().map(|l| l.transform.ty).collect();
    assert_eq!(offsets, [0.0, 610.0, 1220.0]);

    let (sx, sy) = spec.layers()[0].transform.scale_factors();
    assert!((sx - 0.5625).abs() < 1e-12);
    assert!((sy - 720.0 / 1080.0).abs() < 1e-12);
}

#[test]
fn duration_is_the_longest_clip() {
    let inspector = FakeInspector::default()
        .with("a.mp4", video(10.0))
        .with("b.mp4", video(6.0))
        .with("c.mp4", video(8.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());

    let spec = composer.compose(&batch()).unwrap();

    assert!((spec.duration_secs() - 10.0).abs() < 1e-9);
    let shortest = spec.timeline().track(TrackId(2)).unwrap();
    assert!((shortest.source_range.duration_secs - 6.0).abs() < 1e-9);
    for layer in spec.layers() {
        assert!((layer.time_range.duration_secs - 10.0).abs() < 1e-9);
    }
}

#[test]
fn clip_without_video_reports_its_index() {
    let inspector = FakeInspector::default()
        .with("a.mp4", video(5.0))
        .with("b.mp4", audio_only(5.0))
        .with("c.mp4", video(5.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());

    let err = composer.compose(&batch()).unwrap_err();
    assert_eq!(err, CompositionError::NoVideoTrack { index: 1 });
}

#[test]
fn unreadable_clip_is_an_insertion_failure() {
    let inspector = FakeInspector::default()
        .with("a.mp4", video(5.0))
        .with("b.mp4", video(5.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());

    let err = composer.compose(&batch()).unwrap_err();
    assert!(matches!(
        err,
        CompositionError::InsertionFailed { index: 2, .. }
    ));
}

#[test]
fn zero_length_clip_is_an_insertion_failure() {
    let inspector = FakeInspector::default()
        .with("a.mp4", video(0.0))
        .with("b.mp4", video(5.0))
        .with("c.mp4", video(5.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());

    let err = composer.compose(&batch()).unwrap_err();
    assert!(matches!(
        err,
        CompositionError::InsertionFailed { index: 0, .. }
    ));
}

#[test]
fn invalid_layout_fails_before_inspection() {
    let inspector = FakeInspector::default();
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default().with_fps(0));

    let err = composer.compose(&batch()).unwrap_err();
    assert!(matches!(err, CompositionError::InvalidLayout { .. }));
    assert_eq!(inspector.calls(), 0);
}

#[test]
fn headers_are_inspected_once_per_clip() {
    let inspector = FakeInspector::default()
        .with("a.mp4", video(4.0))
        .with("b.mp4", video(4.0))
        .with("c.mp4", video(4.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());
    let batch = batch();

    composer.compose(&batch).unwrap();
    composer.compose(&batch).unwrap();

    assert_eq!(inspector.calls(), 3);
    assert!(batch.iter().all(|clip| clip.is_loaded()));
}

#[test]
fn mismatched_source_resolution_is_stretched_not_rejected() {
    let mut square = video(2.0);
    square.video_tracks[0].size = FrameSize::new(1080, 1080);
    let inspector = FakeInspector::default()
        .with("a.mp4", square)
        .with("b.mp4", video(2.0))
        .with("c.mp4", video(2.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());

    let spec = composer.compose(&batch()).unwrap();
    let track = spec.timeline().track(spec.layers()[0].track_id).unwrap();
    assert_eq!(track.natural_size, FrameSize::new(1080, 1080));
    assert_eq!(
        spec.layers()[0].transform.scale_factors(),
        spec.layers()[1].transform.scale_factors()
    );
}

#[test]
fn container_running_past_its_video_stream_is_accepted() {
    let mut padded = video(10.01);
    padded.duration_secs = 10.026;
    let inspector = FakeInspector::default()
        .with("a.mp4", padded)
        .with("b.mp4", video(5.0))
        .with("c.mp4", video(5.0));
    let composer = TimelineComposer::new(&inspector, LayoutConfig::default());

    let spec = composer.compose(&batch()).unwrap();
    let track = spec.timeline().track_for_clip(0).unwrap();
    assert!((track.source_range.duration_secs - 10.01).abs() < 1e-9);
}
