//! Source clips and the selection batch.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::geometry::FrameSize;

/// Number of clips stacked into one collage.
pub const CLIP_COUNT: usize = 3;

/// A video stream found in a media container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrackInfo {
    /// Stream index within the container.
    pub stream_index: usize,

    /// Codec name (e.g., "h264", "hevc").
    pub codec: String,

    /// Natural pixel size.
    pub size: FrameSize,

    /// Average frame rate.
    pub frame_rate: f64,

    /// Stream duration when the container reports one.
    pub duration_secs: Option<f64>,
}

/// Header-level description of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaHeader {
    /// Container duration in seconds (0.0 when unknown).
    pub duration_secs: f64,

    /// Video streams in container order.
    pub video_tracks: Vec<VideoTrackInfo>,

    /// Whether the container carries at least one audio stream.
    pub has_audio: bool,
}

impl MediaHeader {
    /// The track used for composition.
    pub fn first_video_track(&self) -> Option<&VideoTrackInfo> {
        self.video_tracks.first()
    }

    /// Duration to place on the timeline: the container duration, falling
    /// back to the video stream's own duration.
    pub fn playable_duration_secs(&self) -> Option<f64> {
        if self.duration_secs.is_finite() && self.duration_secs > 0.0 {
            return Some(self.duration_secs);
        }
        self.first_video_track()
            .and_then(|t| t.duration_secs)
            .filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// A reference to a readable media file.
///
/// The header is resolved lazily and at most once; after that the clip is
/// immutable.
#[derive(Debug, Clone)]
pub struct SourceClip {
    location: PathBuf,
    header: OnceLock<MediaHeader>,
}

impl SourceClip {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            header: OnceLock::new(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn is_loaded(&self) -> bool {
        self.header.get().is_some()
    }

    /// The resolved header, if any.
    pub fn header(&self) -> Option<&MediaHeader> {
        self.header.get()
    }

    /// Resolve the header with `load` on first access.
    ///
    /// A failed load leaves the clip unresolved so it can be retried by the
    /// caller.
    pub fn header_with<E>(
        &self,
        load: impl FnOnce(&Path) -> Result<MediaHeader, E>,
    ) -> Result<&MediaHeader, E> {
        if let Some(header) = self.header.get() {
            return Ok(header);
        }
        let header = load(&self.location)?;
        Ok(self.header.get_or_init(|| header))
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.header().and_then(MediaHeader::playable_duration_secs)
    }
}

/// Problems assembling a clip selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("expected {expected} clips, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("slot {slot} is out of range (batch has {slots} slots)")]
    SlotOutOfRange { slot: usize, slots: usize },

    #[error("slot {0} is already filled")]
    SlotFilled(usize),

    #[error("batch is full")]
    Full,

    #[error("{missing} clip(s) still missing")]
    Incomplete { missing: usize },
}

/// An immutable selection of exactly [`CLIP_COUNT`] clips, in band order.
#[derive(Debug, Clone)]
pub struct ClipBatch {
    clips: Vec<SourceClip>,
}

impl ClipBatch {
    pub fn new(clips: Vec<SourceClip>) -> Result<Self, BatchError> {
        if clips.len() != CLIP_COUNT {
            return Err(BatchError::WrongCount {
                expected: CLIP_COUNT,
                actual: clips.len(),
            });
        }
        Ok(Self { clips })
    }

    /// Batch of unresolved clips from file locations.
    pub fn from_paths<I, P>(paths: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(paths.into_iter().map(SourceClip::new).collect())
    }

    pub fn clips(&self) -> &[SourceClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceClip> {
        self.clips.iter()
    }

    pub fn locations(&self) -> Vec<&Path> {
        self.clips.iter().map(SourceClip::location).collect()
    }
}

/// Collects selection results as they arrive and hands out a
/// [`ClipBatch`] once every slot is filled.
#[derive(Debug, Clone)]
pub struct ClipBatchBuilder {
    slots: Vec<Option<PathBuf>>,
}

impl Default for ClipBatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipBatchBuilder {
    pub fn new() -> Self {
        Self {
            slots: vec![None; CLIP_COUNT],
        }
    }

    /// Place a result at its selection slot.
    pub fn fill(&mut self, slot: usize, location: impl Into<PathBuf>) -> Result<(), BatchError> {
        let slots = self.slots.len();
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(BatchError::SlotOutOfRange { slot, slots })?;
        if entry.is_some() {
            return Err(BatchError::SlotFilled(slot));
        }
        *entry = Some(location.into());
        Ok(())
    }

    /// Place a result in the first free slot and return that slot.
    pub fn push(&mut self, location: impl Into<PathBuf>) -> Result<usize, BatchError> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(BatchError::Full)?;
        self.slots[slot] = Some(location.into());
        Ok(slot)
    }

    pub fn remaining(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Freeze the selection.
    pub fn finish(self) -> Result<ClipBatch, BatchError> {
        let missing = self.remaining();
        if missing > 0 {
            return Err(BatchError::Incomplete { missing });
        }
        ClipBatch::from_paths(self.slots.into_iter().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(duration: f64, tracks: usize) -> MediaHeader {
        MediaHeader {
            duration_secs: duration,
            video_tracks: (0..tracks)
                .map(|i| VideoTrackInfo {
                    stream_index: i,
                    codec: "h264".into(),
                    size: FrameSize::LANDSCAPE_1080P,
                    frame_rate: 30.0,
                    duration_secs: Some(duration),
                })
                .collect(),
            has_audio: true,
        }
    }

    #[test]
    fn test_header_resolves_once() {
        let clip = SourceClip::new("a.mp4");
        let mut calls = 0;
        clip.header_with(|_| {
            calls += 1;
            Ok::<_, ()>(header(4.0, 1))
        })
        .unwrap();
        clip.header_with(|_| {
            calls += 1;
            Ok::<_, ()>(header(9.0, 1))
        })
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(clip.duration_secs(), Some(4.0));
    }

    #[test]
    fn test_cloned_batch_keeps_resolved_headers() {
        let batch = ClipBatch::from_paths(["a.mp4", "b.mp4", "c.mp4"]).unwrap();
        batch.clips()[0]
            .header_with(|_| Ok::<_, ()>(header(4.0, 1)))
            .unwrap();

        let copy = batch.clone();
        assert!(copy.clips()[0].is_loaded());
        assert!(!copy.clips()[1].is_loaded());
        assert_eq!(copy.clips()[0].duration_secs(), Some(4.0));
    }

    #[test]
    fn test_failed_load_leaves_clip_unresolved() {
        let clip = SourceClip::new("broken.mp4");
        let result = clip.header_with(|_| Err::<MediaHeader, _>("unreadable"));
        assert_eq!(result.unwrap_err(), "unreadable");
        assert!(!clip.is_loaded());
    }

    #[test]
    fn test_playable_duration_falls_back_to_stream() {
        let mut h = header(0.0, 1);
        h.video_tracks[0].duration_secs = Some(7.5);
        assert_eq!(h.playable_duration_secs(), Some(7.5));

        h.video_tracks[0].duration_secs = None;
        assert_eq!(h.playable_duration_secs(), None);
    }

    #[test]
    fn test_batch_requires_exact_count() {
        let err = ClipBatch::from_paths(["a.mp4", "b.mp4"]).unwrap_err();
        assert_eq!(
            err,
            BatchError::WrongCount {
                expected: 3,
                actual: 2
            }
        );
        assert!(ClipBatch::from_paths(["a.mp4", "b.mp4", "c.mp4"]).is_ok());
    }

    #[test]
    fn test_builder_orders_by_slot_not_arrival() {
        let mut builder = ClipBatchBuilder::new();
        builder.fill(2, "third.mp4").unwrap();
        builder.fill(0, "first.mp4").unwrap();
        assert_eq!(builder.remaining(), 1);
        assert_eq!(builder.push("second.mp4").unwrap(), 1);
        assert!(builder.is_complete());

        let batch = builder.finish().unwrap();
        let names: Vec<_> = batch
            .locations()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["first.mp4", "second.mp4", "third.mp4"]);
    }

    #[test]
    fn test_builder_rejects_bad_slots() {
        let mut builder = ClipBatchBuilder::new();
        builder.fill(1, "a.mp4").unwrap();
        assert_eq!(builder.fill(1, "b.mp4"), Err(BatchError::SlotFilled(1)));
        assert_eq!(
            builder.fill(3, "c.mp4"),
            Err(BatchError::SlotOutOfRange { slot: 3, slots: 3 })
        );
        assert_eq!(
            builder.clone().finish().unwrap_err(),
            BatchError::Incomplete { missing: 2 }
        );

        builder.push("b.mp4").unwrap();
        builder.push("c.mp4").unwrap();
        assert_eq!(builder.push("d.mp4"), Err(BatchError::Full));
    }
}
