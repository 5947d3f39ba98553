//! Composition timeline.
//!
//! A timeline holds one video track per source clip. Every track is
//! inserted at time zero, so the timeline is as long as its longest track
//! and shorter tracks simply end early.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::clip::VideoTrackInfo;
use crate::geometry::FrameSize;

/// A half-open time range `[start, start + duration)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl TimeRange {
    pub fn new(start_secs: f64, duration_secs: f64) -> Self {
        Self {
            start_secs,
            duration_secs,
        }
    }

    /// Range starting at zero.
    pub fn from_zero(duration_secs: f64) -> Self {
        Self::new(0.0, duration_secs)
    }

    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t < self.end_secs()
    }

    /// Finite, non-negative start and strictly positive duration.
    pub fn is_valid(&self) -> bool {
        self.start_secs.is_finite()
            && self.duration_secs.is_finite()
            && self.start_secs >= 0.0
            && self.duration_secs > 0.0
    }
}

/// Identifier of a track within one timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// One video track of the output timeline, copied from exactly one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionTrack {
    pub id: TrackId,

    /// Position of the source clip in the selection batch.
    pub clip_index: usize,

    /// Source media file.
    pub source: PathBuf,

    /// Stream index of the source video track inside its container.
    pub source_stream_index: usize,

    /// Natural size of the source video track.
    pub natural_size: FrameSize,

    /// Range taken from the source. Placed on the timeline at time zero.
    pub source_range: TimeRange,
}

impl CompositionTrack {
    /// Range this track occupies on the timeline.
    pub fn timeline_range(&self) -> TimeRange {
        TimeRange::from_zero(self.source_range.duration_secs)
    }
}

/// Reasons a track could not be inserted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("invalid time range [{start}, +{duration})")]
    InvalidRange { start: f64, duration: f64 },

    #[error("range ends at {end:.3}s but the source track lasts {available:.3}s")]
    RangeExceedsSource { end: f64, available: f64 },

    #[error("clip {0} already has a track on this timeline")]
    DuplicateClip(usize),
}

/// Tolerance for container vs. stream duration rounding.
const DURATION_EPSILON_SECS: f64 = 1e-3;

/// Ordered collection of composition tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    tracks: Vec<CompositionTrack>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `range` of `video` (from clip `clip_index`) as a new track at
    /// time zero.
    pub fn insert_track(
        &mut self,
        clip_index: usize,
        source: impl Into<PathBuf>,
        video: &VideoTrackInfo,
        range: TimeRange,
    ) -> Result<&CompositionTrack, TimelineError> {
        if !range.is_valid() {
            return Err(TimelineError::InvalidRange {
                start: range.start_secs,
                duration: range.duration_secs,
            });
        }

        if let Some(available) = video.duration_secs.filter(|d| *d > 0.0) {
            if range.end_secs() > available + DURATION_EPSILON_SECS {
                return Err(TimelineError::RangeExceedsSource {
                    end: range.end_secs(),
                    available,
                });
            }
        }

        if self.track_for_clip(clip_index).is_some() {
            return Err(TimelineError::DuplicateClip(clip_index));
        }

        let id = TrackId(self.tracks.len() as u32 + 1);
        self.tracks.push(CompositionTrack {
            id,
            clip_index,
            source: source.into(),
            source_stream_index: video.stream_index,
            natural_size: video.size,
            source_range: range,
        });

        Ok(&self.tracks[self.tracks.len() - 1])
    }

    pub fn tracks(&self) -> &[CompositionTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, id: TrackId) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_for_clip(&self, clip_index: usize) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.clip_index == clip_index)
    }

    /// Overall duration: the latest end of any track.
    pub fn duration_secs(&self) -> f64 {
        self.tracks
            .iter()
            .map(|t| t.timeline_range().end_secs())
            .fold(0.0, f64::max)
    }

    /// Range covering the whole timeline.
    pub fn full_range(&self) -> TimeRange {
        TimeRange::from_zero(self.duration_secs())
    }
}
