//! Stacked timeline composition.

use tristack_common::config::LayoutDefaults;
use tristack_common::error::CompositionError;
use tristack_timeline_model::{
    ClipBatch, CompositionInstruction, FrameSize, LayerInstruction, LayoutConfig, RenderSpec,
    TimeRange, Timeline, CLIP_COUNT,
};

use crate::inspect::MediaInspector;

/// Builds a [`RenderSpec`] from a clip batch.
///
/// Band `i` holds clip `i`. The whole operation fails on the first clip
/// that cannot be used; nothing partial is returned.
pub struct TimelineComposer<'a> {
    inspector: &'a dyn MediaInspector,
    layout: LayoutConfig,
}

impl<'a> TimelineComposer<'a> {
    pub fn new(inspector: &'a dyn MediaInspector, layout: LayoutConfig) -> Self {
        Self { inspector, layout }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn compose(&self, batch: &ClipBatch) -> Result<RenderSpec, CompositionError> {
        self.layout
            .validate(batch.len())
            .map_err(|e| CompositionError::InvalidLayout {
                reason: e.to_string(),
            })?;

        if self.layout.bands_overlap(batch.len()) {
            tracing::warn!(
                band_height = self.layout.band_size.height,
                band_stride = self.layout.band_stride,
                "Layout bands overlap; lower bands are covered by the band above"
            );
        }

        let mut timeline = Timeline::new();
        let mut bands = Vec::with_capacity(batch.len());

        for (index, clip) in batch.iter().enumerate() {
            let header = clip
                .header_with(|path| self.inspector.inspect(path))
                .map_err(|e| CompositionError::InsertionFailed {
                    index,
                    reason: e.to_string(),
                })?;

            let video = header
                .first_video_track()
                .ok_or(CompositionError::NoVideoTrack { index })?;

            let container = header.playable_duration_secs().ok_or_else(|| {
                CompositionError::InsertionFailed {
                    index,
                    reason: "clip has no playable duration".to_string(),
                }
            })?;
            // Containers often run a few ms past their video stream.
            let duration = video
                .duration_secs
                .filter(|d| d.is_finite() && *d > 0.0)
                .map_or(container, |stream| container.min(stream));

            if video.size != self.layout.reference_source {
                tracing::debug!(
                    clip = index,
                    natural = %video.size,
                    reference = %self.layout.reference_source,
                    "Clip resolution differs from reference; band will be stretched"
                );
            }

            let track_id = timeline
                .insert_track(
                    index,
                    clip.location(),
                    video,
                    TimeRange::from_zero(duration),
                )
                .map_err(|e| CompositionError::InsertionFailed {
                    index,
                    reason: e.to_string(),
                })?
                .id;

            bands.push((track_id, index));
        }

        let full_range = timeline.full_range();
        let layers = bands
            .into_iter()
            .map(|(track_id, band_index)| LayerInstruction {
                track_id,
                band_index,
                transform: self.layout.band_transform(band_index),
                time_range: full_range,
            })
            .collect();

        let instruction = CompositionInstruction {
            time_range: full_range,
            layers,
        };

        let spec = RenderSpec::new(self.layout.frame, self.layout.fps, timeline, instruction)
            .map_err(|e| CompositionError::InvalidLayout {
                reason: e.to_string(),
            })?;

        tracing::info!(
            clips = batch.len(),
            duration_secs = spec.duration_secs(),
            frame = %spec.frame(),
            fps = spec.fps(),
            inspector = self.inspector.name(),
            "Timeline composed"
        );

        Ok(spec)
    }
}

/// Layout described by the `layout` section of the app config.
pub fn layout_from_defaults(defaults: &LayoutDefaults) -> LayoutConfig {
    if defaults.legacy {
        return LayoutConfig::legacy().with_fps(defaults.fps);
    }

    let frame = FrameSize::new(defaults.frame_width, defaults.frame_height);
    let mut layout = LayoutConfig::stacked(frame, CLIP_COUNT).with_fps(defaults.fps);
    layout.reference_source = FrameSize::new(
        defaults.reference_source_width,
        defaults.reference_source_height,
    );
    if let Some(height) = defaults.band_height {
        layout.band_size.height = height;
        layout.band_stride = height;
    }
    if let Some(stride) = defaults.band_stride {
        layout.band_stride = stride;
    }
    layout
}
