//! Stacked layout geometry and the render recipe handed to the encoder.

use serde::{Deserialize, Serialize};

use crate::geometry::{AffineTransform, BandRect, FrameSize};
use crate::timeline::{TimeRange, Timeline, TrackId};

/// Geometry of the vertical stack.
///
/// Scale factors are fixed, derived from an assumed reference source
/// resolution rather than each clip's real size. Clips with a different
/// aspect ratio are stretched into their band; no crop or letterbox is
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Output frame size.
    pub frame: FrameSize,

    /// Output frame rate.
    pub fps: u32,

    /// Source resolution the scale factors assume.
    pub reference_source: FrameSize,

    /// Size a reference source occupies once scaled into its band.
    pub band_size: FrameSize,

    /// Vertical offset between consecutive bands.
    pub band_stride: u32,
}

/// Invalid layout parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("{what} must be non-zero (got {size})")]
    EmptySize { what: &'static str, size: FrameSize },

    #[error("frame rate must be positive")]
    ZeroFrameRate,

    #[error("band stride is zero, {bands} bands would be drawn on top of each other")]
    ZeroStride { bands: usize },
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::stacked(FrameSize::PORTRAIT_1080P, crate::clip::CLIP_COUNT)
    }
}

impl LayoutConfig {
    /// Default frame rate of the collage.
    pub const DEFAULT_FPS: u32 = 30;

    /// Even split of `frame` into `bands` full-width, non-overlapping bands.
    pub fn stacked(frame: FrameSize, bands: usize) -> Self {
        let band_height = frame.height / bands.max(1) as u32;
        Self {
            frame,
            fps: Self::DEFAULT_FPS,
            reference_source: FrameSize::LANDSCAPE_1080P,
            band_size: FrameSize::new(frame.width, band_height),
            band_stride: band_height,
        }
    }

    /// The original stacking constants: 1920x1080 sources scaled to
    /// 1080x720, stacked every 610 px. Adjacent bands overlap by 110 px.
    pub fn legacy() -> Self {
        Self {
            frame: FrameSize::PORTRAIT_1080P,
            fps: Self::DEFAULT_FPS,
            reference_source: FrameSize::LANDSCAPE_1080P,
            band_size: FrameSize::new(1080, 720),
            band_stride: 610,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn validate(&self, bands: usize) -> Result<(), LayoutError> {
        for (what, size) in [
            ("frame size", self.frame),
            ("reference source size", self.reference_source),
            ("band size", self.band_size),
        ] {
            if size.is_empty() {
                return Err(LayoutError::EmptySize { what, size });
            }
        }
        if self.fps == 0 {
            return Err(LayoutError::ZeroFrameRate);
        }
        if self.band_stride == 0 && bands > 1 {
            return Err(LayoutError::ZeroStride { bands });
        }
        Ok(())
    }

    /// Fixed `(scale_x, scale_y)` applied to every clip.
    pub fn scale_factors(&self) -> (f64, f64) {
        (
            self.band_size.width as f64 / self.reference_source.width as f64,
            self.band_size.height as f64 / self.reference_source.height as f64,
        )
    }

    /// Vertical origin of band `index`.
    pub fn band_offset(&self, index: usize) -> f64 {
        index as f64 * self.band_stride as f64
    }

    /// Scale, then translate into band `index`.
    pub fn band_transform(&self, index: usize) -> AffineTransform {
        let (sx, sy) = self.scale_factors();
        AffineTransform::scale(sx, sy).then(&AffineTransform::translation(
            0.0,
            self.band_offset(index),
        ))
    }

    /// Area a reference-sized source covers in band `index`.
    pub fn band_rect(&self, index: usize) -> BandRect {
        self.band_transform(index).map_frame(self.reference_source)
    }

    /// Whether any two of the first `bands` bands share pixels.
    pub fn bands_overlap(&self, bands: usize) -> bool {
        (1..bands).any(|i| self.band_rect(i - 1).overlaps(&self.band_rect(i)))
    }
}

/// Places one composition track on the output frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInstruction {
    pub track_id: TrackId,

    /// Band position; decides stacking order.
    pub band_index: usize,

    pub transform: AffineTransform,

    /// Range over which the transform applies.
    pub time_range: TimeRange,
}

/// Layer instructions active over one time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionInstruction {
    pub time_range: TimeRange,
    pub layers: Vec<LayerInstruction>,
}

/// Inconsistent render recipe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderSpecError {
    #[error("{tracks} tracks but {layers} layer instructions")]
    LayerCountMismatch { tracks: usize, layers: usize },

    #[error("{0} has no layer instruction")]
    MissingLayer(TrackId),

    #[error("{0} has more than one layer instruction")]
    DuplicateLayer(TrackId),

    #[error("layer refers to unknown {0}")]
    UnknownTrack(TrackId),

    #[error("timeline is empty")]
    EmptyTimeline,
}

/// The finalized, immutable recipe handed to the encode stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSpec {
    frame: FrameSize,
    fps: u32,
    timeline: Timeline,
    instruction: CompositionInstruction,
}

impl RenderSpec {
    /// Build a spec, checking there is exactly one layer per track.
    pub fn new(
        frame: FrameSize,
        fps: u32,
        timeline: Timeline,
        instruction: CompositionInstruction,
    ) -> Result<Self, RenderSpecError> {
        if timeline.is_empty() {
            return Err(RenderSpecError::EmptyTimeline);
        }
        if timeline.len() != instruction.layers.len() {
            return Err(RenderSpecError::LayerCountMismatch {
                tracks: timeline.len(),
                layers: instruction.layers.len(),
            });
        }
        for layer in &instruction.layers {
            if timeline.track(layer.track_id).is_none() {
                return Err(RenderSpecError::UnknownTrack(layer.track_id));
            }
        }
        for track in timeline.tracks() {
            match instruction
                .layers
                .iter()
                .filter(|l| l.track_id == track.id)
                .count()
            {
                0 => return Err(RenderSpecError::MissingLayer(track.id)),
                1 => {}
                _ => return Err(RenderSpecError::DuplicateLayer(track.id)),
            }
        }

        Ok(Self {
            frame,
            fps,
            timeline,
            instruction,
        })
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn instruction(&self) -> &CompositionInstruction {
        &self.instruction
    }

    pub fn layers(&self) -> &[LayerInstruction] {
        &self.instruction.layers
    }

    pub fn layer_for_track(&self, id: TrackId) -> Option<&LayerInstruction> {
        self.instruction.layers.iter().find(|l| l.track_id == id)
    }

    pub fn duration_secs(&self) -> f64 {
        self.instruction.time_range.duration_secs
    }

    pub fn total_frames(&self) -> u64 {
        (self.duration_secs() * self.fps as f64).ceil() as u64
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
