pub mod check;
pub mod compose;
pub mod plan;
pub mod probe;

use std::path::PathBuf;

use tristack_common::config::AppConfig;
use tristack_common::error::{CollageError, CollageResult};
use tristack_composer::layout_from_defaults;
use tristack_timeline_model::{ClipBatchBuilder, ClipBatch, LayoutConfig};

/// Layout from config, optionally forced to the legacy constants.
pub(crate) fn layout(config: &AppConfig, legacy: bool) -> LayoutConfig {
    if legacy {
        LayoutConfig::legacy().with_fps(config.layout.fps)
    } else {
        layout_from_defaults(&config.layout)
    }
}

/// Freeze command-line clip paths into a batch, top band first.
pub(crate) fn batch(clips: Vec<PathBuf>) -> CollageResult<ClipBatch> {
    let mut builder = ClipBatchBuilder::new();
    for clip in clips {
        builder
            .push(clip)
            .map_err(|e| CollageError::batch(e.to_string()))?;
    }
    builder
        .finish()
        .map_err(|e| CollageError::batch(e.to_string()))
}
