//! Compose-then-export orchestration.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use tristack_common::error::{CollageError, CollageResult, ExportError};
use tristack_composer::{MediaInspector, TimelineComposer};
use tristack_timeline_model::{ClipBatch, LayoutConfig, RenderSpec};

use crate::export::{ExportEngine, ExportHandle};

/// Ties the timeline composer to the export engine.
///
/// Composition fails fast; no export work starts unless the whole batch
/// composes.
#[derive(Clone)]
pub struct CollagePipeline {
    inspector: Arc<dyn MediaInspector>,
    layout: LayoutConfig,
    engine: ExportEngine,
}

impl CollagePipeline {
    pub fn new(inspector: Arc<dyn MediaInspector>, layout: LayoutConfig, engine: ExportEngine) -> Self {
        Self {
            inspector,
            layout,
            engine,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Compose on the calling thread. Inspection may block on child
    /// processes.
    pub fn compose(&self, batch: &ClipBatch) -> CollageResult<RenderSpec> {
        let composer = TimelineComposer::new(self.inspector.as_ref(), self.layout);
        Ok(composer.compose(batch)?)
    }

    /// Compose on the blocking pool so probing never stalls the runtime.
    pub async fn compose_blocking(&self, batch: &ClipBatch) -> CollageResult<RenderSpec> {
        let pipeline = self.clone();
        let batch = batch.clone();
        tokio::task::spawn_blocking(move || pipeline.compose(&batch))
            .await
            .map_err(|e| CollageError::Other(anyhow::Error::new(e)))?
    }

    /// Compose `batch` and start exporting it to `output`.
    pub async fn start(
        &self,
        batch: &ClipBatch,
        output: impl Into<PathBuf>,
    ) -> CollageResult<ExportHandle> {
        let spec = self.compose_blocking(batch).await?;
        Ok(self.engine.start(spec, output))
    }

    /// Compose `batch`, export it to `output` and wait for the result.
    pub async fn run<P>(
        &self,
        batch: &ClipBatch,
        output: impl Into<PathBuf>,
        on_progress: P,
    ) -> CollageResult<PathBuf>
    where
        P: FnMut(f64) + Send + 'static,
    {
        let spec = self.compose_blocking(batch).await?;

        let (tx, rx) = oneshot::channel();
        self.engine.export(spec, output, on_progress, move |result| {
            let _ = tx.send(result);
        });

        let result = rx
            .await
            .unwrap_or_else(|_| Err(ExportError::backend("export task ended without a result")));
        Ok(result?)
    }
}
