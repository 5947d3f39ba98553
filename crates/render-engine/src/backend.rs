//! Transcode backend seam.

use std::path::Path;

use async_trait::async_trait;
use tristack_common::error::ExportError;
use tristack_timeline_model::RenderSpec;

use crate::progress::{CancelSignal, ProgressReporter};

/// Renders a [`RenderSpec`] into one output file.
///
/// Backends report progress through `progress` and must stop promptly once
/// `cancel` fires, returning [`BackendError::Cancelled`].
#[async_trait]
pub trait TranscodeBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Encode `spec` into `output`. The output location is already prepared.
    async fn transcode(
        &self,
        spec: &RenderSpec,
        output: &Path,
        progress: &ProgressReporter,
        cancel: CancelSignal,
    ) -> Result<(), BackendError>;
}

/// Transcode failures.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{binary} is not installed or not in PATH")]
    Unavailable { binary: String },

    #[error("unsupported render spec: {0}")]
    Unsupported(String),

    #[error("failed to start encoder: {0}")]
    Spawn(String),

    #[error("encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcode cancelled")]
    Cancelled,
}

impl BackendError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<BackendError> for ExportError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => ExportError::Cancelled,
            other => ExportError::backend(other.to_string()),
        }
    }
}
