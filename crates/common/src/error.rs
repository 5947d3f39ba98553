//! Error types shared across TriStack crates.

use std::path::PathBuf;

/// Failures while building the stacked timeline from source clips.
///
/// Any of these aborts the pipeline before export work begins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    #[error("Clip {index} has no video track")]
    NoVideoTrack { index: usize },

    #[error("Clip {index} could not be placed on the timeline: {reason}")]
    InsertionFailed { index: usize, reason: String },

    #[error("Invalid layout: {reason}")]
    InvalidLayout { reason: String },
}

/// Failures of an export job. Delivered once through the result channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Output path {path} is not writable: {reason}")]
    OutputPathUnwritable { path: PathBuf, reason: String },

    #[error("Transcode backend failed: {reason}")]
    BackendFailure { reason: String },

    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    pub fn unwritable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OutputPathUnwritable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn backend(reason: impl Into<String>) -> Self {
        Self::BackendFailure {
            reason: reason.into(),
        }
    }

    /// Whether this is a requested stop rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Top-level error type for TriStack operations.
#[derive(Debug, thiserror::Error)]
pub enum CollageError {
    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Clip selection error: {message}")]
    Batch { message: String },

    #[error("Storage commit failed: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CollageError.
pub type CollageResult<T> = Result<T, CollageError>;

/// Stable, distinguishable error category for presenting one message per
/// terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoVideoTrack,
    InsertionFailed,
    InvalidLayout,
    OutputUnwritable,
    BackendFailure,
    Cancelled,
    Batch,
    Storage,
    Config,
    Io,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NoVideoTrack => "no_video_track",
            ErrorKind::InsertionFailed => "insertion_failed",
            ErrorKind::InvalidLayout => "invalid_layout",
            ErrorKind::OutputUnwritable => "output_unwritable",
            ErrorKind::BackendFailure => "backend_failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Batch => "batch",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CollageError {
    pub fn batch(msg: impl Into<String>) -> Self {
        Self::Batch {
            message: msg.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CollageError::Composition(CompositionError::NoVideoTrack { .. }) => {
                ErrorKind::NoVideoTrack
            }
            CollageError::Composition(CompositionError::InsertionFailed { .. }) => {
                ErrorKind::InsertionFailed
            }
            CollageError::Composition(CompositionError::InvalidLayout { .. }) => {
                ErrorKind::InvalidLayout
            }
            CollageError::Export(ExportError::OutputPathUnwritable { .. }) => {
                ErrorKind::OutputUnwritable
            }
            CollageError::Export(ExportError::BackendFailure { .. }) => ErrorKind::BackendFailure,
            CollageError::Export(ExportError::Cancelled) => ErrorKind::Cancelled,
            CollageError::Batch { .. } => ErrorKind::Batch,
            CollageError::Storage { .. } => ErrorKind::Storage,
            CollageError::Config { .. } | CollageError::Json(_) => ErrorKind::Config,
            CollageError::FileNotFound { .. } | CollageError::Io(_) => ErrorKind::Io,
            CollageError::Other(_) => ErrorKind::Other,
        }
    }
}
