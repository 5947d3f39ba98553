//! Durable storage for finished collages.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tristack_common::error::{CollageError, CollageResult};

/// Persists an exported file somewhere the user will find it.
pub trait MediaLibrary: Send + Sync {
    /// Store `exported` and return where it ended up.
    fn commit(&self, exported: &Path) -> CollageResult<PathBuf>;

    /// Library name.
    fn name(&self) -> &str;
}

/// A plain directory acting as the media library.
///
/// Files are copied in as `collage-YYYYMMDD-HHMMSS.<ext>`, with `-N`
/// appended when that name is taken.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Commit using `now` for the file name.
    pub fn commit_at(&self, exported: &Path, now: DateTime<Local>) -> CollageResult<PathBuf> {
        if !exported.is_file() {
            return Err(CollageError::storage(format!(
                "{} is not a file",
                exported.display()
            )));
        }

        std::fs::create_dir_all(&self.root).map_err(|e| {
            CollageError::storage(format!(
                "cannot create library directory {}: {e}",
                self.root.display()
            ))
        })?;

        let extension = exported
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let target = self.free_name(&now.format("%Y%m%d-%H%M%S").to_string(), extension);

        std::fs::copy(exported, &target).map_err(|e| {
            CollageError::storage(format!(
                "cannot copy {} to {}: {e}",
                exported.display(),
                target.display()
            ))
        })?;

        tracing::info!(
            source = %exported.display(),
            target = %target.display(),
            "Collage saved to library"
        );
        Ok(target)
    }

    fn free_name(&self, stamp: &str, extension: &str) -> PathBuf {
        let first = self.root.join(format!("collage-{stamp}.{extension}"));
        if !first.exists() {
            return first;
        }
        (1u32..)
            .map(|n| self.root.join(format!("collage-{stamp}-{n}.{extension}")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(first)
    }
}

impl MediaLibrary for DirectoryLibrary {
    fn commit(&self, exported: &Path) -> CollageResult<PathBuf> {
        self.commit_at(exported, Local::now())
    }

    fn name(&self) -> &str {
        "directory"
    }
}
