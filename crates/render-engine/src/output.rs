//! Output location preparation and cleanup.

use std::fs::OpenOptions;
use std::path::Path;

use tristack_common::error::ExportError;

/// Make `path` ready to receive a fresh export.
///
/// Creates missing parent directories, deletes a stale file and checks the
/// location can be written. A directory at `path` is rejected.
pub fn prepare_output(path: &Path) -> Result<(), ExportError> {
    if path.as_os_str().is_empty() {
        return Err(ExportError::unwritable(path, "empty output path"));
    }
    if path.is_dir() {
        return Err(ExportError::unwritable(path, "path is a directory"));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::unwritable(path, e))?;
    }

    if path.exists() {
        std::fs::remove_file(path).map_err(|e| ExportError::unwritable(path, e))?;
        tracing::debug!(path = %path.display(), "Removed stale output");
    }

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| ExportError::unwritable(path, e))?;
    std::fs::remove_file(path).map_err(|e| ExportError::unwritable(path, e))?;

    Ok(())
}

/// Delete whatever a failed or cancelled export left at `path`.
pub fn remove_partial_output(path: &Path) {
    if !path.is_file() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(err) => tracing::warn!(
            error = %err,
            path = %path.display(),
            "Failed to remove partial output"
        ),
    }
}
