//! Reading variable files and writing patched ones back
//!
//! Writes are atomic: the new text goes to a tempfile in the same
//! directory, which is synced and renamed over the original, so a reader
//! sees either the old file or the new one.

use crate::editor::MemoryBuffer;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultvarError};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Reads the document at `path` into a line buffer.
pub fn read_document(path: &Path) -> Result<MemoryBuffer> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    let text = String::from_utf8(bytes).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })?;
    debug!(path = %path.display(), bytes = text.len(), "read document");
    Ok(MemoryBuffer::from_text(&text))
}

/// Atomically replaces the document at `path` with `buffer`.
///
/// The file keeps its permissions.
pub fn write_document(path: &Path, buffer: &MemoryBuffer) -> Result<()> {
    let permissions = fs::metadata(path).map_err(|e| read_error(path, e))?.permissions();

    // A bare file name has an empty parent; that is the working directory.
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(buffer.text().as_bytes()).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;
    temp_file.as_file().set_permissions(permissions).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to set tempfile permissions",
            e,
        )
    })?;

    temp_file.persist(path).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    debug!(path = %path.display(), "wrote document");
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> VaultvarError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    VaultvarError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
