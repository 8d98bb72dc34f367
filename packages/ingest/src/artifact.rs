//! Temporary on-disk copy of an uploaded file.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use tempfile::NamedTempFile;

/// An uploaded file spooled to a temporary location.
///
/// The file is removed when the artifact is closed or dropped, so every
/// exit path of a request that owns one cleans up after itself.
#[derive(Debug)]
pub struct UploadArtifact {
    file: NamedTempFile,
    original_name: Option<String>,
}

impl UploadArtifact {
    /// Creates an empty artifact inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temporary file cannot be created.
    pub fn create_in(dir: &Path, original_name: Option<String>) -> std::io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".csv")
            .tempfile_in(dir)?;
        Ok(Self {
            file,
            original_name,
        })
    }

    /// Appends a chunk of the upload body.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.file.write_all(chunk)
    }

    /// Path of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// File name the client uploaded under, if it sent one.
    #[must_use]
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    /// Opens a fresh read handle positioned at the start of the file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if buffered data cannot be flushed or the file
    /// cannot be reopened.
    pub fn open(&mut self) -> std::io::Result<File> {
        self.file.flush()?;
        self.file.reopen()
    }

    /// Removes the temporary file, logging rather than returning a failure.
    pub fn remove(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            log::warn!("Failed to remove upload artifact {}: {e}", path.display());
        } else {
            log::debug!("Removed upload artifact {}", path.display());
        }
    }
}
