//! Receives a multipart CSV upload into an [`UploadArtifact`].

use std::path::Path;

use actix_multipart::{Field, Multipart, MultipartError};
use futures::TryStreamExt as _;
use propdata_ingest::artifact::UploadArtifact;
use thiserror::Error;

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "csvFile";

/// Reasons an upload is turned away before it reaches the pipeline.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No `csvFile` field in the request.
    #[error("No file uploaded")]
    NoFile,

    /// The file is neither typed nor named as CSV.
    #[error("Invalid file type")]
    InvalidType,

    /// The multipart body could not be read.
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// The file could not be spooled to disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether a file looks like CSV by content type or by name.
#[must_use]
pub fn is_csv(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    content_type.is_some_and(|t| t.to_ascii_lowercase().contains("csv"))
        || file_name.is_some_and(|n| n.to_ascii_lowercase().ends_with(".csv"))
}

/// Spools the `csvFile` field of `payload` into a temporary file under
/// `dir`.
///
/// Other fields are skipped. The type check runs on the field headers, so
/// a rejected file is never written to disk.
///
/// # Errors
///
/// Returns [`UploadError`] if the field is missing, is not CSV, or cannot
/// be read and stored.
pub async fn receive_csv(mut payload: Multipart, dir: &Path) -> Result<UploadArtifact, UploadError> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(FILE_FIELD) {
            drain(&mut field).await?;
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(String::from);
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        if !is_csv(content_type.as_deref(), file_name.as_deref()) {
            log::warn!(
                "Rejected upload {} ({})",
                file_name.as_deref().unwrap_or("<unnamed>"),
                content_type.as_deref().unwrap_or("no content type")
            );
            return Err(UploadError::InvalidType);
        }

        let mut artifact = UploadArtifact::create_in(dir, file_name)?;
        let mut bytes = 0usize;
        while let Some(chunk) = field.try_next().await? {
            bytes += chunk.len();
            artifact.write_chunk(&chunk)?;
        }
        log::debug!("Received {bytes} bytes into {}", artifact.path().display());

        return Ok(artifact);
    }

    Err(UploadError::NoFile)
}

async fn drain(field: &mut Field) -> Result<(), MultipartError> {
    while field.try_next().await?.is_some() {}
    Ok(())
}
