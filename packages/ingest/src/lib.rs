#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV property ingestion.
//!
//! An upload flows through four stages:
//!
//! 1. **Parse**: the file is read as a headed CSV table. Unreadable tables
//!    and tables without data rows are rejected before storage is touched.
//! 2. **Normalize** ([`normalize`]): each row becomes a typed record plus a
//!    case- and whitespace-insensitive address key.
//! 3. **Reconcile** ([`reconcile`]): the distinct keys are looked up in
//!    storage in bounded chunks, and matched records pick up the stored id.
//! 4. **Upsert** ([`upsert`]): records are written in bounded batches. A
//!    failed batch is recorded in the outcome and the run continues.
//!
//! Rows that repeat an address within one file are each counted on their
//! own: every row whose key was already stored counts as an update, every
//! other row as an insert, even when an earlier row in the same file
//! carried the same key. Storage keeps the last occurrence.

pub mod artifact;
pub mod normalize;
pub mod reconcile;
pub mod upsert;

#[cfg(test)]
mod testing;

use std::collections::BTreeSet;
use std::io::Read;

use chrono::{DateTime, Utc};
use propdata_database::{DbError, PropertyStore};
use propdata_ingest_models::{IngestConfig, IngestionOutcome};
use propdata_property_models::{NormalizedKey, PreparedRecord};
use thiserror::Error;

use crate::artifact::UploadArtifact;
use crate::normalize::{ADDRESS_HEADER, RawPropertyRow, normalize_row};

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file could not be read as a CSV table.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// The header row lacks a required column.
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    /// The file has a header but no data rows.
    #[error("Empty CSV")]
    Empty,

    /// The uploaded file could not be read from disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Looking up existing properties failed; no batches were written.
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[source] DbError),
}

impl IngestError {
    /// Whether the error describes the uploaded file itself rather than a
    /// server-side failure.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::Csv(_) | Self::MissingColumn(_) | Self::Empty)
    }
}

/// Reads every data row of a headed CSV table.
///
/// # Errors
///
/// Returns [`IngestError`] if the table cannot be parsed, lacks the address
/// column, or has no data rows.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawPropertyRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    if !reader.headers()?.iter().any(|h| h == ADDRESS_HEADER) {
        return Err(IngestError::MissingColumn(ADDRESS_HEADER));
    }

    let rows = reader
        .deserialize::<RawPropertyRow>()
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(IngestError::Empty);
    }

    Ok(rows)
}

/// Normalizes, reconciles, and upserts already-parsed rows.
///
/// # Errors
///
/// Returns [`IngestError::Reconcile`] if any reconciliation query fails.
/// Batch failures are reported inside the returned outcome instead.
pub async fn ingest_rows(
    store: &dyn PropertyStore,
    rows: &[RawPropertyRow],
    config: IngestConfig,
    updated_at: DateTime<Utc>,
) -> Result<IngestionOutcome, IngestError> {
    let config = config.sanitized();
    let mut outcome = IngestionOutcome::new(rows.len() as u64);

    let mut records: Vec<PreparedRecord> = rows
        .iter()
        .map(|row| normalize_row(row, updated_at))
        .collect();

    let keys: Vec<NormalizedKey> = records
        .iter()
        .map(|r| &r.key)
        .filter(|k| !k.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    log::info!(
        "Normalized {} rows ({} distinct addresses)",
        records.len(),
        keys.len()
    );

    let existing = reconcile::resolve_existing(
        store,
        &keys,
        config.reconcile_chunk_size,
        config.max_concurrency,
    )
    .await
    .map_err(IngestError::Reconcile)?;

    log::info!("{} addresses already stored", existing.len());

    for prepared in &mut records {
        prepared.record.id = existing.get(&prepared.key).copied();
    }

    upsert::upsert_in_batches(
        store,
        &records,
        config.upsert_batch_size,
        config.max_concurrency,
        &mut outcome,
    )
    .await;

    if outcome.is_partial_failure() {
        log::warn!(
            "Ingestion finished with {} failed batch(es): {} updated, {} inserted of {} rows",
            outcome.failed_batches(),
            outcome.updated,
            outcome.inserted,
            outcome.rows_read
        );
    } else {
        log::info!(
            "Ingestion complete: {} updated, {} inserted of {} rows",
            outcome.updated,
            outcome.inserted,
            outcome.rows_read
        );
    }

    Ok(outcome)
}

/// Runs the full pipeline over a CSV stream.
///
/// # Errors
///
/// Returns [`IngestError`] on a structural problem with the file or a
/// reconciliation failure.
pub async fn ingest_reader<R: Read>(
    store: &dyn PropertyStore,
    reader: R,
    config: IngestConfig,
) -> Result<IngestionOutcome, IngestError> {
    let rows = read_rows(reader)?;
    ingest_rows(store, &rows, config, Utc::now()).await
}

/// Runs the full pipeline over an uploaded file and removes the file
/// afterwards, whatever the result.
///
/// # Errors
///
/// Returns [`IngestError`] on a structural problem with the file, a read
/// failure, or a reconciliation failure.
pub async fn ingest_upload(
    store: &dyn PropertyStore,
    mut artifact: UploadArtifact,
    config: IngestConfig,
) -> Result<IngestionOutcome, IngestError> {
    log::info!(
        "Ingesting upload {}",
        artifact.original_name().unwrap_or("<unnamed>")
    );

    let rows = artifact
        .open()
        .map_err(IngestError::from)
        .and_then(read_rows);
    artifact.remove();

    ingest_rows(store, &rows?, config, Utc::now()).await
}
