#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion configuration and result types.

use serde::{Deserialize, Serialize};

/// Number of keys per reconciliation query.
pub const DEFAULT_RECONCILE_CHUNK_SIZE: usize = 100;

/// Number of records per upsert batch.
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 50;

/// Maximum storage operations in flight at once within one run.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Tunables for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Keys per reconciliation query.
    pub reconcile_chunk_size: usize,
    /// Records per upsert batch.
    pub upsert_batch_size: usize,
    /// Bound on concurrent reconciliation queries and upsert batches.
    pub max_concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reconcile_chunk_size: DEFAULT_RECONCILE_CHUNK_SIZE,
            upsert_batch_size: DEFAULT_UPSERT_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl IngestConfig {
    /// Returns a copy with every size clamped to at least one.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            reconcile_chunk_size: self.reconcile_chunk_size.max(1),
            upsert_batch_size: self.upsert_batch_size.max(1),
            max_concurrency: self.max_concurrency.max(1),
        }
    }
}

/// Result of one ingestion run.
///
/// `updated + inserted <= rows_read` always holds: records from a failed
/// batch count toward neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionOutcome {
    /// Data rows read from the file.
    pub rows_read: u64,
    /// Records that matched an existing property and were written.
    pub updated: u64,
    /// Records without a match that were written.
    pub inserted: u64,
    /// One message per failed batch, in batch order.
    pub errors: Vec<String>,
}

impl IngestionOutcome {
    /// Creates an empty outcome for a file of `rows_read` rows.
    #[must_use]
    pub const fn new(rows_read: u64) -> Self {
        Self {
            rows_read,
            updated: 0,
            inserted: 0,
            errors: Vec::new(),
        }
    }

    /// Number of batches that failed.
    #[must_use]
    pub fn failed_batches(&self) -> usize {
        self.errors.len()
    }

    /// Whether at least one batch failed.
    #[must_use]
    pub fn is_partial_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Records that made it into storage.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.updated + self.inserted
    }
}
