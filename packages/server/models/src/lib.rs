#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the property data server.
//!
//! These are the JSON contract of the REST API, kept apart from the
//! pipeline's own outcome types so either can change independently.

use propdata_ingest_models::IngestionOutcome;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Counts reported after a fully successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStats {
    /// Data rows read from the file.
    pub total_processed: u64,
    /// Records that replaced a stored property.
    pub updated: u64,
    /// Records stored as new properties.
    pub inserted: u64,
}

/// `POST /api/upload` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUploadSuccess {
    /// Human readable summary.
    pub message: String,
    /// Row and write counts.
    pub stats: UploadStats,
}

/// Counts reported when some upsert batches failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialFailureStats {
    /// Data rows read from the file.
    pub total_processed: u64,
    /// Updates in batches that succeeded.
    pub successful_updates: u64,
    /// Inserts in batches that succeeded.
    pub successful_inserts: u64,
    /// Number of batches that failed.
    pub failed_batches: usize,
}

/// `POST /api/upload` body when some batches failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPartialFailure {
    /// Error summary.
    pub error: String,
    /// One message per failed batch.
    pub details: Vec<String>,
    /// Counts for the batches that went through.
    pub stats: PartialFailureStats,
}

impl From<&IngestionOutcome> for ApiUploadSuccess {
    fn from(outcome: &IngestionOutcome) -> Self {
        Self {
            message: "CSV processed successfully".to_string(),
            stats: UploadStats {
                total_processed: outcome.rows_read,
                updated: outcome.updated,
                inserted: outcome.inserted,
            },
        }
    }
}

impl From<&IngestionOutcome> for ApiPartialFailure {
    fn from(outcome: &IngestionOutcome) -> Self {
        Self {
            error: "Partial database operation failure".to_string(),
            details: outcome.errors.clone(),
            stats: PartialFailureStats {
                total_processed: outcome.rows_read,
                successful_updates: outcome.updated,
                successful_inserts: outcome.inserted,
                failed_batches: outcome.failed_batches(),
            },
        }
    }
}

/// Query parameters naming a street address.
///
/// Used by `/api/census/geocode` and `/api/census/lookup`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressQueryParams {
    /// Street address.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
}

impl AddressQueryParams {
    /// Returns `(street, city, state)` when all three are present and
    /// non-blank.
    #[must_use]
    pub fn required(&self) -> Option<(&str, &str, &str)> {
        Some((
            present(self.street.as_ref())?,
            present(self.city.as_ref())?,
            present(self.state.as_ref())?,
        ))
    }
}

/// Query parameters naming a county.
///
/// Used by `/api/census/census-data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountyQueryParams {
    /// State FIPS code.
    pub state: Option<String>,
    /// County FIPS code.
    pub county: Option<String>,
}

impl CountyQueryParams {
    /// Returns `(state, county)` when both are present and non-blank.
    #[must_use]
    pub fn required(&self) -> Option<(&str, &str)> {
        Some((present(self.state.as_ref())?, present(self.county.as_ref())?))
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}
