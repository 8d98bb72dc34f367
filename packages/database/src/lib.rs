#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Property storage for the ingestion pipeline and API server.
//!
//! The pipeline only depends on the [`PropertyStore`] capability: select
//! existing identities by a set of matching keys, upsert a batch keyed on
//! address uniqueness, and list everything. [`PostgresPropertyStore`]
//! implements it with raw SQL through `switchy_database`.
//!
//! The expected table is:
//!
//! ```sql
//! CREATE TABLE properties (
//!     id BIGSERIAL PRIMARY KEY,
//!     property_address TEXT,
//!     city TEXT,
//!     state TEXT,
//!     zip TEXT,
//!     county TEXT,
//!     year_built INTEGER,
//!     latitude DOUBLE PRECISION,
//!     longitude DOUBLE PRECISION,
//!     occupancy_rate DOUBLE PRECISION,
//!     parking_spaces INTEGER,
//!     has_ev_charging BOOLEAN,
//!     redevelopment_opportunities TEXT,
//!     updated_at TIMESTAMP
//! );
//! CREATE UNIQUE INDEX properties_address_key
//!     ON properties ((lower(btrim(property_address))));
//! ```
//!
//! Creating it is left to the operator.

pub mod db;
pub mod queries;

use std::sync::Arc;

use async_trait::async_trait;
use propdata_property_models::{ExistingProperty, NormalizedKey, PreparedRecord, PropertyRecord};
use switchy_database::Database;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Storage capability consumed by the ingestion pipeline.
///
/// Concurrent writers are not coordinated here. Two uploads carrying the
/// same new address race, and the store's uniqueness constraint on the
/// normalized address decides the outcome.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Returns the stored properties whose normalized address is in `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn select_by_keys(&self, keys: &[NormalizedKey])
    -> Result<Vec<ExistingProperty>, DbError>;

    /// Writes one batch as a single upsert keyed on address uniqueness.
    ///
    /// Records sharing a key collapse to the last one (see
    /// [`queries::collapse_by_key`]). A record whose id no longer exists is
    /// inserted as a new row. Returns the number of stored rows written,
    /// which callers compare against the collapsed batch size.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the batch is rejected. Nothing from a rejected
    /// batch is written.
    async fn upsert_batch(&self, batch: &[PreparedRecord]) -> Result<u64, DbError>;

    /// Returns every stored property in ascending identifier order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a row cannot be decoded.
    async fn list_all(&self) -> Result<Vec<PropertyRecord>, DbError>;
}

/// [`PropertyStore`] backed by a `PostgreSQL` `properties` table.
#[derive(Clone)]
pub struct PostgresPropertyStore {
    db: Arc<dyn Database>,
}

impl PostgresPropertyStore {
    /// Wraps an open database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Connects using `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect_from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let db = db::connect_from_env().await?;
        Ok(Self::new(Arc::from(db)))
    }
}

#[async_trait]
impl PropertyStore for PostgresPropertyStore {
    async fn select_by_keys(
        &self,
        keys: &[NormalizedKey],
    ) -> Result<Vec<ExistingProperty>, DbError> {
        queries::select_by_keys(self.db.as_ref(), keys).await
    }

    async fn upsert_batch(&self, batch: &[PreparedRecord]) -> Result<u64, DbError> {
        queries::upsert_properties(self.db.as_ref(), batch).await
    }

    async fn list_all(&self) -> Result<Vec<PropertyRecord>, DbError> {
        queries::list_properties(self.db.as_ref()).await
    }
}
