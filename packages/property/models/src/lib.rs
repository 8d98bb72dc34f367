#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Property record types shared by the ingestion pipeline, the storage
//! layer, and the API server.
//!
//! A [`PropertyRecord`] is keyed naturally by its street address. The
//! storage-assigned [`PropertyId`] is only ever attached after the address
//! has been matched against storage, never guessed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned property identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub i64);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Case- and whitespace-insensitive form of an address.
///
/// Only used for equality matching between uploaded rows and stored
/// records. It is never persisted or shown to users.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Normalizes a raw address by trimming surrounding whitespace and
    /// lowercasing.
    #[must_use]
    pub fn from_address(address: &str) -> Self {
        Self(address.trim().to_lowercase())
    }

    /// Normalizes an optional address. A missing address yields the empty
    /// key.
    #[must_use]
    pub fn from_optional(address: Option<&str>) -> Self {
        Self::from_address(address.unwrap_or_default())
    }

    /// Returns the normalized string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the source address was missing or blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One physical property.
///
/// Field names serialize to the stored column names so the listing
/// endpoint returns rows in the same shape the table UI expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Storage-assigned identifier. `None` for records not yet stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PropertyId>,
    /// Street address, original case.
    #[serde(rename = "property_address")]
    pub address: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// State code (e.g. "IL").
    pub state: Option<String>,
    /// Postal code.
    pub zip: Option<String>,
    /// County name.
    pub county: Option<String>,
    /// Year the structure was built.
    pub year_built: Option<i32>,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Occupancy rate as a percentage.
    pub occupancy_rate: Option<f64>,
    /// Number of parking spaces.
    pub parking_spaces: Option<i32>,
    /// EV charging availability. `None` means unknown, which is distinct
    /// from `Some(false)`.
    pub has_ev_charging: Option<bool>,
    /// Free-text redevelopment notes.
    pub redevelopment_opportunities: Option<String>,
    /// When this record was last written.
    pub updated_at: DateTime<Utc>,
}

impl PropertyRecord {
    /// Creates an empty record stamped with `updated_at`.
    #[must_use]
    pub const fn empty(updated_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            address: None,
            city: None,
            state: None,
            zip: None,
            county: None,
            year_built: None,
            latitude: None,
            longitude: None,
            occupancy_rate: None,
            parking_spaces: None,
            has_ev_charging: None,
            redevelopment_opportunities: None,
            updated_at,
        }
    }

    /// Normalized matching key for this record's address.
    #[must_use]
    pub fn key(&self) -> NormalizedKey {
        NormalizedKey::from_optional(self.address.as_deref())
    }
}

/// A record ready to be written, paired with its matching key.
///
/// `record.id` is set exactly when reconciliation found the key in
/// storage, which makes the write an update rather than an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    /// Matching key derived from the record's address.
    pub key: NormalizedKey,
    /// The record to write.
    pub record: PropertyRecord,
}

impl PreparedRecord {
    /// Whether this record carries a resolved identifier.
    #[must_use]
    pub const fn is_update(&self) -> bool {
        self.record.id.is_some()
    }
}

/// The identity of an already-stored property, as returned by a
/// key-set lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingProperty {
    /// Storage-assigned identifier.
    pub id: PropertyId,
    /// Stored address, as written.
    pub address: Option<String>,
}
