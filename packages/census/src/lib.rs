#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Housing statistics lookups for a single property address.
//!
//! A lookup is a two-hop chain against US Census Bureau services:
//!
//! 1. **Geography** ([`geography`]): the Census geocoder resolves a street
//!    address to its state and county codes.
//! 2. **Statistics** ([`statistics`]): the ACS data API returns housing
//!    counts for that county as a header row plus one data row.
//!
//! [`lookup::CensusLookup`] runs the two hops in order and stops at the
//! first failure. Both hops are read-only, so dropping an in-flight lookup
//! leaves nothing behind.

pub mod config;
pub mod geography;
pub mod lookup;
pub mod statistics;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address to look up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressQuery {
    /// Street address (e.g., "4600 Silver Hill Rd").
    pub street: String,
    /// City name.
    pub city: String,
    /// State name or abbreviation.
    pub state: String,
}

/// State and county codes an address falls in.
///
/// Only lives between the two hops of a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographyIdentifier {
    /// Two-digit state FIPS code.
    pub state: String,
    /// Three-digit county FIPS code.
    pub county: String,
}

/// County housing counts.
///
/// Counts the upstream service could not provide (suppressed estimates,
/// non-numeric cells) are `None`. `owner_occupied + renter_occupied` is not
/// checked against `total_housing_units`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingStatistics {
    /// Geography name (e.g., "Cook County, Illinois").
    pub name: String,
    /// Total housing units.
    pub total_housing_units: Option<u64>,
    /// Owner-occupied units.
    pub owner_occupied: Option<u64>,
    /// Renter-occupied units.
    pub renter_occupied: Option<u64>,
}

/// Errors from a lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The geocoder returned no address matches.
    #[error("No address matches found")]
    NoMatch,

    /// A response did not have the expected shape.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Description of what was missing or unexpected.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The embedded service configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl LookupError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Message suitable for showing to the person who asked for the
    /// lookup.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NoMatch => "No address matches found",
            Self::MalformedResponse { .. } => "Census service returned an unexpected response",
            Self::Http(_) | Self::Config(_) => "Failed to fetch census data",
        }
    }
}

/// First hop: resolves an address to its geography.
#[async_trait]
pub trait GeographySource: Send + Sync {
    /// Resolves `address` to its state and county codes.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NoMatch`] when the address is unknown, or
    /// another [`LookupError`] on transport or parse failure.
    async fn resolve(&self, address: &AddressQuery) -> Result<GeographyIdentifier, LookupError>;
}

/// Second hop: fetches statistics for a geography.
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    /// Fetches housing statistics for `geography`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on transport or parse failure.
    async fn fetch(&self, geography: &GeographyIdentifier)
    -> Result<HousingStatistics, LookupError>;
}

/// Builds a `reqwest::Client` for Census Bureau requests.
fn build_client(timeout_secs: u64) -> Result<reqwest::Client, LookupError> {
    reqwest::Client::builder()
        .user_agent(concat!("propdata/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(Into::into)
}
