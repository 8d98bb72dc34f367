//! Address to housing statistics, in two hops.

use crate::config::CensusServiceConfig;
use crate::geography::CensusGeocoder;
use crate::statistics::AcsStatistics;
use crate::{
    AddressQuery, GeographySource, HousingStatistics, LookupError, StatisticsSource,
};

/// Chains a [`GeographySource`] into a [`StatisticsSource`].
///
/// The statistics hop only runs once the geography hop has produced a
/// [`crate::GeographyIdentifier`]; the first failure is returned as is.
#[derive(Debug, Clone)]
pub struct CensusLookup<G, S> {
    geography: G,
    statistics: S,
}

impl CensusLookup<CensusGeocoder, AcsStatistics> {
    /// Builds a lookup against the live Census Bureau services.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if an HTTP client cannot be built.
    pub fn from_config(config: CensusServiceConfig) -> Result<Self, LookupError> {
        Ok(Self::new(
            CensusGeocoder::new(config.geocoder)?,
            AcsStatistics::new(config.statistics)?,
        ))
    }
}

impl<G: GeographySource, S: StatisticsSource> CensusLookup<G, S> {
    /// Creates a lookup from its two hops.
    pub const fn new(geography: G, statistics: S) -> Self {
        Self {
            geography,
            statistics,
        }
    }

    /// The geography hop.
    pub const fn geography(&self) -> &G {
        &self.geography
    }

    /// The statistics hop.
    pub const fn statistics(&self) -> &S {
        &self.statistics
    }

    /// Resolves `address` to county housing statistics.
    ///
    /// # Errors
    ///
    /// Returns the [`LookupError`] of whichever hop failed first.
    pub async fn lookup(&self, address: &AddressQuery) -> Result<HousingStatistics, LookupError> {
        let geography = self.geography.resolve(address).await?;
        log::debug!(
            "Resolved {} to state={} county={}",
            address.street,
            geography.state,
            geography.county
        );
        self.statistics.fetch(&geography).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::GeographyIdentifier;
    use crate::geography::parse_geography_response;
    use crate::statistics::parse_statistics_response;

    struct FixtureGeography {
        body: serde_json::Value,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeographySource for FixtureGeography {
        async fn resolve(
            &self,
            _address: &AddressQuery,
        ) -> Result<GeographyIdentifier, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            parse_geography_response(&self.body)
        }
    }

    struct FixtureStatistics {
        body: serde_json::Value,
        calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<GeographyIdentifier>>,
    }

    #[async_trait]
    impl StatisticsSource for FixtureStatistics {
        async fn fetch(
            &self,
            geography: &GeographyIdentifier,
        ) -> Result<HousingStatistics, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(geography.clone());
            parse_statistics_response(&self.body)
        }
    }

    fn lookup(
        geo: serde_json::Value,
        stats: serde_json::Value,
    ) -> CensusLookup<FixtureGeography, FixtureStatistics> {
        CensusLookup::new(
            FixtureGeography {
                body: geo,
                calls: AtomicUsize::new(0),
            },
            FixtureStatistics {
                body: stats,
                calls: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
            },
        )
    }

    fn address() -> AddressQuery {
        AddressQuery {
            street: "4600 Silver Hill Rd".into(),
            city: "Washington".into(),
            state: "DC".into(),
        }
    }

    fn geo_match() -> serde_json::Value {
        json!({
            "result": {
                "addressMatches": [{
                    "geographies": {
                        "Census Block Groups": [{ "STATE": "11", "COUNTY": "001" }]
                    }
                }]
            }
        })
    }

    fn stats_table() -> serde_json::Value {
        json!([
            ["NAME", "C25004_001E", "C25004_002E", "C25004_003E", "state", "county"],
            ["District of Columbia", "350000", "140000", "190000", "11", "001"]
        ])
    }

    #[tokio::test]
    async fn chains_geography_into_statistics() {
        let lookup = lookup(geo_match(), stats_table());
        let stats = lookup.lookup(&address()).await.unwrap();

        assert_eq!(stats.name, "District of Columbia");
        assert_eq!(stats.total_housing_units, Some(350_000));
        assert_eq!(
            lookup.statistics().seen.lock().unwrap().as_slice(),
            &[GeographyIdentifier {
                state: "11".into(),
                county: "001".into(),
            }]
        );
    }

    #[tokio::test]
    async fn no_match_skips_statistics() {
        let lookup = lookup(json!({ "result": { "addressMatches": [] } }), stats_table());
        let err = lookup.lookup(&address()).await.unwrap_err();

        assert!(matches!(err, LookupError::NoMatch));
        assert_eq!(err.user_message(), "No address matches found");
        assert_eq!(lookup.geography().calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookup.statistics().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_data_row_is_malformed() {
        let lookup = lookup(geo_match(), json!([["NAME", "C25004_001E"]]));
        let err = lookup.lookup(&address()).await.unwrap_err();

        assert!(matches!(err, LookupError::MalformedResponse { .. }));
        assert_eq!(lookup.statistics().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_geography_skips_statistics() {
        let lookup = lookup(json!({}), stats_table());
        let err = lookup.lookup(&address()).await.unwrap_err();

        assert!(matches!(err, LookupError::MalformedResponse { .. }));
        assert_eq!(lookup.statistics().calls.load(Ordering::SeqCst), 0);
    }
}
