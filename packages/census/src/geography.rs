//! Census Bureau geocoder client for the geography hop.
//!
//! Uses the `geographies/address` endpoint, which returns the census
//! geographies an address falls in alongside its match.
//!
//! See <https://geocoding.geo.census.gov/geocoder/Geocoding_Services_API.html>

use async_trait::async_trait;

use crate::config::GeocoderConfig;
use crate::{AddressQuery, GeographyIdentifier, GeographySource, LookupError, build_client};

/// Geography layer holding the state and county codes.
const BLOCK_GROUP_LAYER: &str = "Census Block Groups";

/// Geography source backed by the Census Bureau geocoder.
#[derive(Debug, Clone)]
pub struct CensusGeocoder {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl CensusGeocoder {
    /// Creates a geocoder client.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn new(config: GeocoderConfig) -> Result<Self, LookupError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    /// Fetches the raw geocoder response for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] on transport failure or a non-success
    /// status.
    pub async fn fetch_raw(&self, address: &AddressQuery) -> Result<serde_json::Value, LookupError> {
        log::debug!(
            "Geocoding {}, {}, {}",
            address.street,
            address.city,
            address.state
        );

        let resp = self
            .client
            .get(self.config.endpoint())
            .query(&[
                ("street", address.street.as_str()),
                ("city", address.city.as_str()),
                ("state", address.state.as_str()),
                ("benchmark", self.config.benchmark.as_str()),
                ("vintage", self.config.vintage.as_str()),
                ("layers", self.config.layers.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl GeographySource for CensusGeocoder {
    async fn resolve(&self, address: &AddressQuery) -> Result<GeographyIdentifier, LookupError> {
        let body = self.fetch_raw(address).await?;
        parse_geography_response(&body)
    }
}

/// Extracts the state and county of the first address match.
///
/// # Errors
///
/// * [`LookupError::NoMatch`] if `addressMatches` is empty
/// * [`LookupError::MalformedResponse`] if `addressMatches` is missing or
///   the first match carries no block group with state and county codes
pub fn parse_geography_response(
    body: &serde_json::Value,
) -> Result<GeographyIdentifier, LookupError> {
    let matches = body["result"]["addressMatches"]
        .as_array()
        .ok_or_else(|| LookupError::malformed("Missing addressMatches array"))?;

    let Some(first) = matches.first() else {
        return Err(LookupError::NoMatch);
    };

    let block_group = first["geographies"][BLOCK_GROUP_LAYER]
        .as_array()
        .and_then(|groups| groups.first())
        .ok_or_else(|| LookupError::malformed("Missing Census Block Groups geography"))?;

    let code = |field: &str| {
        block_group[field]
            .as_str()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .ok_or_else(|| LookupError::malformed(format!("Missing {field} code")))
    };

    Ok(GeographyIdentifier {
        state: code("STATE")?,
        county: code("COUNTY")?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn matched(groups: serde_json::Value) -> serde_json::Value {
        json!({
            "result": {
                "addressMatches": [
                    {
                        "matchedAddress": "4600 SILVER HILL RD, WASHINGTON, DC, 20233",
                        "geographies": { "Census Block Groups": groups }
                    },
                    {
                        "geographies": {
                            "Census Block Groups": [{ "STATE": "99", "COUNTY": "999" }]
                        }
                    }
                ]
            }
        })
    }

    #[test]
    fn extracts_first_block_group() {
        let body = matched(json!([
            { "STATE": "11", "COUNTY": "001", "GEOID": "110010078041" },
            { "STATE": "24", "COUNTY": "033" }
        ]));
        let geo = parse_geography_response(&body).unwrap();
        assert_eq!(
            geo,
            GeographyIdentifier {
                state: "11".into(),
                county: "001".into(),
            }
        );
    }

    #[test]
    fn empty_matches_is_no_match() {
        let body = json!({ "result": { "addressMatches": [] } });
        assert!(matches!(
            parse_geography_response(&body),
            Err(LookupError::NoMatch)
        ));
    }

    #[test]
    fn missing_matches_is_malformed() {
        let body = json!({ "errors": ["Specify street"] });
        assert!(matches!(
            parse_geography_response(&body),
            Err(LookupError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn missing_block_group_is_malformed() {
        let body = json!({
            "result": { "addressMatches": [{ "geographies": {} }] }
        });
        assert!(matches!(
            parse_geography_response(&body),
            Err(LookupError::MalformedResponse { .. })
        ));

        let body = matched(json!([]));
        assert!(matches!(
            parse_geography_response(&body),
            Err(LookupError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn missing_county_is_malformed() {
        let body = matched(json!([{ "STATE": "11" }]));
        let err = parse_geography_response(&body).unwrap_err();
        assert!(err.to_string().contains("COUNTY"));
    }
}
