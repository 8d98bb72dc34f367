//! ACS data API client for the statistics hop.
//!
//! The data API answers with a JSON array of arrays: a header row of
//! variable names, then one row per geography. Cells are positional and
//! mostly strings, so they are coerced here rather than deserialized.

use async_trait::async_trait;

use crate::config::StatisticsConfig;
use crate::{
    GeographyIdentifier, HousingStatistics, LookupError, StatisticsSource, build_client,
};

/// Variables requested, in the order the data row is read.
///
/// `C25004` is the ACS vacancy/tenure table: total units, then owner and
/// renter occupied.
pub const VARIABLES: [&str; 4] = ["NAME", "C25004_001E", "C25004_002E", "C25004_003E"];

/// Statistics source backed by the ACS data API.
#[derive(Debug, Clone)]
pub struct AcsStatistics {
    client: reqwest::Client,
    config: StatisticsConfig,
}

impl AcsStatistics {
    /// Creates a data API client.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn new(config: StatisticsConfig) -> Result<Self, LookupError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    /// Fetches the raw data API response for one county.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] on transport failure or a non-success
    /// status.
    pub async fn fetch_raw(
        &self,
        geography: &GeographyIdentifier,
    ) -> Result<serde_json::Value, LookupError> {
        log::debug!(
            "Fetching housing statistics for state={} county={}",
            geography.state,
            geography.county
        );

        let get = VARIABLES.join(",");
        let county = format!("county:{}", geography.county);
        let state = format!("state:{}", geography.state);
        let mut params = vec![
            ("get", get.as_str()),
            ("for", county.as_str()),
            ("in", state.as_str()),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("key", key.as_str()));
        }

        let resp = self
            .client
            .get(self.config.endpoint())
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        // The API answers an empty 204 when the county has no estimate.
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Array(Vec::new()));
        }
        serde_json::from_str(&text)
            .map_err(|e| LookupError::malformed(format!("Invalid JSON from data API: {e}")))
    }
}

#[async_trait]
impl StatisticsSource for AcsStatistics {
    async fn fetch(
        &self,
        geography: &GeographyIdentifier,
    ) -> Result<HousingStatistics, LookupError> {
        let body = self.fetch_raw(geography).await?;
        parse_statistics_response(&body)
    }
}

/// Reads the data row of a header+row response into [`HousingStatistics`].
///
/// The header row is skipped without inspection. Numeric cells may be
/// strings or numbers; negative, fractional, or non-numeric values become
/// `None`.
///
/// # Errors
///
/// Returns [`LookupError::MalformedResponse`] if the body is not an array,
/// has no second row, or that row is shorter than [`VARIABLES`].
pub fn parse_statistics_response(
    body: &serde_json::Value,
) -> Result<HousingStatistics, LookupError> {
    let rows = body
        .as_array()
        .ok_or_else(|| LookupError::malformed("Expected an array of rows"))?;

    let row = rows
        .get(1)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| LookupError::malformed("Missing data row"))?;

    if row.len() < VARIABLES.len() {
        return Err(LookupError::malformed(format!(
            "Data row has {} cells, expected {}",
            row.len(),
            VARIABLES.len()
        )));
    }

    let name = match &row[0] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };

    Ok(HousingStatistics {
        name,
        total_housing_units: count_cell(&row[1]),
        owner_occupied: count_cell(&row[2]),
        renter_occupied: count_cell(&row[3]),
    })
}

fn count_cell(cell: &serde_json::Value) -> Option<u64> {
    match cell {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn header() -> serde_json::Value {
        json!(["NAME", "C25004_001E", "C25004_002E", "C25004_003E", "state", "county"])
    }

    #[test]
    fn parses_string_cells() {
        let body = json!([
            header(),
            ["Cook County, Illinois", "2250000", "1250000", "900000", "17", "031"]
        ]);
        let stats = parse_statistics_response(&body).unwrap();
        assert_eq!(stats.name, "Cook County, Illinois");
        assert_eq!(stats.total_housing_units, Some(2_250_000));
        assert_eq!(stats.owner_occupied, Some(1_250_000));
        assert_eq!(stats.renter_occupied, Some(900_000));
    }

    #[test]
    fn accepts_numeric_cells() {
        let body = json!([header(), ["X County", 10, 4, 5]]);
        let stats = parse_statistics_response(&body).unwrap();
        assert_eq!(stats.total_housing_units, Some(10));
        assert_eq!(stats.owner_occupied, Some(4));
        assert_eq!(stats.renter_occupied, Some(5));
    }

    #[test]
    fn uncoercible_cells_are_absent() {
        let body = json!([header(), ["X County", null, "-666666666", "n/a"]]);
        let stats = parse_statistics_response(&body).unwrap();
        assert_eq!(stats.total_housing_units, None);
        assert_eq!(stats.owner_occupied, None);
        assert_eq!(stats.renter_occupied, None);
    }

    #[test]
    fn inconsistent_counts_are_passed_through() {
        let body = json!([header(), ["X County", "10", "8", "7"]]);
        let stats = parse_statistics_response(&body).unwrap();
        assert_eq!(stats.total_housing_units, Some(10));
        assert_eq!(stats.owner_occupied, Some(8));
        assert_eq!(stats.renter_occupied, Some(7));
    }

    #[test]
    fn missing_second_row_is_malformed() {
        let body = json!([header()]);
        assert!(matches!(
            parse_statistics_response(&body),
            Err(LookupError::MalformedResponse { .. })
        ));

        let empty = json!([]);
        assert!(matches!(
            parse_statistics_response(&empty),
            Err(LookupError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn short_row_is_malformed() {
        let body = json!([header(), ["X County", "10"]]);
        assert!(matches!(
            parse_statistics_response(&body),
            Err(LookupError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn non_array_body_is_malformed() {
        let body = json!({ "error": "unknown variable" });
        assert!(matches!(
            parse_statistics_response(&body),
            Err(LookupError::MalformedResponse { .. })
        ));
    }
}
