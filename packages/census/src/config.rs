//! Census service configuration, embedded from `services/census.toml`.

use serde::Deserialize;

use crate::LookupError;

const CENSUS_TOML: &str = include_str!("../services/census.toml");

/// Endpoints and parameters for both lookup hops.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CensusServiceConfig {
    /// Address geocoder settings.
    pub geocoder: GeocoderConfig,
    /// ACS data API settings.
    pub statistics: StatisticsConfig,
}

/// Census geocoder (`geographies/address`) settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeocoderConfig {
    /// API base URL (e.g., `"https://geocoding.geo.census.gov/geocoder"`).
    pub base_url: String,
    /// Address range benchmark (e.g., `"Public_AR_Current"`).
    pub benchmark: String,
    /// Geography vintage (e.g., `"Current_Current"`).
    pub vintage: String,
    /// Geography layer ids to return. Layer 10 is census block groups.
    pub layers: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// ACS data API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatisticsConfig {
    /// API base URL (e.g., `"https://api.census.gov/data"`).
    pub base_url: String,
    /// Survey year.
    pub year: u16,
    /// Dataset path under the year (e.g., `"acs/acs1"`).
    pub dataset: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Optional API key, taken from `CENSUS_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

const fn default_timeout() -> u64 {
    30
}

impl CensusServiceConfig {
    /// Loads the embedded configuration and applies `CENSUS_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Config`] if the embedded TOML is malformed.
    pub fn load() -> Result<Self, LookupError> {
        let mut config: Self = toml::de::from_str(CENSUS_TOML)?;
        config.statistics.api_key = std::env::var("CENSUS_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Ok(config)
    }
}

impl StatisticsConfig {
    /// Full URL of the dataset endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.year,
            self.dataset.trim_matches('/')
        )
    }
}

impl GeocoderConfig {
    /// Full URL of the address geography endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/geographies/address",
            self.base_url.trim_end_matches('/')
        )
    }
}
