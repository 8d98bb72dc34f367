//! Row normalization.
//!
//! Turns one raw CSV row into a typed [`PropertyRecord`] and its matching
//! key. Normalization never fails: malformed values become `None`.

use chrono::{DateTime, Utc};
use propdata_property_models::{NormalizedKey, PreparedRecord, PropertyRecord};
use serde::Deserialize;

/// Header naming the address column, the only column the pipeline needs.
pub const ADDRESS_HEADER: &str = "PROPERTYADDRESS";

/// One raw upload row, keyed by the fixed header vocabulary.
///
/// Columns may appear in any order; unknown columns are ignored and
/// missing ones read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawPropertyRow {
    #[serde(rename = "PROPERTYADDRESS")]
    pub address: Option<String>,
    #[serde(rename = "CITY")]
    pub city: Option<String>,
    #[serde(rename = "STATE")]
    pub state: Option<String>,
    #[serde(rename = "ZIP")]
    pub zip: Option<String>,
    #[serde(rename = "COUNTY")]
    pub county: Option<String>,
    #[serde(rename = "YEARBUILT")]
    pub year_built: Option<String>,
    #[serde(rename = "LATITUDE")]
    pub latitude: Option<String>,
    #[serde(rename = "LONGITUDE")]
    pub longitude: Option<String>,
    #[serde(rename = "OCCUPANCYRATE")]
    pub occupancy_rate: Option<String>,
    #[serde(rename = "PARKINGSPACES")]
    pub parking_spaces: Option<String>,
    #[serde(rename = "HASEVCHARGING")]
    pub has_ev_charging: Option<String>,
    #[serde(rename = "REDEVELOPMENTOPPORTUNITIES")]
    pub redevelopment_opportunities: Option<String>,
}

/// Normalizes one raw row, stamping it with `updated_at`.
///
/// The returned record never carries an id; identities are attached after
/// reconciliation.
#[must_use]
pub fn normalize_row(row: &RawPropertyRow, updated_at: DateTime<Utc>) -> PreparedRecord {
    let address = parse_text(row.address.as_deref());
    let key = NormalizedKey::from_optional(address.as_deref());

    let record = PropertyRecord {
        id: None,
        address,
        city: parse_text(row.city.as_deref()),
        state: parse_text(row.state.as_deref()),
        zip: parse_text(row.zip.as_deref()),
        county: parse_text(row.county.as_deref()),
        year_built: parse_integer(row.year_built.as_deref()),
        latitude: parse_float(row.latitude.as_deref()),
        longitude: parse_float(row.longitude.as_deref()),
        occupancy_rate: parse_float(row.occupancy_rate.as_deref()),
        parking_spaces: parse_integer(row.parking_spaces.as_deref()),
        has_ev_charging: parse_flag(row.has_ev_charging.as_deref()),
        redevelopment_opportunities: parse_text(row.redevelopment_opportunities.as_deref()),
        updated_at,
    };

    PreparedRecord { key, record }
}

/// Trims a text cell. Blank cells are absent.
fn parse_text(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parses a finite float. Anything else is absent.
fn parse_float(value: Option<&str>) -> Option<f64> {
    value?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parses an integer. Decimal cells are truncated toward zero, so
/// spreadsheet exports like `"1998.0"` and `"12.5"` read as 1998 and 12.
/// Values outside the `i32` range are absent.
#[allow(clippy::cast_possible_truncation)]
fn parse_integer(value: Option<&str>) -> Option<i32> {
    let trimmed = value?.trim();
    if let Ok(v) = trimmed.parse::<i32>() {
        return Some(v);
    }
    let v = parse_float(Some(trimmed))?.trunc();
    (v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX)).then(|| v as i32)
}

/// Only a case-insensitive `"true"` is true. Other non-blank values are
/// false, blank is unknown.
fn parse_flag(value: Option<&str>) -> Option<bool> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.eq_ignore_ascii_case("true"))
}
