//! HTTP handler functions for the property data API.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use propdata_census::{AddressQuery, GeographyIdentifier, LookupError};
use propdata_ingest::{IngestError, ingest_upload};
use propdata_server_models::{
    AddressQueryParams, ApiHealth, ApiPartialFailure, ApiUploadSuccess, CountyQueryParams,
};

use crate::AppState;
use crate::upload::{UploadError, receive_csv};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/upload`
///
/// Ingests the `csvFile` field of a multipart body. Stored properties are
/// matched by address and updated; everything else is inserted.
pub async fn upload(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let artifact = match receive_csv(payload, &state.upload_dir).await {
        Ok(artifact) => artifact,
        Err(e) => return upload_error_response(&e),
    };

    match ingest_upload(state.store.as_ref(), artifact, state.ingest).await {
        Ok(outcome) if outcome.is_partial_failure() => {
            log::warn!(
                "Upload finished with {} failed batch(es)",
                outcome.failed_batches()
            );
            HttpResponse::InternalServerError().json(ApiPartialFailure::from(&outcome))
        }
        Ok(outcome) => {
            log::info!(
                "Upload processed: {} rows, {} updated, {} inserted",
                outcome.rows_read,
                outcome.updated,
                outcome.inserted
            );
            HttpResponse::Ok().json(ApiUploadSuccess::from(&outcome))
        }
        Err(e) => ingest_error_response(&e),
    }
}

/// `GET /api/data`
///
/// Returns every stored property in id order.
pub async fn data(state: web::Data<AppState>) -> HttpResponse {
    match state.store.list_all().await {
        Ok(properties) => HttpResponse::Ok().json(properties),
        Err(e) => {
            log::error!("Failed to list properties: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch data"
            }))
        }
    }
}

/// `GET /api/census/geocode`
///
/// Proxies the Census geocoder response for an address unchanged.
pub async fn geocode(
    state: web::Data<AppState>,
    params: web::Query<AddressQueryParams>,
) -> HttpResponse {
    let Some(address) = address_query(&params) else {
        return missing_parameters();
    };

    match state.census.geocode_raw(&address).await {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(e) => {
            log::error!("Geocoding error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch geocoding data"
            }))
        }
    }
}

/// `GET /api/census/census-data`
///
/// Proxies the ACS data API response for a county unchanged.
pub async fn census_data(
    state: web::Data<AppState>,
    params: web::Query<CountyQueryParams>,
) -> HttpResponse {
    let Some((st, county)) = params.required() else {
        return missing_parameters();
    };
    let geography = GeographyIdentifier {
        state: st.to_string(),
        county: county.to_string(),
    };

    match state.census.statistics_raw(&geography).await {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(e) => {
            log::error!("Census data error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch census data"
            }))
        }
    }
}

/// `GET /api/census/lookup`
///
/// Resolves an address to county housing statistics in one call.
pub async fn census_lookup(
    state: web::Data<AppState>,
    params: web::Query<AddressQueryParams>,
) -> HttpResponse {
    let Some(address) = address_query(&params) else {
        return missing_parameters();
    };

    match state.census.lookup(&address).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => lookup_error_response(&e),
    }
}

fn address_query(params: &AddressQueryParams) -> Option<AddressQuery> {
    let (street, city, st) = params.required()?;
    Some(AddressQuery {
        street: street.to_string(),
        city: city.to_string(),
        state: st.to_string(),
    })
}

fn missing_parameters() -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": "Missing required parameters"
    }))
}

fn upload_error_response(e: &UploadError) -> HttpResponse {
    match e {
        UploadError::NoFile => HttpResponse::BadRequest().json(serde_json::json!({
            "error": "No file uploaded"
        })),
        UploadError::InvalidType => HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid file type",
            "details": "Only CSV files are allowed"
        })),
        UploadError::Multipart(_) | UploadError::Io(_) => {
            log::error!("Upload error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Server error",
                "details": e.to_string()
            }))
        }
    }
}

fn ingest_error_response(e: &IngestError) -> HttpResponse {
    match e {
        IngestError::Empty => HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Empty CSV"
        })),
        IngestError::Csv(_) | IngestError::MissingColumn(_) => {
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": "CSV parsing failed",
                "details": [e.to_string()]
            }))
        }
        IngestError::Io(_) | IngestError::Reconcile(_) => {
            log::error!("Upload error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Server error",
                "details": e.to_string()
            }))
        }
    }
}

fn lookup_error_response(e: &LookupError) -> HttpResponse {
    let body = serde_json::json!({
        "error": e.user_message(),
        "details": e.to_string()
    });
    match e {
        LookupError::NoMatch => HttpResponse::NotFound().json(body),
        LookupError::MalformedResponse { .. } | LookupError::Http(_) => {
            log::error!("Census lookup error: {e}");
            HttpResponse::BadGateway().json(body)
        }
        LookupError::Config(_) => {
            log::error!("Census lookup error: {e}");
            HttpResponse::InternalServerError().json(body)
        }
    }
}
