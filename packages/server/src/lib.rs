#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for property data ingestion and census lookups.
//!
//! Serves the REST API used by the property table frontend: CSV uploads
//! are run through the ingestion pipeline, stored properties are listed
//! in id order, and Census Bureau geocoding and housing statistics are
//! proxied or chained server-side.

mod handlers;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use async_trait::async_trait;
use propdata_census::config::CensusServiceConfig;
use propdata_census::geography::CensusGeocoder;
use propdata_census::lookup::CensusLookup;
use propdata_census::statistics::AcsStatistics;
use propdata_census::{AddressQuery, GeographyIdentifier, HousingStatistics, LookupError};
use propdata_database::{PostgresPropertyStore, PropertyStore};
use propdata_ingest_models::IngestConfig;

/// Census lookup against the live Census Bureau services.
pub type LiveCensusLookup = CensusLookup<CensusGeocoder, AcsStatistics>;

/// Census calls the API serves: the two raw proxies and the chained lookup.
#[async_trait]
pub trait CensusService: Send + Sync {
    /// Raw geocoder response for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the request fails.
    async fn geocode_raw(&self, address: &AddressQuery) -> Result<serde_json::Value, LookupError>;

    /// Raw statistics response for `geography`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the request fails.
    async fn statistics_raw(
        &self,
        geography: &GeographyIdentifier,
    ) -> Result<serde_json::Value, LookupError>;

    /// Address to county housing statistics.
    ///
    /// # Errors
    ///
    /// Returns the [`LookupError`] of the first hop that failed.
    async fn lookup(&self, address: &AddressQuery) -> Result<HousingStatistics, LookupError>;
}

#[async_trait]
impl CensusService for LiveCensusLookup {
    async fn geocode_raw(&self, address: &AddressQuery) -> Result<serde_json::Value, LookupError> {
        self.geography().fetch_raw(address).await
    }

    async fn statistics_raw(
        &self,
        geography: &GeographyIdentifier,
    ) -> Result<serde_json::Value, LookupError> {
        self.statistics().fetch_raw(geography).await
    }

    async fn lookup(&self, address: &AddressQuery) -> Result<HousingStatistics, LookupError> {
        Self::lookup(self, address).await
    }
}

/// Shared application state.
pub struct AppState {
    /// Property storage.
    pub store: Arc<dyn PropertyStore>,
    /// Geography and statistics lookups.
    pub census: Arc<dyn CensusService>,
    /// Batch and concurrency tunables for uploads.
    pub ingest: IngestConfig,
    /// Directory uploads are spooled into while they are processed.
    pub upload_dir: PathBuf,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/upload", web::post().to(handlers::upload))
            .route("/data", web::get().to(handlers::data))
            .route("/census/geocode", web::get().to(handlers::geocode))
            .route("/census/census-data", web::get().to(handlers::census_data))
            .route("/census/lookup", web::get().to(handlers::census_lookup)),
    );
}

/// Directory for spooled uploads: `UPLOAD_DIR`, or the system temp dir.
#[must_use]
pub fn upload_dir_from_env() -> PathBuf {
    std::env::var_os("UPLOAD_DIR").map_or_else(std::env::temp_dir, PathBuf::from)
}

/// Starts the property data API server.
///
/// Connects to the database, builds the census clients, and serves until
/// shut down. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an error if the database connection fails, the census clients
/// cannot be built, the upload directory cannot be created, or the HTTP
/// server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let store = PostgresPropertyStore::connect_from_env().await?;

    let census = CensusLookup::from_config(CensusServiceConfig::load()?)?;

    let upload_dir = upload_dir_from_env();
    std::fs::create_dir_all(&upload_dir)?;
    log::info!("Spooling uploads in {}", upload_dir.display());

    let state = web::Data::new(AppState {
        store: Arc::new(store),
        census: Arc::new(census),
        ingest: IngestConfig::default(),
        upload_dir,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6000);
    let frontend_url =
        std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    log::info!("Starting server on {bind_addr}:{port} (CORS origin {frontend_url})");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(["GET", "POST"])
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}
