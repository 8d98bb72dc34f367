#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for property data ingestion and census lookups.

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    propdata_server::run_server().await
}
