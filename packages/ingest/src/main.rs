#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the property ingestion tool.

use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use propdata_database::{PostgresPropertyStore, PropertyStore as _};
use propdata_ingest::ingest_reader;
use propdata_ingest_models::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_RECONCILE_CHUNK_SIZE, DEFAULT_UPSERT_BATCH_SIZE, IngestConfig,
};

#[derive(Parser)]
#[command(name = "propdata_ingest", about = "Property data ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a local CSV file, updating properties whose address is
    /// already stored and inserting the rest. The file is left in place.
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Number of records per upsert batch
        #[arg(long, default_value_t = DEFAULT_UPSERT_BATCH_SIZE)]
        batch_size: usize,
        /// Number of addresses per reconciliation query
        #[arg(long, default_value_t = DEFAULT_RECONCILE_CHUNK_SIZE)]
        chunk_size: usize,
        /// Maximum storage operations in flight at once
        #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
        concurrency: usize,
    },
    /// List stored properties in id order
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let store = PostgresPropertyStore::connect_from_env().await?;

    match cli.command {
        Commands::Import {
            file,
            batch_size,
            chunk_size,
            concurrency,
        } => {
            let config = IngestConfig {
                reconcile_chunk_size: chunk_size,
                upsert_batch_size: batch_size,
                max_concurrency: concurrency,
            };

            let start = Instant::now();
            log::info!("Importing {}", file.display());
            let outcome = ingest_reader(&store, File::open(&file)?, config).await?;

            println!(
                "{} rows read, {} updated, {} inserted in {:.1}s",
                outcome.rows_read,
                outcome.updated,
                outcome.inserted,
                start.elapsed().as_secs_f64()
            );
            if outcome.is_partial_failure() {
                println!("{} batch(es) failed:", outcome.failed_batches());
                for error in &outcome.errors {
                    println!("  {error}");
                }
                std::process::exit(1);
            }
        }
        Commands::List => {
            let properties = store.list_all().await?;
            println!("{:<8} {:<40} {:<20} STATE", "ID", "ADDRESS", "CITY");
            println!("{}", "-".repeat(76));
            for property in &properties {
                println!(
                    "{:<8} {:<40} {:<20} {}",
                    property.id.map(|id| id.to_string()).unwrap_or_default(),
                    property.address.as_deref().unwrap_or(""),
                    property.city.as_deref().unwrap_or(""),
                    property.state.as_deref().unwrap_or(""),
                );
            }
        }
    }

    Ok(())
}
