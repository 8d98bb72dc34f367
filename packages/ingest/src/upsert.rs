//! Batched upserts with per-batch failure accounting.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt as _};
use propdata_database::PropertyStore;
use propdata_database::queries::collapse_by_key;
use propdata_ingest_models::IngestionOutcome;
use propdata_property_models::{NormalizedKey, PreparedRecord};

/// Writes `records` in contiguous batches of `batch_size`, preserving input
/// order, with up to `concurrency` batches in flight.
///
/// A successful batch adds its records to `outcome.updated` (those carrying
/// an id) or `outcome.inserted` (those without). A failed batch adds one
/// message to `outcome.errors` and nothing to either counter, and so does a
/// batch the store reports writing fewer rows than it was given. Processing
/// always continues with the remaining batches, and errors are recorded in
/// batch order.
///
/// When an address appears in more than one batch the batches are written
/// one at a time, so the later occurrence is the one left in storage.
pub async fn upsert_in_batches(
    store: &dyn PropertyStore,
    records: &[PreparedRecord],
    batch_size: usize,
    concurrency: usize,
    outcome: &mut IngestionOutcome,
) {
    let batch_size = batch_size.max(1);
    let batch_count = records.len().div_ceil(batch_size);
    let in_flight = if spans_batches(records, batch_size) {
        log::info!("Repeated addresses span batches; writing batches sequentially");
        1
    } else {
        concurrency.max(1)
    };
    log::info!(
        "Upserting {} records in {batch_count} batch(es) of up to {batch_size}",
        records.len()
    );

    let results: Vec<_> = stream::iter(records.chunks(batch_size).enumerate())
        .map(|(index, batch)| async move { (index, batch, store.upsert_batch(batch).await) })
        .buffered(in_flight)
        .collect()
        .await;

    for (index, batch, result) in results {
        let first_row = index * batch_size + 1;
        let last_row = first_row + batch.len() - 1;

        let expected = collapse_by_key(batch).len() as u64;
        let result = result.map_err(|e| e.to_string()).and_then(|written| {
            if written < expected {
                Err(format!("storage wrote {written} of {expected} rows"))
            } else {
                Ok(written)
            }
        });

        match result {
            Ok(_) => {
                let updates = batch.iter().filter(|r| r.is_update()).count() as u64;
                outcome.updated += updates;
                outcome.inserted += batch.len() as u64 - updates;
            }
            Err(e) => {
                log::warn!(
                    "Batch {}/{batch_count} (rows {first_row}-{last_row}) failed: {e}",
                    index + 1
                );
                outcome
                    .errors
                    .push(format!("Batch {} (rows {first_row}-{last_row}): {e}", index + 1));
            }
        }
    }
}

/// Whether any non-empty key occurs in two different batches.
fn spans_batches(records: &[PreparedRecord], batch_size: usize) -> bool {
    let mut batch_of: BTreeMap<&NormalizedKey, usize> = BTreeMap::new();
    records.iter().enumerate().any(|(i, prepared)| {
        if prepared.key.is_empty() {
            return false;
        }
        let batch = i / batch_size;
        *batch_of.entry(&prepared.key).or_insert(batch) != batch
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use propdata_property_models::{NormalizedKey, PropertyId, PropertyRecord};

    use super::*;
    use crate::testing::MemoryStore;

    fn prepared(i: usize, id: Option<i64>) -> PreparedRecord {
        let address = format!("{i} Main St");
        let mut record = PropertyRecord::empty(DateTime::<Utc>::UNIX_EPOCH);
        record.address = Some(address.clone());
        record.id = id.map(PropertyId);
        PreparedRecord {
            key: NormalizedKey::from_address(&address),
            record,
        }
    }

    #[tokio::test]
    async fn counts_updates_and_inserts_per_batch() {
        let store = MemoryStore::new();
        let records: Vec<_> = (0..7)
            .map(|i| prepared(i, (i % 2 == 0).then_some(100 + i as i64)))
            .collect();
        let mut outcome = IngestionOutcome::new(7);

        upsert_in_batches(&store, &records, 3, 4, &mut outcome).await;

        assert_eq!(store.upsert_calls(), 3);
        assert_eq!(outcome.updated, 4);
        assert_eq!(outcome.inserted, 3);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn failed_batch_is_isolated() {
        let store = MemoryStore::new().failing_batches([1]);
        let records: Vec<_> = (0..6).map(|i| prepared(i, None)).collect();
        let mut outcome = IngestionOutcome::new(6);

        upsert_in_batches(&store, &records, 2, 1, &mut outcome).await;

        assert_eq!(outcome.inserted, 4);
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("Batch 2 (rows 3-4)"));
        assert_eq!(store.rows().len(), 4);
    }

    #[tokio::test]
    async fn one_error_per_failing_batch_in_order() {
        let store = MemoryStore::new().failing_batches([0, 2]);
        let records: Vec<_> = (0..5).map(|i| prepared(i, None)).collect();
        let mut outcome = IngestionOutcome::new(5);

        upsert_in_batches(&store, &records, 2, 1, &mut outcome).await;

        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].starts_with("Batch 1 (rows 1-2)"));
        assert!(outcome.errors[1].starts_with("Batch 3 (rows 5-5)"));
        assert_eq!(outcome.inserted, 2);
        assert!(outcome.written() <= outcome.rows_read);
    }

    fn same_address(spelling: &str, year_built: i32) -> PreparedRecord {
        let mut record = PropertyRecord::empty(DateTime::<Utc>::UNIX_EPOCH);
        record.address = Some(spelling.to_string());
        record.year_built = Some(year_built);
        PreparedRecord {
            key: NormalizedKey::from_address(spelling),
            record,
        }
    }

    #[tokio::test]
    async fn repeated_address_across_batches_keeps_last_occurrence() {
        let store = MemoryStore::new().slow_batches([0]);
        let records = vec![same_address("123 Main St", 1900), same_address("123 MAIN ST", 2000)];
        let mut outcome = IngestionOutcome::new(2);

        upsert_in_batches(&store, &records, 1, 4, &mut outcome).await;

        assert_eq!(store.completed_calls(), vec![0, 1]);
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year_built, Some(2000));
        assert_eq!(rows[0].address.as_deref(), Some("123 MAIN ST"));
        assert_eq!(outcome.inserted, 2);
    }

    #[tokio::test]
    async fn distinct_addresses_write_concurrently() {
        let store = MemoryStore::new().slow_batches([0]);
        let records: Vec<_> = (0..2).map(|i| prepared(i, None)).collect();
        let mut outcome = IngestionOutcome::new(2);

        upsert_in_batches(&store, &records, 1, 4, &mut outcome).await;

        assert_eq!(store.completed_calls(), vec![1, 0]);
        assert_eq!(outcome.inserted, 2);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn repeats_within_one_batch_stay_concurrent() {
        let records = vec![
            same_address("1 Elm St", 1900),
            same_address("1 elm st", 2000),
            same_address("2 Oak Ave", 1950),
        ];
        assert!(!spans_batches(&records, 2));
        assert!(spans_batches(&records, 1));
    }

    #[tokio::test]
    async fn short_write_is_a_batch_error() {
        let store = MemoryStore::new().losing_writes([1]);
        let records: Vec<_> = (0..4).map(|i| prepared(i, None)).collect();
        let mut outcome = IngestionOutcome::new(4);

        upsert_in_batches(&store, &records, 2, 1, &mut outcome).await;

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(
            outcome.errors[0],
            "Batch 2 (rows 3-4): storage wrote 0 of 2 rows"
        );
    }

    #[tokio::test]
    async fn record_whose_row_vanished_is_stored_again() {
        let store = MemoryStore::new();
        let id = store.seed("5 Pine Rd");
        let mut record = same_address("5 Pine Rd", 1975);
        record.record.id = Some(id);
        store.remove(id);
        let mut outcome = IngestionOutcome::new(1);

        upsert_in_batches(&store, &[record], 50, 4, &mut outcome).await;

        assert!(outcome.errors.is_empty());
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].address.as_deref(), Some("5 Pine Rd"));
        assert_eq!(rows[0].year_built, Some(1975));
        assert_ne!(rows[0].id, Some(id));
    }

    #[tokio::test]
    async fn no_records_no_batches() {
        let store = MemoryStore::new();
        let mut outcome = IngestionOutcome::new(0);
        upsert_in_batches(&store, &[], 50, 4, &mut outcome).await;
        assert_eq!(store.upsert_calls(), 0);
        assert_eq!(outcome, IngestionOutcome::new(0));
    }
}
