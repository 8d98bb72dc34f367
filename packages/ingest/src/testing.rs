//! In-memory [`PropertyStore`] for pipeline tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use propdata_database::queries::collapse_by_key;
use propdata_database::{DbError, PropertyStore};
use propdata_property_models::{
    ExistingProperty, NormalizedKey, PreparedRecord, PropertyId, PropertyRecord,
};

#[derive(Default)]
struct State {
    rows: BTreeMap<PropertyId, PropertyRecord>,
    next_id: i64,
    select_calls: Vec<usize>,
    upsert_calls: usize,
    completed_calls: Vec<usize>,
}

/// Mimics the `properties` table: unique on the normalized address,
/// updates by id, and upserts by address when no id is given or the id
/// no longer exists.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failing_batches: BTreeSet<usize>,
    slow_batches: BTreeSet<usize>,
    losing_writes: BTreeSet<usize>,
    fail_selects: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the upsert calls with these zero-based call indices.
    pub fn failing_batches(mut self, batches: impl IntoIterator<Item = usize>) -> Self {
        self.failing_batches = batches.into_iter().collect();
        self
    }

    /// Delays the upsert calls with these indices before they write, so
    /// later calls can overtake them.
    pub fn slow_batches(mut self, batches: impl IntoIterator<Item = usize>) -> Self {
        self.slow_batches = batches.into_iter().collect();
        self
    }

    /// Makes the upsert calls with these indices report success while
    /// writing nothing.
    pub fn losing_writes(mut self, batches: impl IntoIterator<Item = usize>) -> Self {
        self.losing_writes = batches.into_iter().collect();
        self
    }

    /// Fails every `select_by_keys` call.
    pub fn failing_selects(mut self) -> Self {
        self.fail_selects = true;
        self
    }

    /// Seeds a stored property and returns its id.
    pub fn seed(&self, address: &str) -> PropertyId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = PropertyId(state.next_id);
        let mut record = PropertyRecord::empty(DateTime::<Utc>::UNIX_EPOCH);
        record.id = Some(id);
        record.address = Some(address.to_string());
        state.rows.insert(id, record);
        id
    }

    /// Deletes a stored property, as another operator might.
    pub fn remove(&self, id: PropertyId) {
        self.state.lock().unwrap().rows.remove(&id);
    }

    pub fn rows(&self) -> Vec<PropertyRecord> {
        self.state.lock().unwrap().rows.values().cloned().collect()
    }

    pub fn select_calls(&self) -> Vec<usize> {
        self.state.lock().unwrap().select_calls.clone()
    }

    pub fn upsert_calls(&self) -> usize {
        self.state.lock().unwrap().upsert_calls
    }

    /// Upsert call indices in the order their writes landed.
    pub fn completed_calls(&self) -> Vec<usize> {
        self.state.lock().unwrap().completed_calls.clone()
    }
}

fn write_one(state: &mut State, prepared: &PreparedRecord) {
    let existing = prepared.record.id.filter(|id| state.rows.contains_key(id)).or_else(|| {
        (!prepared.key.is_empty())
            .then(|| {
                state
                    .rows
                    .values()
                    .find(|r| r.key() == prepared.key)
                    .and_then(|r| r.id)
            })
            .flatten()
    });

    let id = existing.unwrap_or_else(|| {
        state.next_id += 1;
        PropertyId(state.next_id)
    });
    let mut record = prepared.record.clone();
    record.id = Some(id);
    state.rows.insert(id, record);
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn select_by_keys(
        &self,
        keys: &[NormalizedKey],
    ) -> Result<Vec<ExistingProperty>, DbError> {
        let mut state = self.state.lock().unwrap();
        state.select_calls.push(keys.len());
        if self.fail_selects {
            return Err(DbError::Conversion {
                message: "select rejected".to_string(),
            });
        }
        Ok(state
            .rows
            .values()
            .filter(|r| keys.contains(&r.key()))
            .map(|r| ExistingProperty {
                id: r.id.unwrap(),
                address: r.address.clone(),
            })
            .collect())
    }

    async fn upsert_batch(&self, batch: &[PreparedRecord]) -> Result<u64, DbError> {
        let call = {
            let mut state = self.state.lock().unwrap();
            state.upsert_calls += 1;
            state.upsert_calls - 1
        };
        if self.slow_batches.contains(&call) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let mut state = self.state.lock().unwrap();
        if self.failing_batches.contains(&call) {
            return Err(DbError::Conversion {
                message: format!("constraint violation in call {call}"),
            });
        }
        state.completed_calls.push(call);
        if self.losing_writes.contains(&call) {
            return Ok(0);
        }
        let rows = collapse_by_key(batch);
        for prepared in &rows {
            write_one(&mut state, prepared);
        }
        Ok(rows.len() as u64)
    }

    async fn list_all(&self) -> Result<Vec<PropertyRecord>, DbError> {
        Ok(self.rows())
    }
}
