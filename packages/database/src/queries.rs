//! Raw SQL queries against the `properties` table.
//!
//! Address matching always goes through `lower(btrim(property_address))`
//! so the storage side agrees with [`NormalizedKey`] and with the unique
//! index the upsert conflicts on.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use propdata_property_models::{
    ExistingProperty, NormalizedKey, PreparedRecord, PropertyId, PropertyRecord,
};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Columns written by an upsert, in parameter order, with the cast each
/// parameter needs inside a `VALUES` list.
const UPSERT_COLUMNS: &[(&str, &str)] = &[
    ("id", "bigint"),
    ("property_address", "text"),
    ("city", "text"),
    ("state", "text"),
    ("zip", "text"),
    ("county", "text"),
    ("year_built", "integer"),
    ("latitude", "double precision"),
    ("longitude", "double precision"),
    ("occupancy_rate", "double precision"),
    ("parking_spaces", "integer"),
    ("has_ev_charging", "boolean"),
    ("redevelopment_opportunities", "text"),
    ("updated_at", "timestamp"),
];

/// Looks up stored properties whose normalized address is one of `keys`.
///
/// Callers are expected to bound the size of `keys`; the whole slice is
/// sent as one `IN (...)` list.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub async fn select_by_keys(
    db: &dyn Database,
    keys: &[NormalizedKey],
) -> Result<Vec<ExistingProperty>, DbError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (1..=keys.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT id, property_address FROM properties \
         WHERE lower(btrim(property_address)) IN ({placeholders})"
    );
    let params: Vec<DatabaseValue> = keys
        .iter()
        .map(|k| DatabaseValue::String(k.as_str().to_string()))
        .collect();

    let rows = db.query_raw_params(&sql, &params).await?;

    rows.iter()
        .map(|row| {
            let id: i64 = row.to_value("id").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse property id: {e}"),
            })?;
            let address: Option<String> = row.to_value("property_address").unwrap_or(None);
            Ok(ExistingProperty {
                id: PropertyId(id),
                address,
            })
        })
        .collect()
}

/// Upserts one batch of prepared records in a single statement.
///
/// Records carrying an id update that row. Records without one are
/// inserted, falling back to an update when their address collides with
/// a stored row. When the batch holds the same key more than once only
/// the last occurrence is written, since `PostgreSQL` refuses to touch a
/// row twice in one statement.
///
/// # Errors
///
/// Returns [`DbError`] if the statement fails. The statement is atomic, so
/// a failed batch writes nothing.
pub async fn upsert_properties(
    db: &dyn Database,
    batch: &[PreparedRecord],
) -> Result<u64, DbError> {
    let rows = collapse_by_key(batch);
    if rows.is_empty() {
        return Ok(0);
    }

    let sql = upsert_sql(rows.len());
    let params: Vec<DatabaseValue> = rows
        .iter()
        .flat_map(|prepared| record_params(&prepared.record))
        .collect();

    let result = db.query_raw_params(&sql, &params).await?;

    let Some(row) = result.first() else {
        return Err(DbError::Conversion {
            message: "Upsert returned no summary row".to_string(),
        });
    };
    let updated: i64 = row.to_value("updated_count").unwrap_or(0);
    let inserted: i64 = row.to_value("inserted_count").unwrap_or(0);

    log::debug!(
        "Upserted batch of {} rows ({updated} by id, {inserted} by address)",
        rows.len()
    );

    Ok(u64::try_from(updated + inserted).unwrap_or(0))
}

/// Returns every stored property ordered by ascending id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub async fn list_properties(db: &dyn Database) -> Result<Vec<PropertyRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, property_address, city, state, zip, county, year_built,
                    latitude, longitude, occupancy_rate, parking_spaces,
                    has_ev_charging, redevelopment_opportunities, updated_at
             FROM properties
             ORDER BY id ASC",
            &[],
        )
        .await?;

    rows.iter()
        .map(|row| {
            let id: i64 = row.to_value("id").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse property id: {e}"),
            })?;
            let updated_at: Option<NaiveDateTime> = row.to_value("updated_at").unwrap_or(None);

            Ok(PropertyRecord {
                id: Some(PropertyId(id)),
                address: row.to_value("property_address").unwrap_or(None),
                city: row.to_value("city").unwrap_or(None),
                state: row.to_value("state").unwrap_or(None),
                zip: row.to_value("zip").unwrap_or(None),
                county: row.to_value("county").unwrap_or(None),
                year_built: row.to_value("year_built").unwrap_or(None),
                latitude: row.to_value("latitude").unwrap_or(None),
                longitude: row.to_value("longitude").unwrap_or(None),
                occupancy_rate: row.to_value("occupancy_rate").unwrap_or(None),
                parking_spaces: row.to_value("parking_spaces").unwrap_or(None),
                has_ev_charging: row.to_value("has_ev_charging").unwrap_or(None),
                redevelopment_opportunities: row
                    .to_value("redevelopment_opportunities")
                    .unwrap_or(None),
                updated_at: updated_at.map_or(DateTime::<Utc>::UNIX_EPOCH, |n| n.and_utc()),
            })
        })
        .collect()
}

/// Keeps the last occurrence of each key, preserving the order in which
/// surviving records first appeared.
///
/// Address-less records never collide on the unique index, so each one is
/// kept as is.
#[must_use]
pub fn collapse_by_key(batch: &[PreparedRecord]) -> Vec<&PreparedRecord> {
    let mut last: BTreeMap<&NormalizedKey, usize> = BTreeMap::new();
    for (i, prepared) in batch.iter().enumerate() {
        last.insert(&prepared.key, i);
    }

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(batch.len());
    for prepared in batch {
        if prepared.key.is_empty() {
            out.push(prepared);
        } else if seen.insert(&prepared.key) {
            out.push(&batch[last[&prepared.key]]);
        }
    }
    out
}

/// Builds the batch upsert statement for `row_count` records.
///
/// Rows with an id update by primary key; rows without one insert and
/// resolve address collisions through the normalized-address index. A row
/// whose id was deleted after reconciliation goes down the insert branch
/// and gets a fresh id. The statement reports how many rows each branch
/// touched.
fn upsert_sql(row_count: usize) -> String {
    let width = UPSERT_COLUMNS.len();
    let values = (0..row_count)
        .map(|row| {
            let cells = UPSERT_COLUMNS
                .iter()
                .enumerate()
                .map(|(col, (_, cast))| format!("${}::{cast}", row * width + col + 1))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({cells})")
        })
        .collect::<Vec<_>>()
        .join(",\n        ");

    let all_columns = UPSERT_COLUMNS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    let data_columns: Vec<&str> = UPSERT_COLUMNS[1..].iter().map(|(name, _)| *name).collect();
    let insert_columns = data_columns.join(", ");
    let set_from_incoming = data_columns
        .iter()
        .map(|c| format!("{c} = i.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let set_from_excluded = data_columns
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "WITH incoming ({all_columns}) AS (
    VALUES
        {values}
),
updated AS (
    UPDATE properties AS p SET {set_from_incoming}
    FROM incoming AS i
    WHERE i.id IS NOT NULL AND p.id = i.id
    RETURNING p.id
),
inserted AS (
    INSERT INTO properties ({insert_columns})
    SELECT {insert_columns} FROM incoming AS i
    WHERE i.id IS NULL
       OR NOT EXISTS (SELECT 1 FROM properties AS gone WHERE gone.id = i.id)
    ON CONFLICT ((lower(btrim(property_address)))) DO UPDATE SET {set_from_excluded}
    RETURNING id
)
SELECT
    (SELECT COUNT(*) FROM updated) AS updated_count,
    (SELECT COUNT(*) FROM inserted) AS inserted_count"
    )
}

fn opt_string(value: Option<&String>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.clone()))
}

/// Flattens a record into parameters matching [`UPSERT_COLUMNS`].
fn record_params(record: &PropertyRecord) -> Vec<DatabaseValue> {
    vec![
        record
            .id
            .map_or(DatabaseValue::Null, |id| DatabaseValue::Int64(id.0)),
        opt_string(record.address.as_ref()),
        opt_string(record.city.as_ref()),
        opt_string(record.state.as_ref()),
        opt_string(record.zip.as_ref()),
        opt_string(record.county.as_ref()),
        record
            .year_built
            .map_or(DatabaseValue::Null, DatabaseValue::Int32),
        record
            .latitude
            .map_or(DatabaseValue::Null, DatabaseValue::Real64),
        record
            .longitude
            .map_or(DatabaseValue::Null, DatabaseValue::Real64),
        record
            .occupancy_rate
            .map_or(DatabaseValue::Null, DatabaseValue::Real64),
        record
            .parking_spaces
            .map_or(DatabaseValue::Null, DatabaseValue::Int32),
        record
            .has_ev_charging
            .map_or(DatabaseValue::Null, DatabaseValue::Bool),
        opt_string(record.redevelopment_opportunities.as_ref()),
        DatabaseValue::DateTime(record.updated_at.naive_utc()),
    ]
}
