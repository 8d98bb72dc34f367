//! Matches upload keys against stored properties.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use propdata_database::{DbError, PropertyStore};
use propdata_property_models::{NormalizedKey, PropertyId};

/// Resolves which of `keys` already exist in storage.
///
/// `keys` must be deduplicated. They are queried in chunks of at most
/// `chunk_size`, with up to `concurrency` chunks in flight. The returned map
/// only holds keys that were found. Stored addresses are re-normalized, and
/// if several stored rows share a key the lowest id wins.
///
/// # Errors
///
/// Returns the first [`DbError`] any chunk hits. Remaining chunks are
/// dropped and no partial map is returned.
pub async fn resolve_existing(
    store: &dyn PropertyStore,
    keys: &[NormalizedKey],
    chunk_size: usize,
    concurrency: usize,
) -> Result<BTreeMap<NormalizedKey, PropertyId>, DbError> {
    let chunks: Vec<&[NormalizedKey]> = keys.chunks(chunk_size.max(1)).collect();
    log::debug!(
        "Reconciling {} keys in {} chunk(s) (concurrency={concurrency})",
        keys.len(),
        chunks.len()
    );

    let found: Vec<_> = stream::iter(chunks)
        .map(|chunk| store.select_by_keys(chunk))
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut resolved: BTreeMap<NormalizedKey, PropertyId> = BTreeMap::new();
    for existing in found.into_iter().flatten() {
        let key = NormalizedKey::from_optional(existing.address.as_deref());
        if key.is_empty() {
            continue;
        }
        resolved
            .entry(key)
            .and_modify(|id| *id = (*id).min(existing.id))
            .or_insert(existing.id);
    }

    Ok(resolved)
}
