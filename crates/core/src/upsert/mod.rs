//! Batched create-or-update against the store.
//!
//! Each batch of merged entities is diffed against the rows currently stored
//! under the same keys and handed to the store as one commit. Counters only
//! move after a commit succeeds, so a failed batch leaves them describing
//! exactly what is durable.

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_COMMIT_BATCH_SIZE;
use crate::errors::Result;

/// Entity that can be written through [`upsert_in_batches`].
pub trait Upsertable: Clone + Send + Sync + 'static {
    /// Primary identity of the stored row.
    fn upsert_key(&self) -> String;

    /// Equality over visible attributes, ignoring bookkeeping timestamps.
    fn same_content(&self, other: &Self) -> bool;
}

/// Rows to write in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertBatch<E> {
    pub inserts: Vec<E>,
    /// Existing rows to overwrite. Unchanged rows are included so their
    /// sync timestamps advance.
    pub updates: Vec<E>,
}

impl<E> UpsertBatch<E> {
    pub fn new() -> Self {
        Self {
            inserts: Vec::new(),
            updates: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len()
    }
}

impl<E> Default for UpsertBatch<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage seam for the batched writer.
#[async_trait]
pub trait UpsertStore<E: Upsertable>: Send + Sync {
    /// Loads the stored rows for the given keys. Missing keys are simply absent.
    fn load_existing(&self, keys: &[String]) -> Result<HashMap<String, E>>;

    /// Commits inserts and updates atomically.
    async fn commit_batch(&self, batch: UpsertBatch<E>) -> Result<()>;
}

/// Per-entity counters surfaced in the run result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCounters {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    /// Matched an existing row whose visible attributes did not change.
    pub unchanged: usize,
    /// Inputs with no usable identity or that failed to merge.
    pub skipped: usize,
}

impl UpsertCounters {
    fn absorb(&mut self, pending: &UpsertCounters) {
        self.processed += pending.processed;
        self.created += pending.created;
        self.updated += pending.updated;
        self.unchanged += pending.unchanged;
        self.skipped += pending.skipped;
    }
}

/// Merges and writes `inputs` in commits of `batch_size`.
///
/// `key_of` returns the stored row key an input maps to, or `None` when the
/// input has no identity (counted as skipped). `merge` builds the row to store
/// from the current row (if any) and the input. Inputs are processed in order;
/// when two inputs in the same batch share a key the later one wins.
///
/// On error the counters reflect only the batches that committed.
pub async fn upsert_in_batches<E, I, S, K, M>(
    store: &S,
    inputs: impl IntoIterator<Item = I>,
    batch_size: usize,
    counters: &mut UpsertCounters,
    key_of: K,
    mut merge: M,
) -> Result<()>
where
    E: Upsertable,
    S: UpsertStore<E> + ?Sized,
    K: Fn(&I) -> Option<String>,
    M: FnMut(Option<&E>, I) -> E,
{
    let batch_size = if batch_size == 0 {
        DEFAULT_COMMIT_BATCH_SIZE
    } else {
        batch_size
    };

    let mut chunk: Vec<(String, I)> = Vec::with_capacity(batch_size);
    let mut skipped_without_key = 0usize;

    for input in inputs {
        match key_of(&input) {
            Some(key) => chunk.push((key, input)),
            None => skipped_without_key += 1,
        }
        if chunk.len() == batch_size {
            let pending = std::mem::take(&mut chunk);
            commit_chunk(store, pending, counters, &mut merge).await?;
        }
    }
    if !chunk.is_empty() {
        commit_chunk(store, chunk, counters, &mut merge).await?;
    }

    counters.skipped += skipped_without_key;
    Ok(())
}

async fn commit_chunk<E, I, S, M>(
    store: &S,
    chunk: Vec<(String, I)>,
    counters: &mut UpsertCounters,
    merge: &mut M,
) -> Result<()>
where
    E: Upsertable,
    S: UpsertStore<E> + ?Sized,
    M: FnMut(Option<&E>, I) -> E,
{
    let keys = chunk.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>();
    let stored = store.load_existing(&keys)?;

    // Duplicate keys inside one batch collapse to a single write of the last merge.
    let mut order: Vec<String> = Vec::with_capacity(chunk.len());
    let mut staged: HashMap<String, E> = HashMap::with_capacity(chunk.len());
    let mut pending = UpsertCounters::default();

    for (key, input) in chunk {
        pending.processed += 1;
        let merged = {
            let previous = staged.get(&key).or_else(|| stored.get(&key));
            merge(previous, input)
        };
        if staged.insert(key.clone(), merged).is_none() {
            order.push(key);
        }
    }

    let mut batch = UpsertBatch::new();
    for key in order {
        let Some(entity) = staged.remove(&key) else {
            continue;
        };
        match stored.get(&key) {
            None => {
                pending.created += 1;
                batch.inserts.push(entity);
            }
            Some(original) => {
                if original.same_content(&entity) {
                    pending.unchanged += 1;
                } else {
                    pending.updated += 1;
                }
                batch.updates.push(entity);
            }
        }
    }

    let batch_len = batch.len();
    store.commit_batch(batch).await?;
    counters.absorb(&pending);
    debug!(
        "[Upsert] committed batch of {} rows (processed total {})",
        batch_len, counters.processed
    );
    Ok(())
}
